//! Output verification
//!
//! Compares actual program output against an expected answer after
//! normalizing both sides. Normalization unifies CRLF/LF line endings and
//! trims leading/trailing whitespace; internal whitespace and formatting
//! are compared exactly.

/// Normalize output text before comparison.
pub fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").trim().to_string()
}

/// Outcome of comparing actual vs. expected output.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub is_match: bool,
    /// Actual output after normalization
    pub actual: String,
    /// Expected output after normalization
    pub expected: String,
}

/// Compare actual output with the expected answer.
pub fn compare(actual: &str, expected: &str) -> Comparison {
    let actual = normalize(actual);
    let expected = normalize(expected);
    let is_match = actual == expected;

    Comparison {
        is_match,
        actual,
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_newline_is_ignored() {
        assert!(compare("5\n", "5").is_match);
    }

    #[test]
    fn test_trailing_space_is_ignored() {
        // trim-only policy: an edge space is not a wrong answer
        assert!(compare("5 ", "5").is_match);
    }

    #[test]
    fn test_crlf_equals_lf() {
        assert!(compare("Hello\r\nWorld", "Hello\nWorld").is_match);
    }

    #[test]
    fn test_content_mismatch() {
        let comparison = compare("4", "5");
        assert!(!comparison.is_match);
        assert_eq!(comparison.actual, "4");
        assert_eq!(comparison.expected, "5");
    }

    #[test]
    fn test_internal_whitespace_is_significant() {
        assert!(!compare("1  2", "1 2").is_match);
        assert!(!compare("1\t2", "1 2").is_match);
    }

    #[test]
    fn test_internal_blank_lines_are_significant() {
        assert!(!compare("a\n\nb", "a\nb").is_match);
    }

    #[test]
    fn test_leading_blank_lines_are_trimmed() {
        assert!(compare("\n\nanswer\n", "answer").is_match);
    }

    #[test]
    fn test_normalized_forms_are_reported() {
        let comparison = compare("  7\r\n8\n", "7\n8");
        assert!(comparison.is_match);
        assert_eq!(comparison.actual, "7\n8");
        assert_eq!(comparison.expected, "7\n8");
    }
}
