//! Token-level parsing helpers for marker lines.
//!
//! Lines are whitespace-delimited; these functions work on already-split
//! tokens and never allocate.

/// Reserved spellings for a missing effect or standard error.
pub const MISSING_TOKENS: [&str; 2] = ["NA", "N/A"];

/// First character of a comment line's first token.
pub const COMMENT_CHAR: char = '#';

/// Check if a split line should be skipped (blank, id-only, or comment).
#[inline(always)]
pub fn should_skip_line(tokens: &[&str]) -> bool {
    tokens.len() <= 1 || tokens[0].starts_with(COMMENT_CHAR)
}

#[inline(always)]
pub fn is_missing_token(token: &str) -> bool {
    MISSING_TOKENS.contains(&token)
}

/// Parse a finite float. `NaN` and infinities are rejected.
#[inline]
pub fn parse_finite(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Number of complete (effect, se) pairs on a line, and whether a trailing
/// unpaired column was dropped.
#[inline]
pub fn study_columns(num_tokens: usize) -> (usize, bool) {
    let num_studies = num_tokens.saturating_sub(1) / 2;
    (num_studies, num_tokens > 0 && num_tokens % 2 == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_skip_line() {
        assert!(should_skip_line(&[]));
        assert!(should_skip_line(&["rs1"]));
        assert!(should_skip_line(&["#rsid", "beta", "se"]));
        assert!(should_skip_line(&["##", "anything"]));
        assert!(!should_skip_line(&["rs1", "0.1", "0.2"]));
    }

    #[test]
    fn test_missing_tokens() {
        assert!(is_missing_token("NA"));
        assert!(is_missing_token("N/A"));
        assert!(!is_missing_token("na"));
        assert!(!is_missing_token("0.0"));
    }

    #[test]
    fn test_parse_finite() {
        assert_eq!(parse_finite("0.5"), Some(0.5));
        assert_eq!(parse_finite("-1e-3"), Some(-0.001));
        assert_eq!(parse_finite("NaN"), None);
        assert_eq!(parse_finite("inf"), None);
        assert_eq!(parse_finite("abc"), None);
    }

    #[test]
    fn test_study_columns() {
        assert_eq!(study_columns(5), (2, false));
        assert_eq!(study_columns(6), (2, true));
        assert_eq!(study_columns(2), (0, true));
        assert_eq!(study_columns(1), (0, false));
    }
}
