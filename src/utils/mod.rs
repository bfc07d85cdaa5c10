//! Utility functions and helpers.

pub mod http;
pub mod slug;

/// Trim a string and drop it entirely when nothing is left.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Case-insensitive equality on trimmed strings.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  Portland ")), Some("Portland".to_string()));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn test_eq_ignore_case() {
        assert!(eq_ignore_case("Portland", " portland"));
        assert!(!eq_ignore_case("Portland", "Portland Heights"));
    }
}
