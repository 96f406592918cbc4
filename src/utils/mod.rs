//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;

use regex::Regex;
use std::sync::OnceLock;

/// Maximum worksheet name length accepted by spreadsheet applications
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Compare two payloads ignoring all whitespace
pub fn same_ignoring_whitespace(a: &str, b: &str) -> bool {
    let left = a.chars().filter(|c| !c.is_whitespace());
    let right = b.chars().filter(|c| !c.is_whitespace());
    left.eq(right)
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Make a string usable as a worksheet name
///
/// Replaces the characters `[]:*?/\` with `_`, trims surrounding quotes and
/// whitespace, and truncates to [`MAX_SHEET_NAME_LEN`] characters.
pub fn sanitize_sheet_name(name: &str) -> String {
    static INVALID_CHARS: OnceLock<Regex> = OnceLock::new();

    let re =
        INVALID_CHARS.get_or_init(|| Regex::new(r"[\[\]:*?/\\]").expect("Invalid regex pattern"));

    let cleaned = re.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches('\'');
    let truncated: String = cleaned.chars().take(MAX_SHEET_NAME_LEN).collect();

    if truncated.is_empty() {
        String::from("Sheet")
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_ignoring_whitespace() {
        assert!(same_ignoring_whitespace(
            "arrArea[0] = [1, 2];",
            "arrArea[0]=[1,2];\n"
        ));
        assert!(!same_ignoring_whitespace("[1,2]", "[1,3]"));
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  hello   world  "), "hello world");
        assert_eq!(normalize_whitespace("hello\n\nworld"), "hello world");
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("欧洲赛事"), "欧洲赛事");
        assert_eq!(sanitize_sheet_name("a/b:c"), "a_b_c");
        assert_eq!(sanitize_sheet_name(""), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40)).chars().count(), 31);
    }
}
