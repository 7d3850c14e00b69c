use std::sync::LazyLock;

use regex::Regex;

/// `@` followed by 5–32 handle characters (ASCII letters, digits, underscore).
static HANDLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_]{5,32})").unwrap());

/// Collect `@handle` references from free text.
///
/// Returns handles without the `@`, de-duplicated in first-seen order.
/// Purely lexical: nothing is validated against any directory.
pub fn scan_mentions(text: Option<&str>) -> Vec<String> {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return Vec::new();
    };

    let mut handles: Vec<String> = Vec::new();
    for captures in HANDLE_PATTERN.captures_iter(text) {
        let handle = &captures[1];
        if !handles.iter().any(|seen| seen == handle) {
            handles.push(handle.to_string());
        }
    }
    handles
}
