//! Legacy string-encoded list format.
//!
//! Older knowledge bases stored statement lists as one text value: items
//! separated by whitespace, items containing whitespace wrapped in `[[...]]`.

use once_cell::sync::Lazy;
use regex::Regex;

static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(.*?)\]\]|(\S+)").expect("valid list item regex"));

/// Parses a legacy encoded list, keeping duplicates and order.
pub fn parse_string_list(value: &str) -> Vec<String> {
    LIST_ITEM_RE
        .captures_iter(value)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|item| item.as_str().to_string())
        .collect()
}

/// Encodes items in the legacy list format.
pub fn stringify_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| {
            if item.is_empty() || item.contains(char::is_whitespace) {
                format!("[[{item}]]")
            } else {
                item.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
