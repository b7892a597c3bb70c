//! Cursor-based input selection.
//!
//! Input keys are ordered by their base name, compared byte-wise. Producers must
//! name files so that this order is the intended processing order (for example
//! zero-padded epoch prefixes); nothing here re-interprets the names.

use crate::constants::JSON_SUFFIX;

/// Segment of `key` after the last `/`
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Join a location and a name into a store key
pub fn join_key(location: &str, name: &str) -> String {
    let location = location.trim_matches('/');
    if location.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", location, name)
    }
}

/// Keep the JSON keys whose base name sorts strictly after `cursor`, in
/// processing order.
pub fn select_new_files(keys: Vec<String>, cursor: &str) -> Vec<String> {
    let mut selected: Vec<String> = keys
        .into_iter()
        .filter(|k| k.ends_with(JSON_SUFFIX))
        .filter(|k| base_name(k) > cursor)
        .collect();
    selected.sort_by(|a, b| base_name(a).cmp(base_name(b)).then_with(|| a.cmp(b)));
    selected
}

/// Cursor value to commit once `selection` is fully processed
pub fn next_cursor(selection: &[String]) -> Option<&str> {
    selection.last().map(|k| base_name(k))
}
