//! Common utility functions used across assistant components

/// Count characters, not bytes
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut a string to at most `max_chars` characters without splitting one
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate a string for log output, adding an ellipsis when cut
pub fn truncate_for_log(s: &str, max_chars: usize) -> String {
    if char_len(s) <= max_chars {
        s.to_string()
    } else if max_chars <= 3 {
        "...".to_string()
    } else {
        format!("{}...", truncate_chars(s, max_chars - 3))
    }
}

/// Elapsed recording time as `m:ss`
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
