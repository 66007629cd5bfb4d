//! Shared string helpers.

/// Truncate `s` to at most `max_bytes`, backing off to a UTF-8 boundary.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Single-line preview for log output: newlines collapsed, long text cut
/// with an ellipsis.
pub fn preview(s: &str, max_bytes: usize) -> String {
    let flat = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = truncate_str(&flat, max_bytes);
    if cut.len() < flat.len() {
        format!("{cut}...")
    } else {
        flat
    }
}
