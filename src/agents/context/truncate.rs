//! Length-based truncation on char boundaries

/// Appended to text that was cut
pub const ELLIPSIS: char = '…';

/// Truncate `text` to at most `max_chars` characters
///
/// Returns the (possibly shortened) text and whether it was cut. A cut text
/// ends with [`ELLIPSIS`], counted within `max_chars`, so truncating an
/// already-truncated value again is a no-op.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        None => (text.to_string(), false),
        Some(_) if max_chars == 0 => (String::new(), true),
        Some(_) => {
            let keep = max_chars - 1;
            let end = text
                .char_indices()
                .nth(keep)
                .map(|(i, _)| i)
                .unwrap_or(text.len());
            let mut out = String::with_capacity(end + ELLIPSIS.len_utf8());
            out.push_str(&text[..end]);
            out.push(ELLIPSIS);
            (out, true)
        }
    }
}
