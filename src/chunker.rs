//! Splits long replies into transport-sized segments

/// Maximum UTF-16 code units per outgoing message
pub const MESSAGE_LIMIT: usize = 4096;

fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Split `text` into consecutive segments of at most `limit` UTF-16 code
/// units, the unit Telegram measures message length in.
///
/// Text within the limit comes back as a single segment. Splits ignore word
/// and markup boundaries but never a character; concatenating the segments
/// yields `text`.
pub fn chunk(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if utf16_len(text) <= limit {
        return vec![text.to_string()];
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut units = 0;
    for c in text.chars() {
        let width = c.len_utf16();
        if units + width > limit && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
            units = 0;
        }
        current.push(c);
        units += width;
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}
