//! ASCII-safe normalization of blob text.
//!
//! Every char above `0x7E` becomes a `\uXXXX` escape (lowercase hex, four
//! digits). Chars outside the basic multilingual plane are written as their
//! UTF-16 surrogate pair, the same form JSON string escapes use.

/// Highest code point passed through unchanged.
const MAX_PASSTHROUGH: char = '\u{7E}';

/// Decode `raw` as UTF-8 (invalid sequences become U+FFFD) and sanitize it.
pub fn sanitize(raw: &[u8]) -> String {
    sanitize_str(&String::from_utf8_lossy(raw))
}

/// Sanitize already-decoded text.
pub fn sanitize_str(text: &str) -> String {
    if text.is_ascii() && !text.contains('\u{7F}') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + text.len() / 2);
    let mut units = [0u16; 2];
    for c in text.chars() {
        if c <= MAX_PASSTHROUGH {
            out.push(c);
            continue;
        }
        for unit in c.encode_utf16(&mut units) {
            out.push_str(&format!("\\u{unit:04x}"));
        }
    }
    out
}
