//! Content type detection from the first bytes of a file.
//!
//! Uses magic-byte signatures from the `infer` crate, so the result does not
//! depend on the file name or extension. Content without a known signature
//! falls back to `text/plain` when it decodes as UTF-8.

/// Bytes of the file inspected for classification
pub const HEADER_LEN: usize = 8192;

pub const EMPTY: &str = "application/x-empty";
pub const TEXT: &str = "text/plain";
pub const BINARY: &str = "application/octet-stream";

/// Classify a file from its header bytes.
///
/// ```
/// use hashlookup_importer::hash::mime::detect;
///
/// let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
/// assert_eq!(detect(&png), "image/png");
/// assert_eq!(detect(b"hello"), "text/plain");
/// ```
pub fn detect(header: &[u8]) -> String {
    if header.is_empty() {
        return EMPTY.to_string();
    }
    if let Some(kind) = infer::get(header) {
        return kind.mime_type().to_string();
    }
    if looks_like_text(header) {
        TEXT.to_string()
    } else {
        BINARY.to_string()
    }
}

// A multi-byte sequence cut off by the header limit still counts as text.
fn looks_like_text(header: &[u8]) -> bool {
    let valid = match std::str::from_utf8(header) {
        Ok(s) => s,
        Err(e) if e.error_len().is_none() => {
            // valid_up_to is always a char boundary
            match std::str::from_utf8(&header[..e.valid_up_to()]) {
                Ok(s) => s,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };
    !valid
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\x0c'))
}
