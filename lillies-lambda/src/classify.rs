//! Content-type classification for reply bodies.

/// Content-type prefixes whose bodies must be base64 encoded.
pub const BINARY_PREFIXES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "font/",
    "application/x-font",
    "application/octet-stream",
    "application/pdf",
    "application/zip",
];

/// Whether a response with this content type has a binary body.
///
/// Matching is by prefix so parameters such as `; charset=binary` are
/// tolerated. ASCII case and leading whitespace are ignored; an empty
/// content type is text.
pub fn is_binary(content_type: &str) -> bool {
    let content_type = content_type.trim_start().as_bytes();

    BINARY_PREFIXES.iter().any(|prefix| {
        content_type.len() >= prefix.len()
            && content_type[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    })
}
