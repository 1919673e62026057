use std::path::{Component, Path};

/// Derives the base of an operation key from a watch URL.
///
/// `https://www.youtube.com/watch?v=abc&t=1` → `abc`; anything without a
/// `watch?v=` segment becomes `video`.
pub fn video_id_from_url(url: &str) -> String {
    match url.split_once("watch?v=") {
        Some((_, rest)) => {
            let id = rest.split('&').next().unwrap_or_default();
            if id.is_empty() {
                "video".to_string()
            } else {
                id.to_string()
            }
        }
        None => "video".to_string(),
    }
}

/// Truncates a message to `max_chars` characters, appending `...` when cut.
///
/// Counts characters, not bytes, so multi-byte text is never split mid-char.
pub fn truncate_with_ellipsis(message: &str, max_chars: usize) -> String {
    let mut chars = message.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Returns true when `name` is a single normal path component.
///
/// Rejects empty names, separators and `..` so a requested file name can
/// never escape the downloads folder.
pub fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains('/')
        && !name.contains('\\')
}

/// ASCII-only variant of a file name for the quoted `filename=` parameter
pub fn ascii_header_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        "download.bin".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `Content-Disposition` value with an ASCII fallback and the RFC 5987 UTF-8 name.
pub fn content_disposition(name: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_header_filename(name),
        encode_rfc5987(name)
    )
}

fn encode_rfc5987(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}
