//! Content type detection for attachments.
//!
//! Detection happens in two stages. A [`ContentSniffer`] matches known file
//! signatures. When nothing matches, [`detect_content_type`] inspects the
//! first bytes and decides between HTML, XML, plain text and opaque binary.

/// The type given to content nothing else claims.
pub const OCTET_STREAM: &str = "application/octet-stream";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

// Only this many leading bytes are considered by the fallback heuristic.
const SNIFF_LEN: usize = 512;

/// Classifies raw bytes by their content.
///
/// Implementations must not fail: when no signature matches they return a
/// generic type together with `false`.
pub trait ContentSniffer {
    /// Returns the detected MIME type and whether a signature matched.
    fn sniff(&self, data: &[u8]) -> (String, bool);
}

/// The default sniffer, matching magic numbers with [infer].
///
///  [infer]: https://docs.rs/infer/
#[derive(Clone, Copy, Debug, Default)]
pub struct MagicSniffer;

impl ContentSniffer for MagicSniffer {
    fn sniff(&self, data: &[u8]) -> (String, bool) {
        match infer::get(data) {
            Some(kind) => (kind.mime_type().to_string(), true),
            None => (OCTET_STREAM.to_string(), false),
        }
    }
}

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML", b"<HTML", b"<HEAD", b"<SCRIPT", b"<IFRAME", b"<H1", b"<DIV",
    b"<FONT", b"<TABLE", b"<A", b"<STYLE", b"<TITLE", b"<B", b"<BODY", b"<BR", b"<P",
    b"<!--",
];

/// Guess a content type from the leading bytes. Always returns a type.
///
/// Empty input is plain text.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    if data.starts_with(b"\xfe\xff") {
        return "text/plain; charset=utf-16be";
    }
    if data.starts_with(b"\xff\xfe") {
        return "text/plain; charset=utf-16le";
    }
    if data.starts_with(b"\xef\xbb\xbf") {
        return TEXT_PLAIN;
    }

    let start = data.iter()
        .position(|&b| !matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))
        .unwrap_or(data.len());
    let text = &data[start..];
    if HTML_TAGS.iter().any(|tag| is_tag(text, tag)) {
        return "text/html; charset=utf-8";
    }
    if text.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if data.iter().any(|&b| is_binary(b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

// The tag must be followed by a space or `>` to count.
fn is_tag(text: &[u8], tag: &[u8]) -> bool {
    text.len() > tag.len()
        && text[..tag.len()].eq_ignore_ascii_case(tag)
        && matches!(text[tag.len()], b' ' | b'>')
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)
}
