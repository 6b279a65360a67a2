//! Content-type inference for responses that do not declare one.
//!
//! A reduced version of the WHATWG MIME sniffing table: a handful of HTML
//! tags, a few binary signatures, then a text/binary split on control bytes.

use mime::Mime;

/// Only this many leading bytes of a body are examined.
pub const SNIFF_LEN: usize = 512;

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Guesses the media type of a body from its first bytes.
pub fn sniff(data: &[u8]) -> Mime {
    let data = &data[..data.len().min(SNIFF_LEN)];

    let start = data.iter().position(|b| !is_whitespace(*b)).unwrap_or(data.len());
    if HTML_TAGS.iter().any(|tag| is_html_tag(&data[start..], tag)) {
        return mime::TEXT_HTML_UTF_8;
    }

    if let Some(mime) = signature(data) {
        return mime;
    }

    if data.starts_with(UTF8_BOM) || !data.iter().any(|b| is_binary(*b)) {
        mime::TEXT_PLAIN_UTF_8
    } else {
        mime::APPLICATION_OCTET_STREAM
    }
}

fn signature(data: &[u8]) -> Option<Mime> {
    if data.starts_with(b"%PDF-") {
        Some(mime::APPLICATION_PDF)
    } else if data.starts_with(b"\x89PNG\r\n\x1A\n") {
        Some(mime::IMAGE_PNG)
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some(mime::IMAGE_GIF)
    } else if data.starts_with(b"\xFF\xD8\xFF") {
        Some(mime::IMAGE_JPEG)
    } else {
        None
    }
}

/// The tag must be followed by a space or `>` so `<Apple` is not `<A`.
fn is_html_tag(data: &[u8], tag: &[u8]) -> bool {
    data.len() > tag.len()
        && data[..tag.len()].eq_ignore_ascii_case(tag)
        && matches!(data[tag.len()], b' ' | b'>')
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
