//! Process-wide file extension to MIME type table.
//!
//! Built once on first use and read-only afterwards.

use std::collections::HashMap;

use mime::Mime;
use once_cell::sync::Lazy;

/// A content type and whether its payload is binary.
///
/// Text types get a `charset` parameter when served.
#[derive(Debug, Clone)]
pub struct MimeType {
    pub mime: Mime,
    pub binary: bool,
}

const TABLE: &[(&str, &str, bool)] = &[
    ("aif", "audio/x-aiff", true),
    ("aifc", "audio/x-aiff", true),
    ("aiff", "audio/x-aiff", true),
    ("au", "audio/basic", true),
    ("avi", "video/x-msvideo", true),
    ("bin", "application/octet-stream", true),
    ("bmp", "image/bmp", true),
    ("class", "application/octet-stream", true),
    ("csh", "application/x-csh", false),
    ("css", "text/css", false),
    ("csv", "text/csv", false),
    ("dll", "application/octet-stream", true),
    ("doc", "application/msword", true),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document", true),
    ("eps", "application/postscript", false),
    ("exe", "application/octet-stream", true),
    ("gif", "image/gif", true),
    ("gz", "application/gzip", true),
    ("htm", "text/html", false),
    ("html", "text/html", false),
    ("ico", "image/x-icon", true),
    ("jpe", "image/jpeg", true),
    ("jpeg", "image/jpeg", true),
    ("jpg", "image/jpeg", true),
    ("js", "text/javascript", false),
    ("json", "application/json", false),
    ("latex", "application/x-latex", false),
    ("md", "text/markdown", false),
    ("mid", "audio/midi", true),
    ("midi", "audio/midi", true),
    ("mjs", "text/javascript", false),
    ("mov", "video/quicktime", true),
    ("mp3", "audio/mpeg", true),
    ("mp4", "video/mp4", true),
    ("mpe", "video/mpeg", true),
    ("mpeg", "video/mpeg", true),
    ("mpg", "video/mpeg", true),
    ("oga", "audio/ogg", true),
    ("ogg", "audio/ogg", true),
    ("ogv", "video/ogg", true),
    ("otf", "font/otf", true),
    ("pdf", "application/pdf", true),
    ("php", "application/x-httpd-php", false),
    ("png", "image/png", true),
    ("ppt", "application/vnd.ms-powerpoint", true),
    ("ps", "application/postscript", false),
    ("qt", "video/quicktime", true),
    ("rtf", "text/rtf", false),
    ("sh", "application/x-sh", false),
    ("shtml", "text/html", false),
    ("svg", "image/svg+xml", false),
    ("swf", "application/x-shockwave-flash", true),
    ("tar", "application/x-tar", true),
    ("tcl", "application/x-tcl", false),
    ("tex", "application/x-tex", false),
    ("tgz", "application/gzip", true),
    ("tif", "image/tiff", true),
    ("tiff", "image/tiff", true),
    ("tsv", "text/tab-separated-values", false),
    ("ttf", "font/ttf", true),
    ("txt", "text/plain", false),
    ("wasm", "application/wasm", true),
    ("wav", "audio/x-wav", true),
    ("webm", "video/webm", true),
    ("webp", "image/webp", true),
    ("woff", "font/woff", true),
    ("woff2", "font/woff2", true),
    ("xhtml", "application/xhtml+xml", false),
    ("xls", "application/vnd.ms-excel", true),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", true),
    ("xml", "text/xml", false),
    ("z", "application/x-compress", true),
    ("zip", "application/zip", true),
];

static MIME_TYPES: Lazy<HashMap<&'static str, MimeType>> = Lazy::new(|| {
    TABLE
        .iter()
        .filter_map(|&(extension, mime, binary)| {
            let mime = mime.parse::<Mime>().ok()?;
            Some((extension, MimeType { mime, binary }))
        })
        .collect()
});

/// Looks up a file extension, without the leading dot. Case-sensitive.
pub fn lookup(extension: &str) -> Option<&'static MimeType> {
    MIME_TYPES.get(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entry_parses() {
        assert_eq!(MIME_TYPES.len(), TABLE.len());
    }

    #[test]
    fn known_and_unknown_extensions() {
        let html = lookup("html").unwrap();
        assert_eq!(html.mime, mime::TEXT_HTML);
        assert!(!html.binary);

        let png = lookup("png").unwrap();
        assert_eq!(png.mime, mime::IMAGE_PNG);
        assert!(png.binary);

        assert!(lookup("unknownext").is_none());
        assert!(lookup("HTML").is_none());
    }
}
