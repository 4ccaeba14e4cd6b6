//! MIME types by file extension.

const MIME_TYPES: &[(&str, &str)] = &[
    // Images
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("svg", "image/svg+xml"),
    ("tiff", "image/tiff"),
    ("tif", "image/tiff"),
    ("bmp", "image/bmp"),
    ("ico", "image/x-icon"),
    ("ppm", "image/x-portable-pixmap"),
    // Video
    ("mp4", "video/mp4"),
    ("asx", "video/x-ms-asf"),
    ("asf", "video/x-ms-asf"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
    ("wmv", "video/x-ms-wmv"),
    ("flv", "video/x-flv"),
    ("webm", "video/webm"),
    ("m4v", "video/x-m4v"),
    ("mng", "video/x-mng"),
    ("mpg", "video/mpeg"),
    ("mpeg", "video/mpeg"),
    ("ogv", "video/ogg"),
    ("3gpp", "video/3gpp"),
    ("3gp", "video/3gpp"),
    ("ts", "video/mp2t"),
    // Audio
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("oga", "audio/ogg"),
    ("opus", "audio/opus"),
    ("m4a", "audio/mp4"),
    ("m4b", "audio/mp4"),
    ("m4p", "audio/mp4"),
    ("aac", "audio/aac"),
    ("flac", "audio/flac"),
    ("wma", "audio/x-ms-wma"),
    ("aiff", "audio/aiff"),
    ("alac", "audio/alac"),
];

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Returns the MIME type for an extension (case-insensitive).
pub fn mime_type_for(extension: &str) -> &'static str {
    let extension = extension.trim_start_matches('.');
    MIME_TYPES
        .iter()
        .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME_TYPE)
}
