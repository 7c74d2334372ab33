//! MIME type detection module
//!
//! Static table of the image formats the server will look for, in probe order.

/// Extensions probed for an item, in precedence order
pub const IMAGE_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".webp", ".gif"];

/// Content type used when an extension is not in the table
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Get MIME Content-Type for an extension (leading dot included)
///
/// # Examples
/// ```
/// use image_serve::http::mime::get_content_type;
/// assert_eq!(get_content_type(".webp"), "image/webp");
/// assert_eq!(get_content_type(".bmp"), "application/octet-stream");
/// ```
pub fn get_content_type(extension: &str) -> &'static str {
    match extension {
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".webp" => "image/webp",
        ".gif" => "image/gif",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_types() {
        assert_eq!(get_content_type(".png"), "image/png");
        assert_eq!(get_content_type(".jpg"), "image/jpeg");
        assert_eq!(get_content_type(".jpeg"), "image/jpeg");
        assert_eq!(get_content_type(".webp"), "image/webp");
        assert_eq!(get_content_type(".gif"), "image/gif");
    }

    #[test]
    fn test_every_probed_extension_has_a_type() {
        for ext in IMAGE_EXTENSIONS {
            assert_ne!(get_content_type(ext), FALLBACK_CONTENT_TYPE, "{ext}");
        }
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(get_content_type(".svg"), FALLBACK_CONTENT_TYPE);
        assert_eq!(get_content_type("png"), FALLBACK_CONTENT_TYPE);
        assert_eq!(get_content_type(".PNG"), FALLBACK_CONTENT_TYPE);
        assert_eq!(get_content_type(""), FALLBACK_CONTENT_TYPE);
    }
}
