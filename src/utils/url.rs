// src/utils/url.rs

//! Filename derivation from image URLs.

use chrono::Utc;

/// Derive a safe on-disk filename from an image URL.
///
/// Takes the last path segment with query and fragment removed. Empty or
/// extensionless segments fall back to a millisecond timestamp name.
///
/// # Examples
/// ```
/// use harvester::utils::url::filename_from_url;
///
/// assert_eq!(
///     filename_from_url("https://img.example.com/a/photo.jpg?size=large#frag"),
///     "photo.jpg"
/// );
/// ```
pub fn filename_from_url(url: &str) -> String {
    let without_suffix = url.split(['?', '#']).next().unwrap_or_default();
    let segment = without_suffix.rsplit('/').next().unwrap_or_default();

    if segment.is_empty() || !segment.contains('.') {
        return timestamp_filename();
    }
    sanitize_filename(segment)
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Swap the extension for `.jpg`.
pub fn with_jpeg_extension(name: &str) -> String {
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };
    format!("{stem}.jpg")
}

fn timestamp_filename() -> String {
    format!("{}.jpg", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_and_fragment_stripped() {
        assert_eq!(
            filename_from_url("https://img.example.com/photo.jpg?size=large#frag"),
            "photo.jpg"
        );
        assert_eq!(
            filename_from_url("https://img.example.com/x/pic.png#only-frag"),
            "pic.png"
        );
    }

    #[test]
    fn test_illegal_characters_replaced() {
        assert_eq!(
            filename_from_url("https://img.example.com/my%20photo(1).jpg"),
            "my_20photo_1_.jpg"
        );
        assert_eq!(sanitize_filename("图片.webp"), "__.webp");
    }

    #[test]
    fn test_extensionless_uses_timestamp() {
        let name = filename_from_url("https://img.example.com/image/12345");
        assert!(name.ends_with(".jpg"));
        assert!(name.trim_end_matches(".jpg").chars().all(|c| c.is_ascii_digit()));

        let name = filename_from_url("https://img.example.com/");
        assert!(name.ends_with(".jpg"));
    }

    #[test]
    fn test_with_jpeg_extension() {
        assert_eq!(with_jpeg_extension("a.png"), "a.jpg");
        assert_eq!(with_jpeg_extension("a.b.webp"), "a.b.jpg");
        assert_eq!(with_jpeg_extension("a.jpg"), "a.jpg");
        assert_eq!(with_jpeg_extension("noext"), "noext.jpg");
    }
}
