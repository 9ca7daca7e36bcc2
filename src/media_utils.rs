//! Shared media helpers.
//!
//! Classification, identifiers, hashing and byte loading used by both
//! source variants and the gallery.

use crate::errors::{AppError, AppResult};
use crate::models::MediaKind;
use rand::RngCore;
use std::path::Path;
use time::OffsetDateTime;

/// Random 128-bit identifier, hex encoded.
pub fn new_item_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Guess the mime type of a path from its extension.
pub fn mime_for_path(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

/// Gallery kind for a path, or `None` if the file is not an image, video or gif.
pub fn classify_path(path: &Path) -> Option<MediaKind> {
    MediaKind::from_mime(&mime_for_path(path))
}

/// Mime type to send alongside an item's bytes.
pub fn analysis_mime(locator: &str, kind: MediaKind) -> String {
    let guessed = mime_for_path(Path::new(locator));
    match MediaKind::from_mime(&guessed) {
        Some(_) => guessed,
        None => kind.fallback_mime().to_string(),
    }
}

/// Last path segment of a locator, used as the display name.
pub fn name_from_locator(locator: &str) -> String {
    locator
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

/// Resolve a locator to a filesystem path. Accepts plain paths and `file://` URLs.
pub fn locator_path(locator: &str) -> &Path {
    Path::new(locator.strip_prefix("file://").unwrap_or(locator))
}

/// Read the raw bytes behind a display locator.
pub async fn read_media_bytes(locator: &str) -> AppResult<Vec<u8>> {
    let path = locator_path(locator);
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(AppError::InvalidInput(format!("{} is empty", locator)));
    }
    Ok(bytes)
}

/// Content key for in-memory bytes.
pub fn hash_bytes(bytes: &[u8], mime_type: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(mime_type.as_bytes());
    hasher.update(&[0]);
    hasher.update(bytes);
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_ids_are_unique_hex() {
        let a = new_item_id();
        let b = new_item_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_classify_path() {
        assert_eq!(classify_path(Path::new("a/b.JPG")), Some(MediaKind::Image));
        assert_eq!(classify_path(Path::new("clip.mp4")), Some(MediaKind::Video));
        assert_eq!(classify_path(Path::new("fun.gif")), Some(MediaKind::AnimatedImage));
        assert_eq!(classify_path(Path::new("notes.txt")), None);
        assert_eq!(classify_path(Path::new("no_extension")), None);
    }

    #[test]
    fn test_analysis_mime_falls_back_to_kind() {
        assert_eq!(analysis_mime("/x/y.png", MediaKind::Image), "image/png");
        assert_eq!(analysis_mime("/x/asset-123", MediaKind::Video), "video/mp4");
    }

    #[test]
    fn test_name_from_locator() {
        assert_eq!(name_from_locator("/storage/DCIM/IMG_1.jpg"), "IMG_1.jpg");
        assert_eq!(name_from_locator("C:\\pics\\b.png"), "b.png");
        assert_eq!(name_from_locator("/trailing/"), "trailing");
        assert_eq!(name_from_locator(""), "Unknown");
    }

    #[test]
    fn test_hash_bytes_depends_on_mime() {
        assert_ne!(hash_bytes(b"abc", "image/png"), hash_bytes(b"abc", "image/jpeg"));
        assert_eq!(hash_bytes(b"abc", "image/png"), hash_bytes(b"abc", "image/png"));
    }

    #[tokio::test]
    async fn test_read_media_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let url = format!("file://{}", path.display());
        assert_eq!(read_media_bytes(&url).await.unwrap(), b"jpeg");

        let empty = dir.path().join("empty.jpg");
        std::fs::write(&empty, b"").unwrap();
        assert!(read_media_bytes(&empty.to_string_lossy()).await.is_err());
    }
}
