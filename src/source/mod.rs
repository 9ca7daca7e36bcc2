//! Media sources.
//!
//! Two mutually exclusive ways to discover media: walking a directory the
//! user granted access to, or paging through a media library index.

pub mod directory;
pub mod library;

use crate::models::MediaKind;
use std::path::Path;

/// A file discovered by a source, not yet part of the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaCandidate {
    pub name: String,
    pub locator: String,
    pub mime_type: String,
    pub kind: MediaKind,
    /// Unix milliseconds, if the source knows it.
    pub created_at: Option<i64>,
}

impl MediaCandidate {
    /// Build a candidate for a local file, or `None` if it is not gallery media.
    pub fn from_path(path: &Path) -> Option<Self> {
        let mime_type = crate::media_utils::mime_for_path(path);
        let kind = MediaKind::from_mime(&mime_type)?;
        let name = path.file_name()?.to_string_lossy().to_string();
        Some(Self {
            name,
            locator: path.to_string_lossy().to_string(),
            mime_type,
            kind,
            created_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_from_path() {
        let candidate = MediaCandidate::from_path(Path::new("/pics/trip/beach.png")).unwrap();
        assert_eq!(candidate.name, "beach.png");
        assert_eq!(candidate.locator, "/pics/trip/beach.png");
        assert_eq!(candidate.mime_type, "image/png");
        assert_eq!(candidate.kind, MediaKind::Image);

        assert!(MediaCandidate::from_path(Path::new("/pics/readme.md")).is_none());
    }
}
