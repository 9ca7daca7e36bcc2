//! Gallery data model.
//!
//! Items are persisted as a JSON array, so field names follow the camelCase
//! layout the storage entry has always used.

use serde::{Deserialize, Serialize};

/// Description assigned at ingestion time, replaced only by a successful analysis.
pub const UNANALYZED: &str = "Unanalyzed";

/// Description the analysis client reports when a request could not be completed.
pub const ANALYSIS_FAILED: &str = "Analysis failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    Image,
    Video,
    #[serde(alias = "gif")]
    AnimatedImage,
}

impl MediaKind {
    /// Classify a mime type. Returns `None` for anything that is not gallery media.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.to_ascii_lowercase();
        if mime.contains("gif") {
            Some(MediaKind::AnimatedImage)
        } else if mime.starts_with("image/") {
            Some(MediaKind::Image)
        } else if mime.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Mime type used when the locator itself gives no hint.
    pub fn fallback_mime(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
            MediaKind::AnimatedImage => "image/gif",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dominant_colors: Vec<String>,
    #[serde(default)]
    pub objects: Vec<String>,
    #[serde(default)]
    pub mood: String,
}

impl MediaMetadata {
    pub fn unanalyzed() -> Self {
        Self {
            description: UNANALYZED.to_string(),
            tags: Vec::new(),
            dominant_colors: Vec::new(),
            objects: Vec::new(),
            mood: "unknown".to_string(),
        }
    }

    pub fn analysis_failed() -> Self {
        Self {
            description: ANALYSIS_FAILED.to_string(),
            tags: vec!["error".to_string()],
            dominant_colors: Vec::new(),
            objects: Vec::new(),
            mood: "error".to_string(),
        }
    }

    pub fn is_unanalyzed(&self) -> bool {
        self.description == UNANALYZED
    }

    pub fn is_failed(&self) -> bool {
        self.description == ANALYSIS_FAILED && self.mood == "error"
    }
}

impl Default for MediaMetadata {
    fn default() -> Self {
        Self::unanalyzed()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    /// Display locator: a local path for both source variants.
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub name: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub metadata: Option<MediaMetadata>,
}

impl MediaItem {
    /// Items without metadata are treated the same as sentinel-tagged ones.
    pub fn needs_analysis(&self) -> bool {
        self.metadata
            .as_ref()
            .map(MediaMetadata::is_unanalyzed)
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub name: String,
    pub count: usize,
    pub thumbnail_url: Option<String>,
    pub thumbnail_type: Option<MediaKind>,
}

/// Counter reported after each item of an indexing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexProgress {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum GalleryStatus {
    #[default]
    Idle,
    Indexing,
    Searching,
}
