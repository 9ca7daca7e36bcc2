//! Remote analysis.
//!
//! Two stateless capabilities: describe a piece of media, and rank a set of
//! described items against a free-text query. Neither ever returns an
//! error to the caller. A failed analysis comes back as
//! [`MediaMetadata::analysis_failed`] and a failed ranking as an empty list.

pub mod cache;
pub mod gemini;

use crate::errors::{AppError, AppResult};
use crate::models::{MediaItem, MediaMetadata, ANALYSIS_FAILED, UNANALYZED};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What the ranking request is told about each item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankCandidate {
    pub id: String,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl From<&MediaItem> for RankCandidate {
    fn from(item: &MediaItem) -> Self {
        Self {
            id: item.id.clone(),
            description: item.metadata.as_ref().map(|m| m.description.clone()),
            tags: item.metadata.as_ref().map(|m| m.tags.clone()),
        }
    }
}

#[async_trait]
pub trait MediaAnalyzer: Send + Sync {
    /// Describe `bytes`. Returns the failure sentinel instead of an error.
    async fn analyze(&self, bytes: &[u8], mime_type: &str) -> MediaMetadata;

    /// Candidate ids ordered by relevance, most relevant first. Empty on failure.
    async fn rank(&self, query: &str, candidates: &[RankCandidate]) -> Vec<String>;
}

/// Shape the analysis response must have. Every field is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisPayload {
    description: String,
    tags: Vec<String>,
    dominant_colors: Vec<String>,
    objects: Vec<String>,
    mood: String,
}

/// Validate an analysis response body. The remote output is untrusted.
pub fn parse_metadata(text: &str) -> AppResult<MediaMetadata> {
    let payload: AnalysisPayload = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AppError::AnalysisFailed(format!("Malformed analysis response: {}", e)))?;

    let description = payload.description.trim();
    if description.is_empty() {
        return Err(AppError::AnalysisFailed(
            "Analysis response has an empty description".to_string(),
        ));
    }
    if description == UNANALYZED || description == ANALYSIS_FAILED {
        return Err(AppError::AnalysisFailed(format!(
            "Analysis response echoes the reserved description {:?}",
            description
        )));
    }

    Ok(MediaMetadata {
        description: payload.description,
        tags: payload.tags,
        dominant_colors: payload.dominant_colors,
        objects: payload.objects,
        mood: payload.mood,
    })
}

/// Validate a ranking response body: a JSON array of id strings.
/// Ids the request never mentioned and repeats are dropped.
pub fn parse_ranking(text: &str, candidates: &[RankCandidate]) -> AppResult<Vec<String>> {
    let ids: Vec<String> = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AppError::AnalysisFailed(format!("Malformed ranking response: {}", e)))?;

    let known: HashSet<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
    let mut seen = HashSet::new();
    Ok(ids
        .into_iter()
        .filter(|id| known.contains(id.as_str()))
        .filter(|id| seen.insert(id.clone()))
        .collect())
}

/// Text query standing in for an image in similarity search.
pub fn similarity_query(profile: &MediaMetadata) -> String {
    format!(
        "Visual profile: {}. Keywords: {}",
        profile.description,
        profile.tags.join(", ")
    )
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
