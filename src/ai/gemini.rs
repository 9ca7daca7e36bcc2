//! Google Gemini client.
//!
//! Uses the `generateContent` REST endpoint with a JSON response schema so
//! the model answers in the exact shape [`super::parse_metadata`] and
//! [`super::parse_ranking`] validate.

use super::{parse_metadata, parse_ranking, MediaAnalyzer, RankCandidate};
use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::models::MediaMetadata;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const ANALYZE_INSTRUCTION: &str = "Analyze this media for a private digital archive. \
Provide an accurate and exhaustive description of the content, including subjects, \
clothing, environment and actions, plus searchable keywords.";

pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: &str, base_url: &str, model: &str, timeout_secs: u64) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::AiUnavailable(
                "Gemini API key cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let api_key = config.api_key.as_deref().ok_or_else(|| {
            AppError::AiUnavailable(
                "API key is missing. Set GEMINI_API_KEY in the environment or .env".to_string(),
            )
        })?;
        Self::new(api_key, &config.api_base, &config.model, config.timeout_secs)
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Send one request and return the text of the first candidate.
    async fn generate(&self, request: &GenerateContentRequest) -> AppResult<String> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AppError::AnalysisFailed(format!(
                "Gemini API error ({}): {}",
                status, message
            )));
        }

        extract_text(&body)
    }

    async fn try_analyze(&self, bytes: &[u8], mime_type: &str) -> AppResult<MediaMetadata> {
        let request = analyze_request(bytes, mime_type);
        let text = self.generate(&request).await?;
        parse_metadata(&text)
    }

    async fn try_rank(&self, query: &str, candidates: &[RankCandidate]) -> AppResult<Vec<String>> {
        let request = rank_request(query, candidates)?;
        let text = self.generate(&request).await?;
        parse_ranking(&text, candidates)
    }
}

#[async_trait]
impl MediaAnalyzer for GeminiClient {
    async fn analyze(&self, bytes: &[u8], mime_type: &str) -> MediaMetadata {
        match self.try_analyze(bytes, mime_type).await {
            Ok(metadata) => metadata,
            Err(e) => {
                log::error!("AI Analysis Error: {}", e);
                MediaMetadata::analysis_failed()
            }
        }
    }

    async fn rank(&self, query: &str, candidates: &[RankCandidate]) -> Vec<String> {
        if candidates.is_empty() {
            return Vec::new();
        }
        match self.try_rank(query, candidates).await {
            Ok(ids) => ids,
            Err(e) => {
                log::error!("Semantic Search Error: {}", e);
                Vec::new()
            }
        }
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn text_part(text: impl Into<String>) -> Part {
    Part {
        text: Some(text.into()),
        ..Part::default()
    }
}

fn metadata_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "description": {
                "type": "STRING",
                "description": "Highly detailed description of all visual elements."
            },
            "tags": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Searchable keywords including subjects, clothing, environment, and actions."
            },
            "dominantColors": { "type": "ARRAY", "items": { "type": "STRING" } },
            "objects": { "type": "ARRAY", "items": { "type": "STRING" } },
            "mood": { "type": "STRING" }
        },
        "required": ["description", "tags", "dominantColors", "objects", "mood"]
    })
}

fn analyze_request(bytes: &[u8], mime_type: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![
                text_part(ANALYZE_INSTRUCTION),
                Part {
                    inline_data: Some(InlineData {
                        mime_type: mime_type.to_string(),
                        data: B64.encode(bytes),
                    }),
                    ..Part::default()
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: metadata_schema(),
        },
    }
}

fn rank_request(query: &str, candidates: &[RankCandidate]) -> AppResult<GenerateContentRequest> {
    let instruction = format!(
        "System: Semantic Search Engine. Query: {}. Compare this query against the following \
         image descriptions. Return a JSON array of item IDs sorted by relevance (most relevant first).",
        serde_json::to_string(query)?
    );
    Ok(GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![
                text_part(instruction),
                text_part(serde_json::to_string(candidates)?),
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: json!({ "type": "ARRAY", "items": { "type": "STRING" } }),
        },
    })
}

/// Pull the concatenated text parts of the first candidate out of a response body.
fn extract_text(body: &str) -> AppResult<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| AppError::AnalysisFailed(format!("Failed to parse response: {}", e)))?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AppError::AnalysisFailed(format!(
            "Content blocked by Gemini safety filters: {}",
            reason
        )));
    }

    let text: String = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AppError::AnalysisFailed("Empty response from AI".to_string()));
    }
    Ok(text)
}
