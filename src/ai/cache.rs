use super::{MediaAnalyzer, RankCandidate};
use crate::media_utils::hash_bytes;
use crate::models::MediaMetadata;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;

/// Session memo of successful analyses, keyed by content hash.
///
/// Identical bytes under different names are only sent once. Failed
/// analyses are not stored so they can be retried.
#[derive(Clone)]
pub struct CachedAnalyzer {
    inner: Arc<dyn MediaAnalyzer>,
    cache: Cache<String, MediaMetadata>,
}

impl CachedAnalyzer {
    pub fn new(inner: Arc<dyn MediaAnalyzer>, capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(capacity).build();
        Self { inner, cache }
    }
}

#[async_trait]
impl MediaAnalyzer for CachedAnalyzer {
    async fn analyze(&self, bytes: &[u8], mime_type: &str) -> MediaMetadata {
        let key = hash_bytes(bytes, mime_type);
        if let Some(hit) = self.cache.get(&key).await {
            log::debug!("Analysis cache hit for {}", key);
            return hit;
        }

        let metadata = self.inner.analyze(bytes, mime_type).await;
        if !metadata.is_failed() {
            self.cache.insert(key, metadata.clone()).await;
        }
        metadata
    }

    async fn rank(&self, query: &str, candidates: &[RankCandidate]) -> Vec<String> {
        self.inner.rank(query, candidates).await
    }
}
