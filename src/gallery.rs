//! Gallery state.
//!
//! `GalleryState` is the single owner and writer of the collection. Sources
//! feed it candidates, it persists after every mutation, and it drives
//! on-demand indexing and search through the analysis client. Callers get
//! read-only views.

use crate::ai::{similarity_query, MediaAnalyzer, RankCandidate};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::media_utils;
use crate::models::{Album, GalleryStatus, IndexProgress, MediaItem, MediaKind, MediaMetadata};
use crate::source::directory::DirectoryGrant;
use crate::source::library::{MediaLibrary, MediaQuery, NativeAsset};
use crate::source::MediaCandidate;
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub const AI_MODE_KEY: &str = "ai_mode_enabled";

/// Receives `(processed, total)` after each item of an indexing pass.
pub type ProgressCallback = Arc<dyn Fn(IndexProgress) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmPrompt {
    StartIndexing { pending: usize },
    EnableAiMode,
}

impl ConfirmPrompt {
    pub fn message(&self) -> String {
        match self {
            ConfirmPrompt::StartIndexing { pending } => format!(
                "AI Search requires analyzing {} items. This sends each item to the analysis service and may take time. Start indexing?",
                pending
            ),
            ConfirmPrompt::EnableAiMode => {
                "Image similarity search requires AI Analysis. Enable AI Mode and proceed?"
                    .to_string()
            }
        }
    }
}

/// Asks the user to approve a costly or mode-changing step.
pub trait UserPrompt: Send + Sync {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

/// What to show when a ranking request comes back empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyRankingPolicy {
    /// An empty result list.
    #[default]
    ShowNothing,
    /// Drop the filter and show the whole collection.
    ShowEverything,
}

impl FromStr for EmptyRankingPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "nothing" | "empty" => Ok(EmptyRankingPolicy::ShowNothing),
            "all" | "everything" => Ok(EmptyRankingPolicy::ShowEverything),
            other => Err(AppError::Config(format!(
                "Unknown empty-ranking policy {:?} (expected \"none\" or \"all\")",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexOutcome {
    /// The collection after the pass, including any partial success.
    Ready(Vec<MediaItem>),
    /// The user declined; nothing changed.
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The filtered view now holds this many items.
    Filtered(usize),
    /// The filtered view was removed.
    Cleared,
    /// The user declined a confirmation; the filtered view is untouched.
    Declined,
}

pub struct GalleryState {
    items: Vec<MediaItem>,
    albums: Vec<Album>,
    /// Ids of the last search result, in result order.
    filtered: Option<Vec<String>>,
    ai_mode: bool,
    has_saved_credential: bool,
    status: GalleryStatus,
    progress: IndexProgress,
    db: Arc<Database>,
    analyzer: Option<Arc<dyn MediaAnalyzer>>,
    prompt: Arc<dyn UserPrompt>,
    on_progress: Option<ProgressCallback>,
    empty_ranking: EmptyRankingPolicy,
}

impl GalleryState {
    /// Restore the persisted collection, credential flag and AI mode.
    ///
    /// Without an analyzer every AI operation fails with
    /// [`AppError::AiUnavailable`]; everything else keeps working.
    pub fn open(
        db: Arc<Database>,
        analyzer: Option<Arc<dyn MediaAnalyzer>>,
        prompt: Arc<dyn UserPrompt>,
    ) -> Self {
        let items = db.load_collection().unwrap_or_default();
        let has_saved_credential = db.load_credential().is_some();
        let ai_mode = db.config_enabled(AI_MODE_KEY);
        log::info!(
            "Gallery opened with {} item(s), AI mode {}",
            items.len(),
            if ai_mode { "on" } else { "off" }
        );

        Self {
            items,
            albums: Vec::new(),
            filtered: None,
            ai_mode,
            has_saved_credential,
            status: GalleryStatus::Idle,
            progress: IndexProgress::default(),
            db,
            analyzer,
            prompt,
            on_progress: None,
            empty_ranking: EmptyRankingPolicy::default(),
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn with_empty_ranking(mut self, policy: EmptyRankingPolicy) -> Self {
        self.empty_ranking = policy;
        self
    }

    // --- Read-only views ---

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    /// The filtered view if a search is active, otherwise the whole collection.
    pub fn display_items(&self) -> Vec<&MediaItem> {
        match &self.filtered {
            Some(ids) => ids.iter().filter_map(|id| self.find(id)).collect(),
            None => self.items.iter().collect(),
        }
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered.is_some()
    }

    pub fn find(&self, id: &str) -> Option<&MediaItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn ai_mode(&self) -> bool {
        self.ai_mode
    }

    pub fn has_saved_credential(&self) -> bool {
        self.has_saved_credential
    }

    pub fn status(&self) -> GalleryStatus {
        self.status
    }

    pub fn progress(&self) -> IndexProgress {
        self.progress
    }

    pub fn pending_analysis(&self) -> usize {
        self.items.iter().filter(|item| item.needs_analysis()).count()
    }

    // --- Mutations ---

    fn persist(&self) {
        if let Err(e) = self.db.save_collection(&self.items) {
            log::warn!(
                "Failed to save gallery data to storage (probably quota exceeded): {}",
                e
            );
        }
    }

    fn analyzer(&self) -> AppResult<Arc<dyn MediaAnalyzer>> {
        self.analyzer.clone().ok_or_else(|| {
            AppError::AiUnavailable("no analysis service is configured".to_string())
        })
    }

    pub fn set_ai_mode(&mut self, enabled: bool) {
        self.ai_mode = enabled;
        let value = if enabled { "true" } else { "false" };
        if let Err(e) = self.db.set_config(AI_MODE_KEY, value) {
            log::warn!("Failed to persist AI mode: {}", e);
        }
    }

    pub fn toggle_ai_mode(&mut self) -> bool {
        self.set_ai_mode(!self.ai_mode);
        self.ai_mode
    }

    /// Add candidates whose name is not in the collection yet.
    ///
    /// New items go to the front, newest ingestion first, with sentinel
    /// metadata. Nothing is analyzed here. Returns the number added.
    pub fn ingest(&mut self, candidates: Vec<MediaCandidate>) -> usize {
        let mut names: HashSet<String> = self.items.iter().map(|i| i.name.clone()).collect();
        let fresh: Vec<MediaCandidate> = candidates
            .into_iter()
            .filter(|c| names.insert(c.name.clone()))
            .collect();

        if fresh.is_empty() {
            log::info!("Ingest: nothing new");
            return 0;
        }

        let added = fresh.len();
        let now = media_utils::now_millis();
        let mut new_items: Vec<MediaItem> = fresh
            .into_iter()
            .map(|c| MediaItem {
                id: media_utils::new_item_id(),
                url: c.locator,
                kind: c.kind,
                name: c.name,
                timestamp: c.created_at.unwrap_or(now),
                metadata: Some(MediaMetadata::unanalyzed()),
            })
            .collect();
        new_items.reverse();
        new_items.append(&mut self.items);
        self.items = new_items;

        log::info!("Ingest: added {} item(s), collection now {}", added, self.items.len());
        self.persist();
        added
    }

    /// Pick a directory, remember it, and ingest everything under it.
    pub async fn sync_directory(&mut self, root: impl Into<PathBuf>) -> AppResult<usize> {
        let grant = DirectoryGrant::grant(root)?;
        if let Err(e) = self.db.save_credential(&grant) {
            log::warn!("Failed to save directory credential: {}", e);
        } else {
            self.has_saved_credential = true;
        }
        let candidates = grant.scan().await?;
        Ok(self.ingest(candidates))
    }

    /// Re-walk the remembered directory after re-checking access.
    pub async fn resync_directory(&mut self) -> AppResult<usize> {
        let grant = self.db.load_credential().ok_or_else(|| {
            AppError::InvalidInput("No directory has been synced yet".to_string())
        })?;
        let candidates = grant.scan().await?;
        Ok(self.ingest(candidates))
    }

    pub fn forget_directory(&mut self) -> AppResult<()> {
        self.db.remove_credential()?;
        self.has_saved_credential = false;
        Ok(())
    }

    pub async fn load_albums(&mut self, library: &dyn MediaLibrary) -> AppResult<&[Album]> {
        self.albums = library.albums().await?;
        Ok(&self.albums)
    }

    /// Fetch one page from the media library.
    ///
    /// A fresh load replaces the collection; `load_more` appends the page
    /// that starts at the current collection length.
    pub async fn sync_library(
        &mut self,
        library: &dyn MediaLibrary,
        album_identifier: Option<String>,
        load_more: bool,
        page_size: usize,
    ) -> AppResult<usize> {
        self.status = GalleryStatus::Indexing;
        let offset = if load_more { self.items.len() } else { 0 };
        let query = MediaQuery::page(page_size, offset, album_identifier);
        let page = library.fetch(&query).await;
        self.status = GalleryStatus::Idle;
        let page = page?;

        if !load_more {
            self.items.clear();
            self.filtered = None;
        }

        let now = media_utils::now_millis();
        let added = page.len();
        self.items
            .extend(page.into_iter().map(|asset| item_from_asset(asset, now)));

        log::info!(
            "Library sync: {} item(s) at offset {}, collection now {}",
            added,
            offset,
            self.items.len()
        );
        self.persist();
        Ok(added)
    }

    /// Analyze every item still carrying the sentinel description.
    ///
    /// No-op without confirmation or network traffic when nothing is
    /// pending. Items are processed one at a time in collection order; a
    /// failing item keeps its sentinel and the pass continues.
    pub async fn ensure_indexed(&mut self) -> AppResult<IndexOutcome> {
        let pending: Vec<(String, String, MediaKind)> = self
            .items
            .iter()
            .filter(|item| item.needs_analysis())
            .map(|item| (item.id.clone(), item.url.clone(), item.kind))
            .collect();

        if pending.is_empty() {
            return Ok(IndexOutcome::Ready(self.items.clone()));
        }

        let analyzer = self.analyzer()?;
        let total = pending.len();
        if !self
            .prompt
            .confirm(&ConfirmPrompt::StartIndexing { pending: total })
        {
            log::info!("Indexing of {} item(s) declined", total);
            return Ok(IndexOutcome::Declined);
        }

        log::info!("Indexing {} item(s)", total);
        self.status = GalleryStatus::Indexing;
        self.report_progress(IndexProgress { current: 0, total });

        let mut analyzed = 0;
        for (index, (id, url, kind)) in pending.into_iter().enumerate() {
            match media_utils::read_media_bytes(&url).await {
                Ok(bytes) => {
                    let mime = media_utils::analysis_mime(&url, kind);
                    let metadata = analyzer.analyze(&bytes, &mime).await;
                    if metadata.is_failed() || metadata.is_unanalyzed() {
                        log::warn!("Analysis failed for {}", url);
                    } else if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
                        item.metadata = Some(metadata);
                        analyzed += 1;
                        self.persist();
                    }
                }
                Err(e) => log::warn!("Analysis failed for {}: {}", url, e),
            }
            self.report_progress(IndexProgress {
                current: index + 1,
                total,
            });
        }

        self.status = GalleryStatus::Idle;
        log::info!(
            "Indexing finished: {} analyzed, {} failed",
            analyzed,
            total - analyzed
        );
        Ok(IndexOutcome::Ready(self.items.clone()))
    }

    fn report_progress(&mut self, progress: IndexProgress) {
        self.progress = progress;
        if let Some(callback) = &self.on_progress {
            callback(progress);
        }
    }

    /// Substring match on names, or semantic ranking when `ai_enabled`.
    pub async fn search_by_text(&mut self, query: &str, ai_enabled: bool) -> AppResult<SearchOutcome> {
        let query = query.trim();

        if !ai_enabled {
            if query.is_empty() {
                self.clear_filter();
                return Ok(SearchOutcome::Cleared);
            }
            let lower = query.to_lowercase();
            let ids: Vec<String> = self
                .items
                .iter()
                .filter(|item| item.name.to_lowercase().contains(&lower))
                .map(|item| item.id.clone())
                .collect();
            let count = ids.len();
            self.filtered = Some(ids);
            return Ok(SearchOutcome::Filtered(count));
        }

        let analyzer = self.analyzer()?;
        let items = match self.ensure_indexed().await? {
            IndexOutcome::Ready(items) => items,
            IndexOutcome::Declined => return Ok(SearchOutcome::Declined),
        };

        self.status = GalleryStatus::Searching;
        let candidates: Vec<RankCandidate> = items.iter().map(RankCandidate::from).collect();
        let ranked = analyzer.rank(query, &candidates).await;
        self.status = GalleryStatus::Idle;
        Ok(self.apply_ranking(ranked))
    }

    /// Rank the collection by similarity to an image.
    ///
    /// Turns AI mode on first, asking the user if it was off.
    pub async fn search_by_image(&mut self, bytes: &[u8], mime_type: &str) -> AppResult<SearchOutcome> {
        let analyzer = self.analyzer()?;
        if !self.ai_mode {
            if !self.prompt.confirm(&ConfirmPrompt::EnableAiMode) {
                return Ok(SearchOutcome::Declined);
            }
            self.set_ai_mode(true);
        }

        let items = match self.ensure_indexed().await? {
            IndexOutcome::Ready(items) => items,
            IndexOutcome::Declined => return Ok(SearchOutcome::Declined),
        };

        self.status = GalleryStatus::Searching;
        let profile = analyzer.analyze(bytes, mime_type).await;
        let ranked = if profile.is_failed() {
            log::warn!("Could not describe the query image; no similarity ranking");
            Vec::new()
        } else {
            let candidates: Vec<RankCandidate> = items.iter().map(RankCandidate::from).collect();
            analyzer.rank(&similarity_query(&profile), &candidates).await
        };
        self.status = GalleryStatus::Idle;
        Ok(self.apply_ranking(ranked))
    }

    /// Keep the remote order; ignore unknown and repeated ids.
    fn apply_ranking(&mut self, ranked: Vec<String>) -> SearchOutcome {
        let known: HashSet<&str> = self.items.iter().map(|i| i.id.as_str()).collect();
        let mut seen = HashSet::new();
        let ids: Vec<String> = ranked
            .into_iter()
            .filter(|id| known.contains(id.as_str()) && seen.insert(id.clone()))
            .collect();

        if ids.is_empty() && self.empty_ranking == EmptyRankingPolicy::ShowEverything {
            self.filtered = None;
            return SearchOutcome::Cleared;
        }

        let count = ids.len();
        self.filtered = Some(ids);
        SearchOutcome::Filtered(count)
    }

    pub fn clear_filter(&mut self) {
        self.filtered = None;
    }
}

fn item_from_asset(asset: NativeAsset, now: i64) -> MediaItem {
    let kind = MediaKind::from_mime(&asset.mime_type).unwrap_or(MediaKind::Image);
    MediaItem {
        id: media_utils::new_item_id(),
        name: media_utils::name_from_locator(&asset.identifier),
        url: asset.identifier,
        kind,
        timestamp: asset.creation_date.unwrap_or(now),
        metadata: Some(MediaMetadata::unanalyzed()),
    }
}
