//! Media-library source.
//!
//! A paged index of the device's media, optionally scoped to one album.
//! On desktop the index is a pictures folder whose immediate
//! sub-directories act as albums.

use super::MediaCandidate;
use crate::errors::{AppError, AppResult};
use crate::models::{Album, MediaKind};
use crate::source::directory::walk_directory;
use async_trait::async_trait;
use moka::future::Cache;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Newest first.
    #[default]
    CreationDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaQuery {
    pub quantity: usize,
    pub sort: SortOrder,
    pub offset: usize,
    pub album_identifier: Option<String>,
}

impl MediaQuery {
    pub fn page(quantity: usize, offset: usize, album_identifier: Option<String>) -> Self {
        Self {
            quantity,
            sort: SortOrder::CreationDate,
            offset,
            album_identifier,
        }
    }
}

/// One entry of a library page: enough to build an item without opening the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeAsset {
    pub identifier: String,
    pub mime_type: String,
    /// Unix milliseconds.
    pub creation_date: Option<i64>,
}

#[async_trait]
pub trait MediaLibrary: Send + Sync {
    async fn albums(&self) -> AppResult<Vec<Album>>;

    async fn fetch(&self, query: &MediaQuery) -> AppResult<Vec<NativeAsset>>;
}

const LISTING_CACHE_CAPACITY: u64 = 64;

pub struct FolderLibrary {
    root: PathBuf,
    /// Sorted listing per scope, taken when a fresh load starts at offset 0.
    /// Later pages slice it instead of walking the tree again.
    listings: Cache<PathBuf, Arc<Vec<NativeAsset>>>,
}

impl FolderLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            listings: Cache::builder().max_capacity(LISTING_CACHE_CAPACITY).build(),
        }
    }

    /// The user's pictures folder, if the platform defines one.
    pub fn default_root() -> Option<PathBuf> {
        dirs::picture_dir()
    }

    /// Resolve the directory a query covers. Both sides are canonicalized so
    /// `..` segments and symlinks cannot reach outside the root.
    fn scope(&self, album_identifier: Option<&str>) -> AppResult<PathBuf> {
        let root = self.root.canonicalize().map_err(|e| {
            AppError::PermissionDenied(format!("{}: {}", self.root.display(), e))
        })?;
        let Some(album) = album_identifier else {
            return Ok(root);
        };
        let unknown = || AppError::InvalidInput(format!("Unknown album: {}", album));
        let path = Path::new(album).canonicalize().map_err(|_| unknown())?;
        if !path.starts_with(&root) || !path.is_dir() {
            return Err(unknown());
        }
        Ok(path)
    }

    async fn listing(&self, scope: PathBuf, refresh: bool) -> AppResult<Arc<Vec<NativeAsset>>> {
        if !refresh {
            if let Some(listing) = self.listings.get(&scope).await {
                return Ok(listing);
            }
        }

        let dir = scope.clone();
        let listing = tokio::task::spawn_blocking(move || -> AppResult<Vec<NativeAsset>> {
            let mut candidates = walk_directory(&dir)?;
            sort_newest_first(&mut candidates);
            Ok(candidates
                .into_iter()
                .map(|c| NativeAsset {
                    identifier: c.locator,
                    mime_type: c.mime_type,
                    creation_date: c.created_at,
                })
                .collect())
        })
        .await
        .map_err(|e| AppError::Io(format!("Library query aborted: {}", e)))??;

        log::debug!("Library listing of {:?}: {} asset(s)", scope, listing.len());
        let listing = Arc::new(listing);
        self.listings.insert(scope, listing.clone()).await;
        Ok(listing)
    }
}

/// Newest first, ties broken by identifier so pages never overlap.
fn sort_newest_first(candidates: &mut [MediaCandidate]) {
    candidates.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.locator.cmp(&b.locator))
    });
}

fn album_for(dir: &Path) -> AppResult<Album> {
    let mut candidates = walk_directory(dir)?;
    sort_newest_first(&mut candidates);
    let cover = candidates.first();
    Ok(Album {
        id: dir.to_string_lossy().to_string(),
        name: dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| dir.to_string_lossy().to_string()),
        count: candidates.len(),
        thumbnail_url: cover.map(|c| c.locator.clone()),
        thumbnail_type: cover.map(|c| match c.kind {
            MediaKind::Video => MediaKind::Video,
            _ => MediaKind::Image,
        }),
    })
}

#[async_trait]
impl MediaLibrary for FolderLibrary {
    async fn albums(&self) -> AppResult<Vec<Album>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || -> AppResult<Vec<Album>> {
            let mut dirs: Vec<PathBuf> = fs::read_dir(&root)?
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
                .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
                .map(|entry| entry.path())
                .collect();
            dirs.sort();

            let mut albums = Vec::with_capacity(dirs.len());
            for dir in dirs {
                match album_for(&dir) {
                    Ok(album) => albums.push(album),
                    Err(e) => log::warn!("Skipping album {:?}: {}", dir, e),
                }
            }
            Ok(albums)
        })
        .await
        .map_err(|e| AppError::Io(format!("Album listing aborted: {}", e)))?
    }

    async fn fetch(&self, query: &MediaQuery) -> AppResult<Vec<NativeAsset>> {
        let scope = self.scope(query.album_identifier.as_deref())?;
        let listing = self.listing(scope, query.offset == 0).await?;
        Ok(listing
            .iter()
            .skip(query.offset)
            .take(query.quantity)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn library_fixture() -> (tempfile::TempDir, FolderLibrary) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for i in 0..5 {
            touch(&root.join(format!("Camera/img{}.jpg", i)));
        }
        touch(&root.join("Screens/s1.png"));
        touch(&root.join("Screens/rec.mp4"));
        touch(&root.join("loose.gif"));
        let library = FolderLibrary::new(root);
        (dir, library)
    }

    #[tokio::test]
    async fn test_albums_are_subdirectories() {
        let (_dir, library) = library_fixture();
        let albums = library.albums().await.unwrap();
        let names: Vec<_> = albums.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Camera", "Screens"]);
        assert_eq!(albums[0].count, 5);
        assert_eq!(albums[1].count, 2);
        assert!(albums[0].thumbnail_url.is_some());
    }

    #[tokio::test]
    async fn test_pages_are_disjoint() {
        let (_dir, library) = library_fixture();

        let first = library.fetch(&MediaQuery::page(3, 0, None)).await.unwrap();
        assert_eq!(first.len(), 3);
        let second = library
            .fetch(&MediaQuery::page(100, first.len(), None))
            .await
            .unwrap();
        assert_eq!(second.len(), 5);

        let ids: HashSet<_> = first.iter().chain(second.iter()).map(|a| &a.identifier).collect();
        assert_eq!(ids.len(), 8);
    }

    #[tokio::test]
    async fn test_album_scope() {
        let (dir, library) = library_fixture();
        let album = dir.path().join("Screens").to_string_lossy().to_string();

        let assets = library
            .fetch(&MediaQuery::page(10, 0, Some(album)))
            .await
            .unwrap();
        assert_eq!(assets.len(), 2);
        assert!(assets.iter().any(|a| a.mime_type == "video/mp4"));

        let outside = library
            .fetch(&MediaQuery::page(10, 0, Some("/etc".to_string())))
            .await;
        assert!(matches!(outside, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_album_scope_rejects_parent_segments() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Pictures");
        touch(&root.join("Camera/a.jpg"));
        touch(&dir.path().join("elsewhere/private.jpg"));
        let library = FolderLibrary::new(&root);

        let escape = root.join("Camera/../../elsewhere").to_string_lossy().to_string();
        let result = library.fetch(&MediaQuery::page(10, 0, Some(escape))).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        let dotted = root.join("Camera/../Camera").to_string_lossy().to_string();
        let assets = library
            .fetch(&MediaQuery::page(10, 0, Some(dotted)))
            .await
            .unwrap();
        assert_eq!(assets.len(), 1);
    }

    #[tokio::test]
    async fn test_later_pages_reuse_listing() {
        let (dir, library) = library_fixture();

        let first = library.fetch(&MediaQuery::page(3, 0, None)).await.unwrap();
        touch(&dir.path().join("Camera/late.jpg"));
        let rest = library
            .fetch(&MediaQuery::page(100, first.len(), None))
            .await
            .unwrap();
        assert_eq!(first.len() + rest.len(), 8);
        assert!(!rest.iter().any(|a| a.identifier.ends_with("late.jpg")));

        // A fresh load walks again.
        let fresh = library.fetch(&MediaQuery::page(100, 0, None)).await.unwrap();
        assert_eq!(fresh.len(), 9);
    }
}
