//! Directory-walk source.
//!
//! The user grants read access to one root directory. The grant is kept in
//! storage and re-validated before every reuse, since the directory can be
//! moved, unmounted or have its permissions changed between sessions.

use super::MediaCandidate;
use crate::capture_date;
use crate::errors::{AppError, AppResult};
use crate::media_utils;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Stored proof that the user picked `root` for syncing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryGrant {
    pub root: PathBuf,
    pub granted_at: i64,
}

impl DirectoryGrant {
    /// Grant access to a freshly picked directory.
    pub fn grant(root: impl Into<PathBuf>) -> AppResult<Self> {
        let grant = Self {
            root: root.into(),
            granted_at: media_utils::now_millis(),
        };
        grant.validate()?;
        Ok(grant)
    }

    /// Check the root is still a readable directory.
    pub fn validate(&self) -> AppResult<()> {
        let meta = fs::metadata(&self.root).map_err(|e| {
            AppError::PermissionDenied(format!("{}: {}", self.root.display(), e))
        })?;
        if !meta.is_dir() {
            return Err(AppError::PermissionDenied(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        fs::read_dir(&self.root).map_err(|e| {
            AppError::PermissionDenied(format!("{}: {}", self.root.display(), e))
        })?;
        Ok(())
    }

    /// Validate the grant, then walk the tree on a blocking thread.
    pub async fn scan(&self) -> AppResult<Vec<MediaCandidate>> {
        self.validate()?;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || walk_directory(&root))
            .await
            .map_err(|e| AppError::Io(format!("Directory walk aborted: {}", e)))?
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Collect every image, video and gif below `root`.
///
/// Uses an explicit stack instead of recursion. Hidden entries and symlinks
/// are skipped; unreadable sub-directories are logged and skipped. Entries
/// are visited in name order so repeated walks produce the same sequence.
pub fn walk_directory(root: &Path) -> AppResult<Vec<MediaCandidate>> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if dir == root => return Err(e.into()),
            Err(e) => {
                log::warn!("Skipping unreadable directory {:?}: {}", dir, e);
                continue;
            }
        };

        let mut entries: Vec<_> = entries.filter_map(|entry| entry.ok()).collect();
        entries.sort_by_key(|entry| entry.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            let name = entry.file_name();
            if is_hidden(&name.to_string_lossy()) {
                continue;
            }
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    log::warn!("Skipping {:?}: {}", entry.path(), e);
                    continue;
                }
            };

            let path = entry.path();
            if file_type.is_dir() {
                subdirs.push(path);
            } else if file_type.is_file() {
                if let Some(mut candidate) = MediaCandidate::from_path(&path) {
                    candidate.created_at = capture_date::capture_millis(&path);
                    found.push(candidate);
                }
            }
        }

        // Reversed so the first sub-directory is popped next.
        stack.extend(subdirs.into_iter().rev());
    }

    log::info!("Directory walk of {:?} found {} media file(s)", root, found.len());
    Ok(found)
}
