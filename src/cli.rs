//! Command-line front end.

use crate::ai::cache::CachedAnalyzer;
use crate::ai::gemini::GeminiClient;
use crate::ai::MediaAnalyzer;
use crate::config::AppConfig;
use crate::database::Database;
use crate::gallery::{ConfirmPrompt, GalleryState, IndexOutcome, SearchOutcome, UserPrompt};
use crate::media_utils;
use crate::models::{IndexProgress, MediaItem, MediaKind};
use crate::source::library::FolderLibrary;
use crate::source::MediaCandidate;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "visionary",
    version,
    about = "Local photo and video gallery with AI tagging and semantic search"
)]
pub struct Cli {
    /// Answer yes to every confirmation
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Grant access to a directory and import everything under it
    Sync { dir: PathBuf },
    /// Re-scan the previously granted directory
    Resync,
    /// Drop the saved directory grant
    Forget,
    /// List albums of the media library
    Albums {
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Load a page from the media library
    Library {
        #[arg(long)]
        root: Option<PathBuf>,
        /// Album identifier as printed by `albums`
        #[arg(long)]
        album: Option<String>,
        /// Append the next page instead of starting over
        #[arg(long)]
        more: bool,
    },
    /// Add individual files
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Analyze every item that has not been analyzed yet
    Index,
    /// Search by name, or semantically with --ai
    Search {
        query: String,
        #[arg(long)]
        ai: bool,
    },
    /// Find items that look like an image
    Similar { image: PathBuf },
    /// Turn AI mode on or off
    Ai {
        #[arg(value_enum)]
        action: AiAction,
    },
    /// Print the collection
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AiAction {
    On,
    Off,
    Toggle,
}

/// Reads `y/N` answers from stdin.
pub struct StdinPrompt;

impl UserPrompt for StdinPrompt {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        eprint!("{} [y/N] ", prompt.message());
        if io::stderr().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(e) => {
                log::warn!("Could not read confirmation: {}", e);
                false
            }
        }
    }
}

/// Confirms everything; used with `--yes`.
pub struct AssumeYes;

impl UserPrompt for AssumeYes {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        log::info!("Auto-confirmed: {}", prompt.message());
        true
    }
}

/// Build the analyzer, or `None` when no API key is configured.
fn build_analyzer(config: &AppConfig) -> Option<Arc<dyn MediaAnalyzer>> {
    match GeminiClient::from_config(config) {
        Ok(client) => {
            log::info!("AI analysis enabled with model {}", config.model);
            let client: Arc<dyn MediaAnalyzer> = Arc::new(client);
            Some(Arc::new(CachedAnalyzer::new(
                client,
                config.analysis_cache_capacity,
            )))
        }
        Err(e) => {
            log::warn!("{}. AI features disabled.", e);
            None
        }
    }
}

fn print_progress(progress: IndexProgress) {
    if progress.total > 0 {
        eprintln!("Indexing {}/{}", progress.current, progress.total);
    }
}

fn kind_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
        MediaKind::AnimatedImage => "gif",
    }
}

fn print_items<'a>(items: impl IntoIterator<Item = &'a MediaItem>) {
    for item in items {
        let description = item
            .metadata
            .as_ref()
            .map(|m| m.description.as_str())
            .unwrap_or("-");
        println!(
            "{}  {:<5}  {}  {}",
            item.id,
            kind_label(item.kind),
            item.name,
            description
        );
    }
}

fn print_search(outcome: SearchOutcome, gallery: &GalleryState) {
    match outcome {
        SearchOutcome::Declined => println!("Search cancelled."),
        SearchOutcome::Cleared | SearchOutcome::Filtered(_) => {
            let shown = gallery.display_items();
            println!("{} result(s)", shown.len());
            print_items(shown);
        }
    }
}

fn library_for(root: Option<PathBuf>) -> Result<FolderLibrary> {
    let root = root
        .or_else(FolderLibrary::default_root)
        .ok_or_else(|| anyhow!("No pictures folder found; pass --root"))?;
    Ok(FolderLibrary::new(root))
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env()?;
    config.ensure_data_dir()?;
    let db = Arc::new(
        Database::new(config.database_path())
            .with_context(|| format!("Failed to open {:?}", config.database_path()))?,
    );

    let prompt: Arc<dyn UserPrompt> = if cli.yes {
        Arc::new(AssumeYes)
    } else {
        Arc::new(StdinPrompt)
    };

    let mut gallery = GalleryState::open(db, build_analyzer(&config), prompt)
        .with_progress(Arc::new(print_progress))
        .with_empty_ranking(config.empty_ranking);

    match cli.command {
        Command::Sync { dir } => {
            let added = gallery.sync_directory(dir).await?;
            println!("Added {} item(s); {} total", added, gallery.items().len());
        }
        Command::Resync => {
            let added = gallery.resync_directory().await?;
            println!("Added {} item(s); {} total", added, gallery.items().len());
        }
        Command::Forget => {
            gallery.forget_directory()?;
            println!("Directory access forgotten.");
        }
        Command::Albums { root } => {
            let library = library_for(root)?;
            for album in gallery.load_albums(&library).await? {
                println!("{}  ({} items)  {}", album.name, album.count, album.id);
            }
        }
        Command::Library { root, album, more } => {
            let library = library_for(root)?;
            let added = gallery
                .sync_library(&library, album, more, config.page_size)
                .await?;
            println!("Loaded {} item(s); {} total", added, gallery.items().len());
        }
        Command::Add { files } => {
            let candidates: Vec<MediaCandidate> = files
                .iter()
                .filter_map(|path| {
                    let candidate = MediaCandidate::from_path(path);
                    if candidate.is_none() {
                        log::warn!("Skipping {:?}: not an image or video", path);
                    }
                    candidate
                })
                .collect();
            let added = gallery.ingest(candidates);
            println!("Added {} item(s); {} total", added, gallery.items().len());
        }
        Command::Index => {
            let pending = gallery.pending_analysis();
            if pending == 0 {
                println!("Everything is already indexed.");
                return Ok(());
            }
            match gallery.ensure_indexed().await? {
                IndexOutcome::Ready(_) => println!(
                    "Indexed; {} item(s) still need analysis",
                    gallery.pending_analysis()
                ),
                IndexOutcome::Declined => println!("Indexing cancelled."),
            }
        }
        Command::Search { query, ai } => {
            let use_ai = ai || gallery.ai_mode();
            let outcome = gallery.search_by_text(&query, use_ai).await?;
            print_search(outcome, &gallery);
        }
        Command::Similar { image } => {
            let bytes = media_utils::read_media_bytes(&image.to_string_lossy()).await?;
            let kind = media_utils::classify_path(&image)
                .ok_or_else(|| anyhow!("{:?} is not an image", image))?;
            let mime = media_utils::analysis_mime(&image.to_string_lossy(), kind);
            let outcome = gallery.search_by_image(&bytes, &mime).await?;
            print_search(outcome, &gallery);
        }
        Command::Ai { action } => {
            let enabled = match action {
                AiAction::On => {
                    gallery.set_ai_mode(true);
                    true
                }
                AiAction::Off => {
                    gallery.set_ai_mode(false);
                    false
                }
                AiAction::Toggle => gallery.toggle_ai_mode(),
            };
            println!("AI mode {}", if enabled { "on" } else { "off" });
        }
        Command::List => {
            print_items(gallery.items());
            println!("{} item(s)", gallery.items().len());
        }
    }

    Ok(())
}
