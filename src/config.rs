use crate::errors::{AppError, AppResult};
use crate::gallery::EmptyRankingPolicy;
use std::path::PathBuf;

const APP_DATA_FALLBACK_DIR_NAME: &str = "com.visionary.gallery";

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_ANALYSIS_CACHE: u64 = 512;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub timeout_secs: u64,
    pub data_dir: PathBuf,
    pub page_size: usize,
    pub empty_ranking: EmptyRankingPolicy,
    pub analysis_cache_capacity: u64,
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY"));

        let data_dir = match non_empty("VISIONARY_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let empty_ranking = match non_empty("VISIONARY_EMPTY_RANKING").as_deref() {
            None => EmptyRankingPolicy::default(),
            Some(raw) => raw.parse()?,
        };

        Ok(Self {
            api_key,
            api_base: non_empty("VISIONARY_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: non_empty("VISIONARY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_secs: parse_number(&non_empty, "VISIONARY_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            data_dir,
            page_size: parse_number(&non_empty, "VISIONARY_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            empty_ranking,
            analysis_cache_capacity: parse_number(
                &non_empty,
                "VISIONARY_ANALYSIS_CACHE",
                DEFAULT_ANALYSIS_CACHE,
            )?,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("library.db")
    }

    /// Create the data directory if needed.
    pub fn ensure_data_dir(&self) -> AppResult<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        log::debug!("Using app data directory at {:?}", self.data_dir);
        Ok(())
    }
}

fn parse_number<T, F>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{} must be a number, got {:?}", key, raw))),
    }
}

fn default_data_dir() -> AppResult<PathBuf> {
    let base = dirs::data_local_dir()
        .ok_or_else(|| AppError::Config("Could not find local data directory".to_string()))?;
    Ok(base.join(APP_DATA_FALLBACK_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("VISIONARY_DATA_DIR", "/tmp/vg")])).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.empty_ranking, EmptyRankingPolicy::ShowNothing);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/vg/library.db"));
    }

    #[test]
    fn test_google_key_fallback_and_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("VISIONARY_DATA_DIR", "/tmp/vg"),
            ("GEMINI_API_KEY", "  "),
            ("GOOGLE_API_KEY", "g-key"),
            ("VISIONARY_PAGE_SIZE", "50"),
            ("VISIONARY_EMPTY_RANKING", "all"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.empty_ranking, EmptyRankingPolicy::ShowEverything);
    }

    #[test]
    fn test_bad_number_is_config_error() {
        let err = AppConfig::from_lookup(lookup(&[
            ("VISIONARY_DATA_DIR", "/tmp/vg"),
            ("VISIONARY_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
