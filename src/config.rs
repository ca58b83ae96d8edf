use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::opponent::OpponentLevel;
use crate::race::DEFAULT_MAX_HANDICAP_WORDS;
use crate::results::{SortBy, DEFAULT_TOP_N};

/// Defaults read from the config file; command line flags win over these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub opponent_level: OpponentLevel,
    /// Largest head start, in words, accepted without asking again.
    pub max_handicap_words: usize,
    pub handicap_words: usize,
    pub top_n: usize,
    pub sort_by: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            opponent_level: OpponentLevel::Medium,
            max_handicap_words: DEFAULT_MAX_HANDICAP_WORDS,
            handicap_words: 3,
            top_n: DEFAULT_TOP_N,
            sort_by: SortBy::default().to_string(),
        }
    }
}

impl Config {
    /// The configured sort key, or newest first when it does not parse.
    pub fn sort_by(&self) -> SortBy {
        self.sort_by.parse().unwrap_or_else(|e| {
            warn!("config sort_by: {e}");
            SortBy::default()
        })
    }

    fn repaired(mut self) -> Self {
        if self.top_n == 0 {
            warn!("config top_n of 0 would hide every result, using {DEFAULT_TOP_N}");
            self.top_n = DEFAULT_TOP_N;
        }
        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// Missing file means defaults; a broken one is logged and ignored.
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg.repaired(),
            Err(e) => {
                warn!("ignoring unreadable config at {}: {e}", self.path.display());
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
