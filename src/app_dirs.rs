use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "typing-race";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Directory holding the results document and the log file.
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join(APP_NAME),
            )
        } else {
            ProjectDirs::from("", "", APP_NAME).map(|proj_dirs| proj_dirs.data_local_dir().into())
        }
    }

    pub fn results_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("results.json"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("race.log"))
    }

    pub fn config_path() -> PathBuf {
        if let Some(pd) = ProjectDirs::from("", "", APP_NAME) {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("typing_race_config.json")
        }
    }
}
