use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that escape the race engine. Everything that can go wrong inside a
/// round is modelled as round state; only persistence can fail.
#[derive(Debug, Error)]
pub enum RaceError {
    #[error("could not read or write results at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("results document at {path} is not valid json: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not determine a directory for the results file")]
    NoResultsDir,
}

impl RaceError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RaceError>;
