pub mod config;
pub mod normalize;
pub mod similarity;
pub mod index;
pub mod scanner;
pub mod playlist;
pub mod matching;
pub mod report;
pub mod repair;
pub mod reconcile;
pub mod tasks;
pub mod cli;

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid report file {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("music index not found: {0} (run `reprise scan` first)")]
    MissingIndex(PathBuf),
    #[error("repair report not found: {0} (run `reprise repair` first)")]
    MissingReport(PathBuf),
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
