use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed shortcuts data at byte {offset}: {reason}")]
    Structural { offset: usize, reason: String },

    #[error("Field {field} contains reserved byte {byte:#04x}")]
    Encoding { field: String, byte: u8 },

    #[error("Steam installation not found (searched: {searched:?})")]
    InstallationNotFound { searched: Vec<PathBuf> },

    #[error("No Steam user IDs found in {path}")]
    NoUsers { path: PathBuf },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid Steam ID: {0}")]
    InvalidSteamId(String),

    #[error("Steam is running; close it first or pass --close-steam")]
    SteamRunning,

    #[error("Cannot determine whether Steam is running ({0}); close it and pass --skip-steam-check")]
    SteamStateUnknown(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn structural(offset: usize, reason: impl Into<String>) -> Self {
        Error::Structural {
            offset,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
