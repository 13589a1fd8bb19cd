use std::path::PathBuf;

use streamcheck_engine::ProbeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Cannot read input playlist {}: {source}", path.display())]
    InputUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Engine error: {0}")]
    Engine(#[from] ProbeError),

    #[error("Cannot write output playlist {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl AppError {
    /// Process exit status: 2 when the input playlist is unavailable, 1 for
    /// every other fatal error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::InputUnavailable { .. } => 2,
            _ => 1,
        }
    }
}
