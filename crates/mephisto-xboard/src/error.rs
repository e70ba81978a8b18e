//! Error types shared across the bridge.

use std::path::PathBuf;

/// Errors raised while building the bridge configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown driver '{0}' (expected one of: {1})")]
    UnknownDriver(String, String),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from piece-placement parsing and the setboard translation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FenError {
    #[error("empty FEN string")]
    Empty,

    #[error("invalid piece character '{0}'")]
    InvalidPiece(char),

    #[error("placement covers {0} squares instead of 64")]
    SquareCount(usize),

    #[error("invalid side to move '{0}'")]
    InvalidSide(String),

    #[error("invalid {field} field '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("failed to read FEN file: {0}")]
    Io(String),
}

/// Errors surfaced by the bridge loop to its host.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Output(#[from] crate::xboard::OutputError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
