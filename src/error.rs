use std::io;
use thiserror::Error;

/// Main error type for the asset pipeline and server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP parsing error: {0}")]
    HttpParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown content asset type '{0}'")]
    UnknownAssetType(String),

    #[error("Body has already been consumed")]
    AlreadyConsumed,

    #[error("The body stream is already locked and can't be consumed")]
    LockedStream,

    #[error("Body object should not be disturbed or locked")]
    DisturbedBody,
}

impl ServerError {
    /// Whether this error is a stream-consumption defect rather than an I/O or configuration failure
    pub fn is_stream_misuse(&self) -> bool {
        matches!(
            self,
            ServerError::AlreadyConsumed | ServerError::LockedStream | ServerError::DisturbedBody
        )
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
