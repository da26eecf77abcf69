use std::io;

use thiserror::Error;

/// Errors raised while configuring or starting a [`Server`](crate::Server).
///
/// Nothing here crosses the handler boundary: request-level failures are always
/// expressed as response status codes.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("dispatcher must be set")]
    MissingDispatcher,

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("can't parse config: {source}")]
    ConfigParse {
        #[from]
        source: serde_json::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ServerError {
    pub fn invalid_config<S: ToString>(str: S) -> Self {
        Self::InvalidConfig { reason: str.to_string() }
    }
}
