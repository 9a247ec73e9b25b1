//! Crate-level error type.
//!
//! Each component has its own error enum; this one aggregates them for hosts
//! that want a single type, and assigns each failure a stable code.

use thiserror::Error;

use crate::config::ConfigError;
use crate::secrets::SecretError;
use crate::session::SessionError;
use crate::stash::StashError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Stash(#[from] StashError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Stable machine-readable code, independent of the message text.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Secret(SecretError::NotFound(_)) => "NOT_FOUND",
            Error::Secret(SecretError::SessionClosed) => "SESSION_CLOSED",
            Error::Stash(e) => match e {
                StashError::InvalidPath { .. } => "INVALID_PATH",
                StashError::CopyFailed { .. } => "COPY_FAILED",
                StashError::NotFound(_) => "NOT_FOUND",
                StashError::ReadFailed { .. } => "READ_FAILED",
                StashError::NotAFile(_) => "NOT_A_FILE",
                StashError::SessionClosed => "SESSION_CLOSED",
            },
            Error::Session(SessionError::SessionClosed) => "SESSION_CLOSED",
            Error::Session(_) => "IO_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
