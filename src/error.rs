//! Error type shared by every module of the crate.
//!
//! The variants follow the failure taxonomy the user sees: local
//! validation problems, transport failures, and explicit remote
//! rejections are kept apart so callers can pick the right notice level.

use crate::Notice;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A local check failed before anything was sent.
    #[error("{0}")]
    Validation(String),

    /// Network unreachable, timed out, or the body could not be parsed.
    #[error("Error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with `success: false`.
    #[error("{message}")]
    Rejected { message: String },

    /// A playback command for this asset is already in flight.
    #[error("a command for {id} is already in flight")]
    Busy { id: String },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a rejection from the optional server message, falling back to
    /// `fallback` when the server did not provide one.
    pub fn rejected(message: Option<String>, fallback: &str) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());
        Self::Rejected { message }
    }

    /// Local validation failures are warnings; everything else is danger.
    pub fn to_notice(&self) -> Notice {
        match self {
            Error::Validation(msg) => Notice::warning(msg.clone()),
            other => Notice::danger(other.to_string()),
        }
    }
}
