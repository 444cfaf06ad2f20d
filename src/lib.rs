//! Client library for an LED matrix image uploader.
//!
//! This crate turns arbitrary raster images into matrix-resolution pixel
//! data, shows a magnified per-pixel preview, uploads the result to the
//! uploader API, and drives play/pause/stop commands for animated assets
//! that the remote WLED driver plays back.
//!
//! The pipeline, leaves first:
//! - [`fit`]: center-crop geometry for a fixed target grid
//! - [`raster`]: matrix-resolution buffer plus nearest-neighbor preview
//! - [`encode`]: decides which bytes go into the upload
//! - [`playback`]: per-asset command state machine
//!
//! [`session::UploadSession`] ties them together behind one explicit state
//! object, and [`client::ApiClient`] talks to the HTTP endpoints.

pub mod client;
pub mod config;
pub mod encode;
pub mod error;
pub mod fit;
pub mod media;
pub mod playback;
pub mod raster;
pub mod session;

pub use error::{Error, Result};
use serde::{Deserialize, Serialize};

// ── Matrix geometry ────────────────────────────────────────────────

/// Target grid dimensions of the LED matrix.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (it's just two u32s).
/// `Serialize, Deserialize` let the same type be read straight out of the
/// `data.matrix` object returned by the configuration endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixGeometry {
    pub width: u32,
    pub height: u32,
}

impl MatrixGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels on the matrix.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Both dimensions are non-zero. A geometry that fails this is never
    /// cached or used for rasterization.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Default for MatrixGeometry {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
        }
    }
}

impl std::fmt::Display for MatrixGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── User-visible notices ───────────────────────────────────────────

/// Severity of a message shown to the user, mirroring alert levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Danger,
}

/// A message the caller should display after an operation finishes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Danger,
            message: message.into(),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
