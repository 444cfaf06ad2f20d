//! Source images: reading a user-selected file and classifying it.
//!
//! ## Rust concepts
//! - `Path` and `PathBuf` for cross-platform file paths
//! - `tokio::fs` for non-blocking file reads
//! - `image::guess_format` for sniffing the container from magic bytes
//! - `ImageDecoder::orientation` for EXIF rotation before anything else
//!   looks at the pixels

use crate::{Error, Result};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Extensions the uploader accepts.
const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Whether the asset is a still image or an animation container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    SingleFrame,
    MultiFrame,
}

/// A user-selected image held in memory until it is uploaded or discarded.
#[derive(Clone, Debug)]
pub struct SourceImage {
    /// Original file name, e.g. "sunset.gif"
    pub file_name: String,
    pub kind: FrameKind,
    /// Raw file content exactly as read from disk
    pub bytes: Vec<u8>,
    /// First frame, decoded
    pub decoded: DynamicImage,
}

impl SourceImage {
    /// Decode `bytes` and classify them.
    ///
    /// Zero-sized rasters are rejected here so later geometry never sees them.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        let format = detect_format(&file_name, &bytes)?;
        let decoded = decode_upright(&bytes, format)?;

        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(Error::validation(format!("{file_name} has no pixels")));
        }

        let kind = if format == ImageFormat::Gif {
            FrameKind::MultiFrame
        } else {
            FrameKind::SingleFrame
        };

        Ok(Self {
            file_name,
            kind,
            bytes,
            decoded,
        })
    }

    /// Read and decode a file from disk.
    pub async fn open(path: &Path) -> Result<Self> {
        if !is_supported_image(path) {
            return Err(Error::validation(format!(
                "Unsupported file type: {}",
                path.display()
            )));
        }

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();

        Self::from_bytes(file_name, bytes)
    }

    pub fn width(&self) -> u32 {
        self.decoded.width()
    }

    pub fn height(&self) -> u32 {
        self.decoded.height()
    }

    pub fn is_multi_frame(&self) -> bool {
        self.kind == FrameKind::MultiFrame
    }

    /// Name suggested to the user: the file name without its extension.
    pub fn default_display_name(&self) -> String {
        default_display_name(&self.file_name)
    }
}

/// Check the extension against the list of upload-eligible types.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// Strip the last extension from a file name ("a.b.png" → "a.b").
pub fn default_display_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string()
}

/// Decode the first frame and apply the EXIF orientation, if any, so a
/// portrait phone photo comes out portrait.
fn decode_upright(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage> {
    let mut decoder = ImageReader::with_format(Cursor::new(bytes), format).into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    if orientation != Orientation::NoTransforms {
        tracing::debug!("Applying EXIF orientation {:?}", orientation);
        img.apply_orientation(orientation);
    }
    Ok(img)
}

/// Sniff the container from content, falling back to the file extension.
fn detect_format(file_name: &str, bytes: &[u8]) -> Result<ImageFormat> {
    if let Ok(format) = image::guess_format(bytes) {
        return Ok(format);
    }

    ImageFormat::from_path(file_name)
        .map_err(|_| Error::validation(format!("Unrecognized image format: {file_name}")))
}
