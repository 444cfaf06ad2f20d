//! Upload encoder: decides which bytes go into the `image` form field.
//!
//! Animated containers pass through untouched; the device extracts frames
//! and timing itself. Stills are replaced by the matrix-resolution buffer
//! re-encoded as PNG.

use crate::media::SourceImage;
use crate::{Error, Result};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

pub const EMPTY_NAME_MESSAGE: &str = "Please enter a name";
pub const NO_IMAGE_MESSAGE: &str = "No image loaded";

/// Everything the upload endpoint needs, built once per save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    /// User-facing name, sent as the `name` field
    pub name: String,
    /// File name attached to the `image` part
    pub file_name: String,
    pub mime: &'static str,
    pub payload: Vec<u8>,
    pub is_multi_frame: bool,
}

/// Validate and encode an upload.
///
/// Checks run in order: the name must be non-empty, then an image must be
/// loaded. `matrix` is the rasterized buffer belonging to `source`; it is
/// only read for single-frame sources.
pub fn encode_upload(
    name: &str,
    source: Option<&SourceImage>,
    matrix: Option<&RgbaImage>,
) -> Result<UploadRequest> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation(EMPTY_NAME_MESSAGE));
    }
    let Some(source) = source else {
        return Err(Error::validation(NO_IMAGE_MESSAGE));
    };

    if source.is_multi_frame() {
        tracing::debug!("Uploading {} as animation pass-through", source.file_name);
        return Ok(UploadRequest {
            name: name.to_string(),
            file_name: source.file_name.clone(),
            mime: "image/gif",
            payload: source.bytes.clone(),
            is_multi_frame: true,
        });
    }

    let Some(matrix) = matrix else {
        return Err(Error::validation(NO_IMAGE_MESSAGE));
    };

    Ok(UploadRequest {
        name: name.to_string(),
        file_name: format!("{name}.png"),
        mime: "image/png",
        payload: encode_png(matrix)?,
        is_multi_frame: false,
    })
}

/// Encode an RGBA buffer as a single-frame PNG.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
