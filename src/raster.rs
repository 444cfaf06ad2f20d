//! Matrix rasterizer: turns a decoded image into matrix-resolution pixel
//! data and a magnified preview of it.
//!
//! There is exactly one smoothing pass, the downscale onto the matrix
//! grid. The preview is produced from the matrix buffer by pure block
//! replication so every LED shows up as a hard-edged square.
//!
//! ## Rust concepts
//! - `image::DynamicImage` vs. typed `ImageBuffer`s (`RgbaImage`)
//! - `ImageBuffer::from_fn` for building an image from a closure
//! - Returning several related values in a plain struct

use crate::MatrixGeometry;
use crate::fit::FitTransform;
use crate::{Error, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, RgbaImage};

/// Side length of the square each matrix pixel becomes in the preview.
pub const PREVIEW_SCALE: u32 = 20;

/// Output of a rasterization pass.
#[derive(Clone, Debug)]
pub struct Rasterized {
    /// Exactly `width × height` pixels. This is what gets uploaded.
    pub matrix: RgbaImage,
    /// `width*K × height*K` display-only preview. Never transmitted.
    pub preview: RgbaImage,
    /// Geometry actually used (after falling back from an invalid one).
    pub geometry: MatrixGeometry,
    pub fit: FitTransform,
}

/// Rasterize `source` onto `geometry` with the default preview scale.
pub fn rasterize(source: &DynamicImage, geometry: MatrixGeometry) -> Result<Rasterized> {
    rasterize_with_scale(source, geometry, PREVIEW_SCALE)
}

pub fn rasterize_with_scale(
    source: &DynamicImage,
    geometry: MatrixGeometry,
    scale: u32,
) -> Result<Rasterized> {
    let geometry = if geometry.is_valid() {
        geometry
    } else {
        tracing::warn!("Invalid matrix geometry {}, using default", geometry);
        MatrixGeometry::default()
    };

    let (matrix, fit) = render_matrix(source, geometry);
    let preview = magnify(&matrix, scale)?;

    Ok(Rasterized {
        matrix,
        preview,
        geometry,
        fit,
    })
}

/// Downscale `source` into a `geometry`-sized buffer using a center-crop fit.
///
/// The visible part of the source is cut out first and then resampled
/// once (bilinear) straight to the matrix size.
pub fn render_matrix(source: &DynamicImage, geometry: MatrixGeometry) -> (RgbaImage, FitTransform) {
    let fit = FitTransform::cover(
        source.width(),
        source.height(),
        geometry.width,
        geometry.height,
    );
    let rect = fit.source_rect(
        source.width(),
        source.height(),
        geometry.width,
        geometry.height,
    );

    tracing::debug!(
        "Fitting {}x{} into {}: draw {:.2}x{:.2} at ({:.2}, {:.2}), source {}x{}+{}+{}",
        source.width(),
        source.height(),
        geometry,
        fit.draw_width,
        fit.draw_height,
        fit.offset_x,
        fit.offset_y,
        rect.width,
        rect.height,
        rect.x,
        rect.y
    );

    let matrix = source
        .crop_imm(rect.x, rect.y, rect.width, rect.height)
        .resize_exact(geometry.width, geometry.height, FilterType::Triangle)
        .to_rgba8();

    (matrix, fit)
}

/// Nearest-neighbor magnification: each input pixel becomes a
/// `scale × scale` block of the same color.
pub fn magnify(img: &RgbaImage, scale: u32) -> Result<RgbaImage> {
    let scale = scale.max(1);
    let (Some(width), Some(height)) = (
        img.width().checked_mul(scale),
        img.height().checked_mul(scale),
    ) else {
        return Err(Error::validation(format!(
            "Preview scale {scale} is too large for a {}x{} matrix",
            img.width(),
            img.height()
        )));
    };

    Ok(ImageBuffer::from_fn(width, height, |x, y| {
        *img.get_pixel(x / scale, y / scale)
    }))
}
