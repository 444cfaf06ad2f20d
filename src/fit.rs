//! Center-crop fit of an arbitrary image onto a fixed target grid.
//!
//! The transform always covers the whole target: one axis matches the
//! target exactly and the other overflows, split evenly on both edges.

/// Where and how large to draw a source image inside a target canvas.
///
/// Offsets are zero or negative; the draw size is never smaller than the
/// target on either axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitTransform {
    pub draw_width: f64,
    pub draw_height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl FitTransform {
    /// Compute the cover transform for an `image_width × image_height`
    /// source drawn into a `target_width × target_height` canvas.
    ///
    /// All inputs must be positive; the caller guarantees a decodable,
    /// non-empty raster.
    pub fn cover(image_width: u32, image_height: u32, target_width: u32, target_height: u32) -> Self {
        let image_aspect = image_width as f64 / image_height as f64;
        let target_w = target_width as f64;
        let target_h = target_height as f64;
        let target_aspect = target_w / target_h;

        if image_aspect > target_aspect {
            // Relatively wider: pin the height, crop left and right.
            let draw_height = target_h;
            let draw_width = draw_height * image_aspect;
            Self {
                draw_width,
                draw_height,
                offset_x: (target_w - draw_width) / 2.0,
                offset_y: 0.0,
            }
        } else {
            let draw_width = target_w;
            let draw_height = draw_width / image_aspect;
            Self {
                draw_width,
                draw_height,
                offset_x: 0.0,
                offset_y: (target_h - draw_height) / 2.0,
            }
        }
    }

    /// The part of the source that ends up visible on the target, in
    /// source pixels: centered, target aspect, clamped to the source.
    ///
    /// Cropping this before resampling keeps the work bounded by the
    /// source size no matter how extreme its aspect ratio is.
    pub fn source_rect(
        &self,
        image_width: u32,
        image_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> SourceRect {
        let per_target_px = image_width as f64 / self.draw_width;
        let width = visible_span(target_width, per_target_px, image_width);
        let height = visible_span(target_height, per_target_px, image_height);
        SourceRect {
            x: (image_width - width) / 2,
            y: (image_height - height) / 2,
            width,
            height,
        }
    }
}

/// A crop rectangle in source pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

fn visible_span(target: u32, per_target_px: f64, limit: u32) -> u32 {
    ((target as f64 * per_target_px).round() as u32).clamp(1, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const EPS: f64 = 0.01;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn wide_image_pins_height_and_crops_sides() {
        let fit = FitTransform::cover(1920, 1080, 20, 20);
        assert!(approx(fit.draw_height, 20.0));
        assert!(approx(fit.draw_width, 35.56), "{fit:?}");
        assert!(approx(fit.offset_x, -7.78), "{fit:?}");
        assert_eq!(fit.offset_y, 0.0);
    }

    #[test]
    fn tall_image_pins_width_and_crops_top_bottom() {
        let fit = FitTransform::cover(600, 800, 20, 20);
        assert!(approx(fit.draw_width, 20.0));
        assert!(approx(fit.draw_height, 26.67), "{fit:?}");
        assert!(approx(fit.offset_y, -3.33), "{fit:?}");
        assert_eq!(fit.offset_x, 0.0);
    }

    #[rstest]
    #[case(100, 100, 20, 20)]
    #[case(640, 320, 32, 16)]
    #[case(1, 1, 20, 20)]
    fn matching_aspect_has_no_offset(
        #[case] iw: u32,
        #[case] ih: u32,
        #[case] tw: u32,
        #[case] th: u32,
    ) {
        let fit = FitTransform::cover(iw, ih, tw, th);
        assert_eq!(fit.offset_x, 0.0);
        assert_eq!(fit.offset_y, 0.0);
        assert!(approx(fit.draw_width, tw as f64));
        assert!(approx(fit.draw_height, th as f64));
    }

    #[rstest]
    #[case(1920, 1080, 20, 20)]
    #[case(600, 800, 20, 20)]
    #[case(1, 1000, 16, 8)]
    #[case(1000, 1, 8, 16)]
    #[case(3, 7, 64, 32)]
    #[case(1, 1, 20, 20)]
    fn always_covers_and_centers(
        #[case] iw: u32,
        #[case] ih: u32,
        #[case] tw: u32,
        #[case] th: u32,
    ) {
        let fit = FitTransform::cover(iw, ih, tw, th);
        let (tw, th) = (tw as f64, th as f64);

        assert!(fit.draw_width.is_finite() && fit.draw_height.is_finite());
        assert!(fit.draw_width >= tw - 1e-9, "{fit:?}");
        assert!(fit.draw_height >= th - 1e-9, "{fit:?}");
        assert!(approx(fit.offset_x, (tw - fit.draw_width) / 2.0));
        assert!(approx(fit.offset_y, (th - fit.draw_height) / 2.0));
        // Only one axis overflows.
        assert!(fit.offset_x == 0.0 || fit.offset_y == 0.0);
    }

    #[rstest]
    #[case(1920, 1080, 20, 20, SourceRect { x: 420, y: 0, width: 1080, height: 1080 })]
    #[case(600, 800, 20, 20, SourceRect { x: 0, y: 100, width: 600, height: 600 })]
    #[case(640, 320, 32, 16, SourceRect { x: 0, y: 0, width: 640, height: 320 })]
    #[case(1, 20000, 64, 64, SourceRect { x: 0, y: 9999, width: 1, height: 1 })]
    #[case(3, 7, 64, 32, SourceRect { x: 0, y: 2, width: 3, height: 2 })]
    fn source_rect_is_centered_with_target_aspect(
        #[case] iw: u32,
        #[case] ih: u32,
        #[case] tw: u32,
        #[case] th: u32,
        #[case] expected: SourceRect,
    ) {
        let fit = FitTransform::cover(iw, ih, tw, th);
        assert_eq!(fit.source_rect(iw, ih, tw, th), expected);
    }
}
