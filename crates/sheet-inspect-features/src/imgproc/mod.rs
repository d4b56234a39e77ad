//! Image operators used by the detectors.
//!
//! Filtering, Canny, line voting, contour tracing, polygon simplification,
//! adaptive thresholding and template correlation run on `imageproc`. The
//! circle accumulator, the segment walk and the HSV helpers are local.
//! Every operator reads a borrowed view and returns a fresh owned buffer.

mod color;
mod contour;
mod edges;
mod filter;
mod hough;
mod segments;
mod template;
mod threshold;

pub use color::{mean_rgb_in_circle, rgb_to_hsv, HsvRange};
pub use contour::{
    approx_poly_dp, arc_length, bounding_rect, contour_area, find_external_contours, Contour,
};
pub use edges::{canny, EdgeMap};
pub use filter::{gaussian_blur, sigma_for_kernel, sobel, Gradients};
pub use hough::{hough_circles, HoughCircle, HoughCircleParams};
pub use segments::{line_segments, SegmentParams};
pub use template::{match_template, TemplateMatch};
pub use threshold::adaptive_threshold_mean;

use image::Luma;
use sheet_inspect_core::{GrayImage, GrayImageView};

/// Copy a borrowed view into an `image` buffer.
pub(crate) fn to_luma(src: &GrayImageView<'_>) -> image::GrayImage {
    image::GrayImage::from_fn(src.width as u32, src.height as u32, |x, y| {
        Luma([src.get(x as usize, y as usize)])
    })
}

pub(crate) fn from_luma(img: image::GrayImage) -> GrayImage {
    GrayImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_bridge_keeps_row_major_layout() {
        let mut img = GrayImage::new(3, 2, 0);
        img.set(2, 0, 7);
        img.set(0, 1, 9);
        let luma = to_luma(&img.view());
        assert_eq!(luma.dimensions(), (3, 2));
        assert_eq!(luma.get_pixel(2, 0)[0], 7);
        assert_eq!(luma.get_pixel(0, 1)[0], 9);
        assert_eq!(from_luma(luma), img);
    }
}
