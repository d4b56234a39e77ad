//! Adapters between `image` buffers and the core views.

use crate::error::InspectError;
use crate::inspector::{InspectionReport, Inspector};
use sheet_inspect_calib::{BoardDetector, CalibrationEngine};
use sheet_inspect_core::{GrayImageView, RgbImageView};
use std::path::Path;

pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

pub fn rgb_view(img: &::image::RgbImage) -> RgbImageView<'_> {
    RgbImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Decode any supported format into 8-bit RGB.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<::image::RgbImage, InspectError> {
    Ok(::image::open(path)?.to_rgb8())
}

pub fn load_gray(path: impl AsRef<Path>) -> Result<::image::GrayImage, InspectError> {
    Ok(::image::open(path)?.to_luma8())
}

/// Load and inspect one image file.
pub fn inspect_file(
    inspector: &Inspector,
    path: impl AsRef<Path>,
) -> Result<InspectionReport, InspectError> {
    let img = load_rgb(path)?;
    Ok(inspector.inspect(&rgb_view(&img)))
}

/// Offer every image to the engine; returns how many were accepted.
pub fn add_calibration_files<D, P>(
    engine: &mut CalibrationEngine<D>,
    paths: &[P],
) -> Result<usize, InspectError>
where
    D: BoardDetector,
    P: AsRef<Path>,
{
    let mut accepted = 0;
    for path in paths {
        let img = load_gray(path)?;
        if engine.add_calibration_frame(&gray_view(&img)) {
            accepted += 1;
        } else {
            log::info!("no board in {}", path.as_ref().display());
        }
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_share_the_buffer() {
        let mut img = ::image::RgbImage::new(4, 3);
        img.put_pixel(1, 2, ::image::Rgb([10, 20, 30]));
        let v = rgb_view(&img);
        assert_eq!((v.width, v.height), (4, 3));
        assert_eq!(v.pixel(1, 2), [10, 20, 30]);

        let gray = ::image::GrayImage::from_pixel(5, 2, ::image::Luma([77]));
        let g = gray_view(&gray);
        assert_eq!(g.data.len(), 10);
        assert_eq!(g.get(4, 1), 77);
    }

    #[test]
    fn missing_file_is_an_image_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_rgb(dir.path().join("absent.png")).expect_err("no file");
        assert!(matches!(err, InspectError::Image(_)), "{err:?}");
    }
}
