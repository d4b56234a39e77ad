//! Core types shared by the sheet-inspect crates.
//!
//! This crate is small and purely geometric: borrowed/owned image buffers,
//! homographies, the pinhole + Brown–Conrady camera model, and pixel-space
//! primitives. It does *not* know about markers, boards or features.

mod camera;
mod geometry;
mod homography;
mod image;
mod logger;

pub use camera::{CameraIntrinsics, Distortion, UndistortConfig};
pub use geometry::{Circle, LineSegment, Rect};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{
    luma, sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView, ImageError, RgbImage,
    RgbImageView,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_filter, init_with_level, LogFilter, LogFilterError};
