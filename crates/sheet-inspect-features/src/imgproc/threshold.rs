use super::{from_luma, to_luma};
use sheet_inspect_core::{GrayImage, GrayImageView};

/// Binary threshold against the local box mean.
///
/// A pixel becomes 255 when it is at least the mean of the `block_size`
/// window around it (forced odd, at least 3), and 0 otherwise.
pub fn adaptive_threshold_mean(src: &GrayImageView<'_>, block_size: usize) -> GrayImage {
    if src.width == 0 || src.height == 0 {
        return src.to_owned_image();
    }
    let radius = ((block_size.max(3) | 1) / 2) as u32;
    from_luma(imageproc::contrast::adaptive_threshold(&to_luma(src), radius))
}
