use super::to_luma;
use image::{ImageBuffer, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use sheet_inspect_core::{GrayImage, GrayImageView};

/// Sigma matching a `ksize` Gaussian kernel: `0.3·((ksize−1)/2 − 1) + 0.8`.
///
/// `ksize` is forced odd.
pub fn sigma_for_kernel(ksize: usize) -> f32 {
    let ksize = (ksize.max(1) | 1) as f32;
    0.3 * ((ksize - 1.0) * 0.5 - 1.0) + 0.8
}

/// Gaussian blur computed in `f32` and rounded back to 8 bits.
///
/// A non-positive `sigma` is derived from `ksize`; otherwise `ksize` is
/// unused and the kernel extent follows `sigma`.
pub fn gaussian_blur(src: &GrayImageView<'_>, ksize: usize, sigma: f64) -> GrayImage {
    if src.width == 0 || src.height == 0 {
        return src.to_owned_image();
    }
    let sigma = if sigma > 0.0 {
        sigma as f32
    } else {
        sigma_for_kernel(ksize)
    };
    let f = ImageBuffer::<Luma<f32>, Vec<f32>>::from_fn(src.width as u32, src.height as u32, |x, y| {
        Luma([src.get(x as usize, y as usize) as f32])
    });
    let blurred = imageproc::filter::gaussian_blur_f32(&f, sigma);
    GrayImage {
        width: src.width,
        height: src.height,
        data: blurred
            .pixels()
            .map(|p| p[0].round().clamp(0.0, 255.0) as u8)
            .collect(),
    }
}

/// 3×3 Sobel derivatives of a gray image.
#[derive(Clone, Debug)]
pub struct Gradients {
    pub width: usize,
    pub height: usize,
    pub gx: Vec<i16>,
    pub gy: Vec<i16>,
}

impl Gradients {
    /// `|gx| + |gy|` at flat index `i`.
    #[inline]
    pub fn magnitude_l1(&self, i: usize) -> i32 {
        (self.gx[i] as i32).abs() + (self.gy[i] as i32).abs()
    }
}

pub fn sobel(src: &GrayImageView<'_>) -> Gradients {
    let (w, h) = (src.width, src.height);
    if w == 0 || h == 0 {
        return Gradients {
            width: w,
            height: h,
            gx: Vec::new(),
            gy: Vec::new(),
        };
    }
    let img = to_luma(src);
    Gradients {
        width: w,
        height: h,
        gx: horizontal_sobel(&img).into_raw(),
        gy: vertical_sobel(&img).into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kernel_sigma_follows_the_size_rule() {
        assert_relative_eq!(sigma_for_kernel(9), 1.7, epsilon = 1e-6);
        assert_relative_eq!(sigma_for_kernel(4), sigma_for_kernel(5));
        assert!(sigma_for_kernel(0) > 0.0);
    }

    #[test]
    fn blur_keeps_flat_images_flat() {
        let img = GrayImage::new(12, 7, 93);
        let out = gaussian_blur(&img.view(), 9, 2.0);
        assert!(out.data.iter().all(|&v| v == 93), "{:?}", out.data);
        let derived = gaussian_blur(&img.view(), 5, 0.0);
        assert!(derived.data.iter().all(|&v| v == 93));
    }

    #[test]
    fn blur_softens_a_step() {
        let mut img = GrayImage::new(20, 5, 0);
        for y in 0..5 {
            for x in 10..20 {
                img.set(x, y, 200);
            }
        }
        let out = gaussian_blur(&img.view(), 9, 2.0);
        let row: Vec<u8> = (0..20).map(|x| out.view().get(x, 2)).collect();
        assert!(row.windows(2).all(|w| w[0] <= w[1]), "{row:?}");
        assert!(row[9] > 0 && row[10] < 200, "{row:?}");
    }

    #[test]
    fn sobel_sees_a_vertical_step() {
        let mut img = GrayImage::new(8, 8, 0);
        for y in 0..8 {
            for x in 4..8 {
                img.set(x, y, 100);
            }
        }
        let g = sobel(&img.view());
        let at = |x: usize, y: usize| y * 8 + x;
        assert_eq!(g.gx[at(4, 3)], 400);
        assert_eq!(g.gy[at(4, 3)], 0);
        assert_eq!(g.gx[at(1, 3)], 0);
        assert_eq!(g.magnitude_l1(at(3, 3)), 400);
    }

    #[test]
    fn empty_frames_pass_through() {
        let img = GrayImage::new(0, 0, 0);
        assert!(gaussian_blur(&img.view(), 9, 2.0).data.is_empty());
        assert!(sobel(&img.view()).gx.is_empty());
    }
}
