use super::to_luma;
use image::Luma;
use sheet_inspect_core::{GrayImageView, Rect};

/// Binary edge image; `data` holds 0 or 1.
#[derive(Clone, Debug)]
pub struct EdgeMap {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl EdgeMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![0; width * height],
            width,
            height,
        }
    }

    /// Non-zero pixels of `mask` become edges.
    pub fn from_mask(mask: &image::GrayImage) -> Self {
        Self {
            data: mask.as_raw().iter().map(|&v| u8::from(v != 0)).collect(),
            width: mask.width() as usize,
            height: mask.height() as usize,
        }
    }

    /// Edges as a 0/255 `image` buffer.
    pub fn to_luma(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            Luma([if self.is_edge(x as usize, y as usize) { 255 } else { 0 }])
        })
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline]
    pub fn set_edge(&mut self, x: usize, y: usize) {
        if x < self.width && y < self.height {
            let idx = self.idx(x, y);
            self.data[idx] = 1;
        }
    }

    #[inline]
    pub fn clear_edge(&mut self, x: usize, y: usize) {
        if x < self.width && y < self.height {
            let idx = self.idx(x, y);
            self.data[idx] = 0;
        }
    }

    #[inline]
    pub fn is_edge(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.data[self.idx(x, y)] != 0
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Edge pixels inside `roi`, clipped to the image.
    pub fn count_in(&self, roi: &Rect) -> usize {
        let x0 = roi.x.max(0.0).floor() as usize;
        let y0 = roi.y.max(0.0).floor() as usize;
        let x1 = (roi.right().ceil().max(0.0) as usize).min(self.width);
        let y1 = (roi.bottom().ceil().max(0.0) as usize).min(self.height);
        (y0..y1)
            .flat_map(|y| (x0..x1).map(move |x| (x, y)))
            .filter(|&(x, y)| self.data[y * self.width + x] != 0)
            .count()
    }

    pub fn points(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0)
            .map(move |(i, _)| (i % self.width, i / self.width))
    }
}

/// Canny edges; the thresholds apply to the Sobel gradient magnitude.
///
/// Frames narrower or shorter than 3 px have no edges.
pub fn canny(src: &GrayImageView<'_>, low: f32, high: f32) -> EdgeMap {
    let (low, high) = if low > high { (high, low) } else { (low, high) };
    if src.width < 3 || src.height < 3 {
        return EdgeMap::new(src.width, src.height);
    }
    EdgeMap::from_mask(&imageproc::edges::canny(&to_luma(src), low, high))
}
