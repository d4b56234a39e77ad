//! Pseudo-random code tables and marker rendering.
//!
//! Used by tests and demos that need a self-consistent dictionary and
//! printable marker images. These tables are *not* the OpenCV/AprilTag
//! tables; see [`crate::MarkerDictionary::builtin`] and
//! [`crate::MarkerDictionary::load_from_dir`].

use crate::{rotate_code_u64, Dictionary, MarkerDictionary};
use sheet_inspect_core::GrayImage;

const MIN_DISTANCE: u32 = 3;

/// Generate `count` codes for `kind` with pairwise (rotation-aware) Hamming
/// distance `>= 3` and no rotational self-similarity.
pub fn dictionary(kind: MarkerDictionary, count: usize, seed: u64) -> Dictionary {
    let n = kind.marker_size();
    let bits = n * n;
    let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };

    let mut codes: Vec<u64> = Vec::with_capacity(count);
    let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
    let mut attempts = 0usize;
    while codes.len() < count && attempts < 1_000_000 {
        attempts += 1;
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let code = (state >> 11) & mask;

        let ones = code.count_ones() as usize;
        if ones < bits / 4 || ones > bits * 3 / 4 {
            continue;
        }
        let self_similar = (1..4)
            .any(|r| (rotate_code_u64(code, n, r) ^ code).count_ones() < MIN_DISTANCE);
        if self_similar {
            continue;
        }
        let too_close = codes.iter().any(|&c| {
            (0..4).any(|r| (rotate_code_u64(c, n, r) ^ code).count_ones() < MIN_DISTANCE)
        });
        if too_close {
            continue;
        }
        codes.push(code);
    }

    Dictionary {
        name: kind.name().to_string(),
        marker_size: n,
        max_correction_bits: kind.max_correction_bits().min(((MIN_DISTANCE - 1) / 2) as u8),
        codes,
    }
}

/// Render a marker (black border of `border_bits` cells) as a square image.
pub fn render_marker(code: u64, marker_size: usize, border_bits: usize, cell_px: usize) -> GrayImage {
    let cells = marker_size + 2 * border_bits;
    let side = cells * cell_px;
    let mut img = GrayImage::new(side, side, 255);

    for cy in 0..cells {
        for cx in 0..cells {
            let is_border = cx < border_bits
                || cy < border_bits
                || cx >= cells - border_bits
                || cy >= cells - border_bits;
            let is_black = is_border || {
                let idx = (cy - border_bits) * marker_size + (cx - border_bits);
                (code >> idx) & 1 == 1
            };
            if !is_black {
                continue;
            }
            for yy in 0..cell_px {
                for xx in 0..cell_px {
                    img.set(cx * cell_px + xx, cy * cell_px + yy, 0);
                }
            }
        }
    }
    img
}

/// Copy `src` into `dst` with its top-left at `(x0, y0)`, clipping at the edges.
pub fn paste(dst: &mut GrayImage, src: &GrayImage, x0: usize, y0: usize) {
    for y in 0..src.height {
        let ty = y0 + y;
        if ty >= dst.height {
            break;
        }
        for x in 0..src.width {
            let tx = x0 + x;
            if tx >= dst.width {
                break;
            }
            dst.set(tx, ty, src.data[y * src.width + x]);
        }
    }
}
