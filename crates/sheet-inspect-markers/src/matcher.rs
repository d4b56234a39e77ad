//! Dictionary matching and rotation helpers.

use crate::Dictionary;

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Marker id in the dictionary.
    pub id: u32,
    /// Rotation `0..=3` (quarter turns clockwise) such that
    /// `observed_code == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Hamming distance between observed and dictionary code (after rotation).
    pub hamming: u8,
}

/// Matcher over one code table with every id pre-rotated.
///
/// Brute-force over ids and rotations; dictionaries here hold at most a few
/// hundred codes.
#[derive(Clone, Debug)]
pub struct Matcher {
    marker_size: usize,
    bit_count: usize,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// Build a matcher; `max_hamming` is clamped to the dictionary's
    /// correction capability.
    pub fn new(dict: &Dictionary, max_hamming: u8) -> Self {
        let n = dict.marker_size;
        let rotated = dict
            .codes
            .iter()
            .map(|&base| {
                [
                    base,
                    rotate_code_u64(base, n, 1),
                    rotate_code_u64(base, n, 2),
                    rotate_code_u64(base, n, 3),
                ]
            })
            .collect();

        Self {
            marker_size: n,
            bit_count: dict.bit_count(),
            max_hamming: max_hamming.min(dict.max_correction_bits),
            rotated,
        }
    }

    #[inline]
    pub fn marker_size(&self) -> usize {
        self.marker_size
    }

    #[inline]
    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Find the best match within `max_hamming`; the lowest id wins ties.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let mut best: Option<Match> = None;

        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                if h > self.max_hamming {
                    continue;
                }
                if best.is_some_and(|b| b.hamming <= h) {
                    continue;
                }
                best = Some(Match {
                    id: id as u32,
                    rotation: rot as u8,
                    hamming: h,
                });
                if h == 0 {
                    return best;
                }
            }
        }

        best
    }
}

/// Rotate a row-major code (`idx = y * n + x`) by `rot` quarter turns clockwise.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            let bit = (code >> (sy * n + sx)) & 1;
            out |= bit << (y * n + x);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{synthetic, MarkerDictionary};

    #[test]
    fn rotate_four_times_is_identity() {
        let code = 0x0123_4567_89ab_cdef_u64;
        let mut r = code;
        for _ in 0..4 {
            r = rotate_code_u64(r, 8, 1);
        }
        assert_eq!(code, r);
    }

    #[test]
    fn quarter_turn_moves_top_left_bit_to_top_right() {
        // bit (0,0) set in a 4x4 code
        let r = rotate_code_u64(1, 4, 1);
        assert_eq!(r, 1 << 3);
    }

    #[test]
    fn matcher_finds_rotated_code() {
        let dict = synthetic::dictionary(MarkerDictionary::Aruco4x4_50, 20, 7);
        let matcher = Matcher::new(&dict, 0);

        let observed = rotate_code_u64(dict.codes[5], dict.marker_size, 3);
        let m = matcher.match_code(observed).expect("match");
        assert_eq!(m, Match { id: 5, rotation: 3, hamming: 0 });
    }

    #[test]
    fn matcher_tolerates_one_flipped_bit() {
        let dict = synthetic::dictionary(MarkerDictionary::Aruco4x4_50, 20, 7);
        let matcher = Matcher::new(&dict, 1);

        let observed = dict.codes[2] ^ (1 << 9);
        let m = matcher.match_code(observed).expect("match");
        assert_eq!(m.id, 2);
        assert_eq!(m.hamming, 1);
        assert!(Matcher::new(&dict, 0).match_code(observed).is_none());
    }
}
