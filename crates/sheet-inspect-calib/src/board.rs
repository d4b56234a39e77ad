//! ChArUco board specification and layout helpers.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_markers::MarkerDictionary;

/// Static ChArUco board specification.
///
/// `rows`/`cols` are **square counts** (not inner corner counts).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CharucoBoardSpec {
    pub rows: u32,
    pub cols: u32,
    /// Square side in millimeters.
    pub cell_size_mm: f64,
    /// Marker side relative to the square side.
    pub marker_size_rel: f64,
    #[serde(default)]
    pub dictionary: MarkerDictionary,
}

impl Default for CharucoBoardSpec {
    /// 5 × 7 squares of 40 mm with 20 mm `DICT_6X6_250` markers.
    fn default() -> Self {
        Self {
            rows: 7,
            cols: 5,
            cell_size_mm: 40.0,
            marker_size_rel: 0.5,
            dictionary: MarkerDictionary::Aruco6x6_250,
        }
    }
}

/// Board specification validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CharucoBoardError {
    #[error("rows and cols must be >= 2")]
    InvalidSize,
    #[error("cell_size_mm must be > 0")]
    InvalidCellSize,
    #[error("marker_size_rel must be in (0, 1]")]
    InvalidMarkerSizeRel,
    #[error("board needs {needed} markers, {dictionary} has {available}")]
    NotEnoughDictionaryCodes {
        dictionary: &'static str,
        needed: usize,
        available: usize,
    },
}

/// Validated board with its marker layout.
///
/// OpenCV layout: the top-left square is black, markers sit on white
/// squares (`(i + j)` odd) and take ids in row-major order.
#[derive(Clone, Debug)]
pub struct CharucoBoard {
    spec: CharucoBoardSpec,
    marker_positions: Vec<[u32; 2]>,
}

impl CharucoBoard {
    pub fn new(spec: CharucoBoardSpec) -> Result<Self, CharucoBoardError> {
        if spec.rows < 2 || spec.cols < 2 {
            return Err(CharucoBoardError::InvalidSize);
        }
        if !spec.cell_size_mm.is_finite() || spec.cell_size_mm <= 0.0 {
            return Err(CharucoBoardError::InvalidCellSize);
        }
        if !spec.marker_size_rel.is_finite()
            || spec.marker_size_rel <= 0.0
            || spec.marker_size_rel > 1.0
        {
            return Err(CharucoBoardError::InvalidMarkerSizeRel);
        }

        let marker_positions: Vec<[u32; 2]> = (0..spec.rows)
            .flat_map(|j| (0..spec.cols).map(move |i| [i, j]))
            .filter(|[i, j]| (i + j) % 2 == 1)
            .collect();

        let available = spec.dictionary.capacity();
        if marker_positions.len() > available {
            return Err(CharucoBoardError::NotEnoughDictionaryCodes {
                dictionary: spec.dictionary.name(),
                needed: marker_positions.len(),
                available,
            });
        }

        Ok(Self {
            spec,
            marker_positions,
        })
    }

    #[inline]
    pub fn spec(&self) -> &CharucoBoardSpec {
        &self.spec
    }

    /// Inner corner count per row.
    #[inline]
    pub fn inner_cols(&self) -> u32 {
        self.spec.cols - 1
    }

    /// Inner corner count per column.
    #[inline]
    pub fn inner_rows(&self) -> u32 {
        self.spec.rows - 1
    }

    /// Total number of ChArUco corners.
    #[inline]
    pub fn corner_count(&self) -> u32 {
        self.inner_cols() * self.inner_rows()
    }

    #[inline]
    pub fn marker_count(&self) -> usize {
        self.marker_positions.len()
    }

    /// Square `(sx, sy)` holding marker `id`.
    #[inline]
    pub fn marker_cell(&self, id: u32) -> Option<[u32; 2]> {
        self.marker_positions.get(id as usize).copied()
    }

    /// Corner id of the board intersection `(ix, iy)`; `None` on the outer edge.
    pub fn corner_id_at(&self, ix: u32, iy: u32) -> Option<u32> {
        if ix == 0 || iy == 0 || ix >= self.spec.cols || iy >= self.spec.rows {
            return None;
        }
        Some((iy - 1) * self.inner_cols() + (ix - 1))
    }

    /// Board-plane position (mm, origin at the board's top-left) of a ChArUco corner.
    pub fn charuco_object_xy(&self, id: u32) -> Option<Point2<f64>> {
        if id >= self.corner_count() {
            return None;
        }
        let c = self.spec.cell_size_mm;
        let i = (id % self.inner_cols() + 1) as f64;
        let j = (id / self.inner_cols() + 1) as f64;
        Some(Point2::new(i * c, j * c))
    }

    /// Corner ids of a marker's square (TL, TR, BR, BL); edge corners are `None`.
    pub fn marker_square_corner_ids(&self, id: u32) -> Option<[Option<u32>; 4]> {
        let [sx, sy] = self.marker_cell(id)?;
        Some([
            self.corner_id_at(sx, sy),
            self.corner_id_at(sx + 1, sy),
            self.corner_id_at(sx + 1, sy + 1),
            self.corner_id_at(sx, sy + 1),
        ])
    }

    /// Square corners of a marker's cell on the board plane (TL, TR, BR, BL), mm.
    pub fn marker_square_xy(&self, id: u32) -> Option<[Point2<f64>; 4]> {
        let [sx, sy] = self.marker_cell(id)?;
        let c = self.spec.cell_size_mm;
        let (x0, y0) = (sx as f64 * c, sy as f64 * c);
        Some([
            Point2::new(x0, y0),
            Point2::new(x0 + c, y0),
            Point2::new(x0 + c, y0 + c),
            Point2::new(x0, y0 + c),
        ])
    }

    /// Printed marker corners on the board plane (TL, TR, BR, BL), mm.
    pub fn marker_xy(&self, id: u32) -> Option<[Point2<f64>; 4]> {
        let [sx, sy] = self.marker_cell(id)?;
        let c = self.spec.cell_size_mm;
        let side = self.spec.marker_size_rel * c;
        let off = 0.5 * (c - side);
        let (x0, y0) = (sx as f64 * c + off, sy as f64 * c + off);
        Some([
            Point2::new(x0, y0),
            Point2::new(x0 + side, y0),
            Point2::new(x0 + side, y0 + side),
            Point2::new(x0, y0 + side),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn board() -> CharucoBoard {
        CharucoBoard::new(CharucoBoardSpec {
            rows: 5,
            cols: 6,
            cell_size_mm: 10.0,
            marker_size_rel: 0.75,
            dictionary: MarkerDictionary::Aruco4x4_50,
        })
        .expect("board")
    }

    #[test]
    fn interior_marker_has_four_corner_ids() {
        let board = board();
        assert_eq!(board.marker_cell(4), Some([2, 1]));
        let ids = board.marker_square_corner_ids(4).expect("marker");
        assert_eq!(ids, [Some(1), Some(2), Some(7), Some(6)]);
    }

    #[test]
    fn border_marker_only_touches_inner_corners_below() {
        let board = board();
        assert_eq!(board.marker_cell(0), Some([1, 0]));
        let ids = board.marker_square_corner_ids(0).expect("marker");
        assert_eq!(ids, [None, None, Some(1), Some(0)]);
    }

    #[test]
    fn object_points_follow_row_major_ids() {
        let board = board();
        let p = board.charuco_object_xy(6).expect("corner");
        assert_relative_eq!(p.x, 20.0);
        assert_relative_eq!(p.y, 20.0);
        assert!(board.charuco_object_xy(board.corner_count()).is_none());
    }

    #[test]
    fn marker_sits_centered_in_its_square() {
        let board = board();
        let m = board.marker_xy(4).expect("marker");
        assert_relative_eq!(m[0].x, 21.25);
        assert_relative_eq!(m[2].y, 18.75);
    }

    #[test]
    fn rejects_boards_larger_than_dictionary() {
        let err = CharucoBoard::new(CharucoBoardSpec {
            rows: 12,
            cols: 12,
            dictionary: MarkerDictionary::Aruco4x4_50,
            ..CharucoBoardSpec::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            CharucoBoardError::NotEnoughDictionaryCodes { needed: 72, .. }
        ));
    }
}
