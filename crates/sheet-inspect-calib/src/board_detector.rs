//! ChArUco corner detection seam and the marker-driven implementation.

use crate::board::CharucoBoard;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use sheet_inspect_core::{estimate_homography, GrayImageView};
use sheet_inspect_markers::MarkerResolver;
use std::collections::BTreeMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// One detected ChArUco corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CharucoCorner {
    pub id: u32,
    /// Pixel position.
    pub position: Point2<f32>,
}

/// Anything that finds ChArUco corners in a gray frame.
///
/// Detection failures are reported as an empty list.
pub trait BoardDetector {
    fn detect_board(&self, frame: &GrayImageView<'_>) -> Vec<CharucoCorner>;
}

/// Corner detector driven by decoded markers.
///
/// Every marker on the board fixes a homography between its printed
/// corners (board mm) and its image corners; that homography predicts the
/// inner corners of the marker's square. A corner seen by several markers
/// gets the mean of their predictions.
#[derive(Debug)]
pub struct MarkerCharucoDetector {
    board: CharucoBoard,
    resolver: MarkerResolver,
}

impl MarkerCharucoDetector {
    pub fn new(board: CharucoBoard, resolver: MarkerResolver) -> Self {
        Self { board, resolver }
    }

    pub fn board(&self) -> &CharucoBoard {
        &self.board
    }
}

impl BoardDetector for MarkerCharucoDetector {
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    fn detect_board(&self, frame: &GrayImageView<'_>) -> Vec<CharucoCorner> {
        let markers = self.resolver.detect_markers(frame);

        let mut acc: BTreeMap<u32, (f64, f64, u32)> = BTreeMap::new();
        let mut used = 0usize;
        for marker in &markers {
            let (Some(board_xy), Some(square_xy), Some(ids)) = (
                self.board.marker_xy(marker.id),
                self.board.marker_square_xy(marker.id),
                self.board.marker_square_corner_ids(marker.id),
            ) else {
                continue;
            };
            let img_xy = marker
                .corners
                .map(|p| Point2::new(p.x as f64, p.y as f64));
            let Some(h) = estimate_homography(&board_xy, &img_xy) else {
                continue;
            };
            used += 1;

            for (corner_id, xy) in ids.iter().zip(square_xy) {
                let Some(corner_id) = *corner_id else {
                    continue;
                };
                let p = h.apply_f64(xy);
                if !p.x.is_finite() || !p.y.is_finite() {
                    continue;
                }
                let e = acc.entry(corner_id).or_insert((0.0, 0.0, 0));
                e.0 += p.x;
                e.1 += p.y;
                e.2 += 1;
            }
        }

        let (w, h) = (frame.width as f32, frame.height as f32);
        let corners: Vec<CharucoCorner> = acc
            .into_iter()
            .map(|(id, (x, y, n))| CharucoCorner {
                id,
                position: Point2::new((x / n as f64) as f32, (y / n as f64) as f32),
            })
            .filter(|c| {
                c.position.x >= 0.0 && c.position.y >= 0.0 && c.position.x < w && c.position.y < h
            })
            .collect();

        log::debug!(
            "detect_board: {} markers ({} on board) -> {} corners",
            markers.len(),
            used,
            corners.len()
        );
        corners
    }
}
