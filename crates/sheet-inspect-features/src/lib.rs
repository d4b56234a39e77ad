//! Geometric feature detection for sheet-metal inspection.
//!
//! Detectors work on borrowed [`sheet_inspect_core::GrayImageView`] /
//! [`sheet_inspect_core::RgbImageView`] frames and report pixel-space
//! results:
//!
//! - [`HoleDetector`]: Hough circles on a blurred gray frame.
//! - [`CountersinkClassifier`]: anodized / countersink / normal per hole.
//! - [`AlodineDetector`]: coating coverage in an annulus around a hole.
//! - [`SheetDetector`]: largest quadrilateral outline.
//! - [`DefectDetector`]: deformations (irregular contours) and scratches
//!   (straight edge runs).
//!
//! [`FeatureDetector`] runs all of them and flattens the results into
//! [`DetectionItem`]s; [`PixelToMm`] then attaches millimeter
//! measurements. Boxes from an external object detector enter through
//! [`CandidateFilter`].
//!
//! ## Quickstart
//!
//! ```
//! use nalgebra::Point2;
//! use sheet_inspect_core::RgbImage;
//! use sheet_inspect_features::{FeatureDetector, PixelToMm};
//!
//! let frame = RgbImage::new(64, 48, [128, 128, 128]);
//! let mut items = FeatureDetector::default().detect(&frame.view());
//! PixelToMm::new(0.264, Point2::origin()).measure_all(&mut items);
//! assert!(items.is_empty());
//! ```

pub mod imgproc;

mod alodine;
mod blueprint;
mod countersink;
mod defects;
mod detector;
mod external;
mod feature;
mod holes;
mod sheet;
mod units;

pub use alodine::{AlodineDetector, AlodineParams, AlodineResult};
pub use blueprint::{rotate_180, BlueprintMatch, BlueprintMatcher, Orientation, MATCH_THRESHOLD};
pub use countersink::{CountersinkClassifier, CountersinkParams, HoleClass};
pub use defects::{DefectDetector, DefectParams, Deformation, Scratch};
pub use detector::{
    FeatureDetector, FeatureDetectorParams, FeatureParamsError, FeatureReport, HoleReport,
};
pub use external::{CandidateFilter, ExternalCandidate};
pub use feature::{DetectionItem, FeatureType, Measurement, PixelGeometry};
pub use holes::{HoleCandidate, HoleDetector, HoleDetectorParams};
pub use sheet::{SheetDetector, SheetOutline, SheetParams};
pub use units::{choose_origin, PixelToMm, Undistortion};
