//! High-level facade for the `sheet-inspect-*` workspace.
//!
//! This crate provides:
//! - re-exports of the calibration, marker, feature and matching crates
//! - [`Inspector`], the one-frame pipeline from an RGB image to verdicts
//! - (feature `image`) adapters from `image` buffers and file helpers
//! - (feature `cli`) the `sheet-inspect` binary
//!
//! ## Quickstart
//!
//! ```no_run
//! use sheet_inspect::matching::Specification;
//! use sheet_inspect::{frames, InspectionConfig, Inspector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = Specification::from_json_file("spec.json")?;
//! let calibration = sheet_inspect::calib::io::load_calibration_file("calibration.json").ok();
//! let inspector = Inspector::new(spec, InspectionConfig::default()).with_calibration(calibration);
//!
//! let report = frames::inspect_file(&inspector, "plate.png")?;
//! println!("passed: {}", report.passed);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `sheet_inspect::core`: image views, geometry, camera model, logging.
//! - `sheet_inspect::markers`: fiducial dictionaries and marker decoding.
//! - `sheet_inspect::calib`: ChArUco calibration and its JSON file.
//! - `sheet_inspect::features`: holes, countersinks, alodine, sheet, defects.
//! - `sheet_inspect::matching`: specifications, matching and verdicts.
//! - `sheet_inspect::frames` (feature `image`): helpers over `image` buffers.

pub use sheet_inspect_calib as calib;
pub use sheet_inspect_core as core;
pub use sheet_inspect_features as features;
pub use sheet_inspect_markers as markers;
pub use sheet_inspect_match as matching;

mod config;
mod error;
mod inspector;

#[cfg(feature = "image")]
pub mod frames;

pub use config::{InspectionConfig, StrategyKind};
pub use error::InspectError;
pub use inspector::{type_counts, InspectionReport, Inspector, ScaleSource};
