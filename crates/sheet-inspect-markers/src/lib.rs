//! Fiducial marker detection (ArUco / AprilTag style square markers).
//!
//! One pipeline serves every supported family; a [`MarkerDictionary`]
//! variant only selects bit layout, correction capability and code table:
//!
//! 1. global Otsu threshold and 4-connected dark components,
//! 2. convex quad fitting ([`find_quads`]),
//! 3. bit sampling through a 4-point homography and dictionary matching
//!    over all four rotations ([`decode_quads`]),
//! 4. per-id deduplication.
//!
//! Code tables are JSON (see [`Dictionary`]). Tables found under `data/`
//! at build time are embedded ([`MarkerDictionary::builtin`]); a directory
//! of `<NAME>_CODES.json` files overrides them.
//!
//! ## Quickstart
//!
//! ```no_run
//! use sheet_inspect_core::GrayImage;
//! use sheet_inspect_markers::{MarkerDetectParams, MarkerResolver};
//!
//! let resolver = MarkerResolver::new(MarkerDetectParams::default());
//! let frame = GrayImage::new(640, 480, 255);
//! for marker in resolver.detect_markers(&frame.view()) {
//!     println!("marker {} at {:?}", marker.id, marker.corners[0]);
//! }
//! ```

mod builtins;
mod decode;
mod dictionary;
mod matcher;
mod quad;
mod resolver;
pub mod synthetic;
mod threshold;

pub use decode::{decode_quad, decode_quads, DecodeConfig, MarkerDetection};
pub use dictionary::{Dictionary, DictionaryError, MarkerDictionary};
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use quad::{find_quads, Quad, QuadParams};
pub use resolver::{
    virtual_tag_for_feature, FiducialMarker, MarkerDetectParams, MarkerResolver,
    VIRTUAL_TAG_SIZE_PX,
};
pub use threshold::otsu_threshold;
