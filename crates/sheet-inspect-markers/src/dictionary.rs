//! Dictionary metadata and code tables.

use crate::builtins;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Errors raised while loading or validating a code table.
#[derive(thiserror::Error, Debug)]
pub enum DictionaryError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("marker_size {marker_size} implies {bits} bits > 64 (unsupported)")]
    TooManyBits { marker_size: usize, bits: usize },
    #[error("dictionary `{name}` has no codes")]
    Empty { name: String },
    #[error("code #{index} = {code:#x} does not fit in {bits} bits")]
    CodeOutOfRange { index: usize, code: u64, bits: usize },
    #[error("dictionary `{got}` loaded where `{expected}` was configured")]
    KindMismatch { expected: String, got: String },
    #[error("no built-in code table for `{name}`; load one from a directory")]
    NotBuiltin { name: &'static str },
}

/// The supported marker families.
///
/// All variants share one detection pipeline; they differ only in bit layout,
/// correction capability and code table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MarkerDictionary {
    #[serde(rename = "DICT_4X4_50")]
    Aruco4x4_50,
    #[serde(rename = "DICT_6X6_250")]
    #[default]
    Aruco6x6_250,
    #[serde(rename = "DICT_APRILTAG_36h11")]
    AprilTag36h11,
}

impl MarkerDictionary {
    pub const ALL: [MarkerDictionary; 3] = [
        MarkerDictionary::Aruco4x4_50,
        MarkerDictionary::Aruco6x6_250,
        MarkerDictionary::AprilTag36h11,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MarkerDictionary::Aruco4x4_50 => "DICT_4X4_50",
            MarkerDictionary::Aruco6x6_250 => "DICT_6X6_250",
            MarkerDictionary::AprilTag36h11 => "DICT_APRILTAG_36h11",
        }
    }

    /// Inner bits per side.
    pub fn marker_size(self) -> usize {
        match self {
            MarkerDictionary::Aruco4x4_50 => 4,
            MarkerDictionary::Aruco6x6_250 | MarkerDictionary::AprilTag36h11 => 6,
        }
    }

    pub fn max_correction_bits(self) -> u8 {
        match self {
            MarkerDictionary::Aruco4x4_50 => 1,
            MarkerDictionary::Aruco6x6_250 => 5,
            MarkerDictionary::AprilTag36h11 => 5,
        }
    }

    /// Number of ids in the canonical table.
    pub fn capacity(self) -> usize {
        match self {
            MarkerDictionary::Aruco4x4_50 => 50,
            MarkerDictionary::Aruco6x6_250 => 250,
            MarkerDictionary::AprilTag36h11 => 587,
        }
    }

    /// Conventional file name of the code table, e.g. `DICT_6X6_250_CODES.json`.
    pub fn codes_file_name(self) -> String {
        format!("{}_CODES.json", self.name())
    }

    /// Embedded JSON table, if the crate was built with one.
    fn builtin_json(self) -> Option<&'static str> {
        match self {
            MarkerDictionary::Aruco4x4_50 => builtins::DICT_4X4_50,
            MarkerDictionary::Aruco6x6_250 => builtins::DICT_6X6_250,
            MarkerDictionary::AprilTag36h11 => builtins::DICT_APRILTAG_36h11,
        }
    }

    /// The code table compiled in from `data/<NAME>_CODES.json`.
    pub fn builtin(self) -> Result<Dictionary, DictionaryError> {
        let raw = self.builtin_json().ok_or(DictionaryError::NotBuiltin { name: self.name() })?;
        let dict = Dictionary::from_json_str(raw)?;
        dict.check_kind(self)?;
        Ok(dict)
    }

    /// Load the code table for this family from `dir/<NAME>_CODES.json`.
    pub fn load_from_dir(self, dir: impl AsRef<Path>) -> Result<Dictionary, DictionaryError> {
        let dict = Dictionary::from_json_file(dir.as_ref().join(self.codes_file_name()))?;
        dict.check_kind(self)?;
        Ok(dict)
    }
}

/// An ArUco/AprilTag-style code table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dictionary {
    /// Human-readable name (for debugging/logging).
    pub name: String,
    /// Marker side length (number of inner bits per side).
    pub marker_size: usize,
    /// Maximum error-correcting Hamming distance supported by the dictionary.
    pub max_correction_bits: u8,
    /// One `u64` per marker id, encoding the inner `marker_size × marker_size` bits.
    ///
    /// Bits are stored in row-major order with **black = 1**.
    pub codes: Vec<u64>,
}

impl Dictionary {
    /// Build and validate a dictionary for `kind` from explicit codes.
    pub fn new(kind: MarkerDictionary, codes: Vec<u64>) -> Result<Self, DictionaryError> {
        let dict = Self {
            name: kind.name().to_string(),
            marker_size: kind.marker_size(),
            max_correction_bits: kind.max_correction_bits(),
            codes,
        };
        dict.validate()?;
        Ok(dict)
    }

    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    pub fn from_json_str(raw: &str) -> Result<Self, DictionaryError> {
        let dict: Dictionary = serde_json::from_str(raw)?;
        dict.validate()?;
        Ok(dict)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DictionaryError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), DictionaryError> {
        let bits = self.bit_count();
        if bits > 64 {
            return Err(DictionaryError::TooManyBits {
                marker_size: self.marker_size,
                bits,
            });
        }
        if self.codes.is_empty() {
            return Err(DictionaryError::Empty {
                name: self.name.clone(),
            });
        }
        if bits < 64 {
            let limit = 1u64 << bits;
            if let Some((index, &code)) = self.codes.iter().enumerate().find(|&(_, &c)| c >= limit)
            {
                return Err(DictionaryError::CodeOutOfRange { index, code, bits });
            }
        }
        Ok(())
    }

    fn check_kind(&self, kind: MarkerDictionary) -> Result<(), DictionaryError> {
        if self.marker_size != kind.marker_size() {
            return Err(DictionaryError::KindMismatch {
                expected: kind.name().to_string(),
                got: self.name.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_codes_wider_than_marker() {
        let err = Dictionary::new(MarkerDictionary::Aruco4x4_50, vec![0x1234, 0x1_0000]).unwrap_err();
        assert!(matches!(
            err,
            DictionaryError::CodeOutOfRange { index: 1, bits: 16, .. }
        ));
    }

    #[test]
    fn loads_table_by_conventional_file_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dict = Dictionary::new(MarkerDictionary::Aruco4x4_50, vec![0xB2C4, 0x1E6A]).expect("dict");
        dict.write_json(dir.path().join("DICT_4X4_50_CODES.json"))
            .expect("write");

        let loaded = MarkerDictionary::Aruco4x4_50
            .load_from_dir(dir.path())
            .expect("load");
        assert_eq!(loaded, dict);
        assert!(MarkerDictionary::Aruco6x6_250.load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn builtin_tables_match_their_family() {
        for kind in MarkerDictionary::ALL {
            match kind.builtin() {
                Ok(dict) => {
                    assert_eq!(dict.marker_size, kind.marker_size());
                    assert_eq!(dict.codes.len(), kind.capacity(), "{}", kind.name());
                }
                Err(DictionaryError::NotBuiltin { name }) => assert_eq!(name, kind.name()),
                Err(err) => panic!("{}: {err}", kind.name()),
            }
        }
    }

    #[test]
    fn serde_names_follow_opencv_constants() {
        let json = serde_json::to_string(&MarkerDictionary::AprilTag36h11).expect("json");
        assert_eq!(json, "\"DICT_APRILTAG_36h11\"");
        let kind: MarkerDictionary = serde_json::from_str("\"DICT_6X6_250\"").expect("parse");
        assert_eq!(kind, MarkerDictionary::Aruco6x6_250);
    }
}
