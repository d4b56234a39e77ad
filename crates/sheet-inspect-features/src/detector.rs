//! All geometric detectors over one RGB frame.

use crate::alodine::{AlodineDetector, AlodineParams, AlodineResult};
use crate::countersink::{CountersinkClassifier, CountersinkParams, HoleClass};
use crate::defects::{DefectDetector, DefectParams, Deformation, Scratch};
use crate::feature::{DetectionItem, FeatureType, PixelGeometry};
use crate::holes::{HoleCandidate, HoleDetector, HoleDetectorParams};
use crate::sheet::{SheetDetector, SheetOutline, SheetParams};
use serde::{Deserialize, Serialize};
use sheet_inspect_core::{Circle, RgbImageView};
use std::{fs, path::Path};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum FeatureParamsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Every detector's settings; missing sections fall back to defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureDetectorParams {
    pub holes: HoleDetectorParams,
    pub countersink: CountersinkParams,
    pub alodine: AlodineParams,
    pub sheet: SheetParams,
    pub defects: DefectParams,
}

impl FeatureDetectorParams {
    pub fn from_json_str(json: &str) -> Result<Self, FeatureParamsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FeatureParamsError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// One hole with its classification and halo check.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoleReport {
    pub hole: HoleCandidate,
    pub class: HoleClass,
    pub alodine: AlodineResult,
}

/// Raw detector outputs for one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureReport {
    pub holes: Vec<HoleReport>,
    pub sheet: Option<SheetOutline>,
    pub scratches: Vec<Scratch>,
    pub deformations: Vec<Deformation>,
}

impl FeatureReport {
    /// Flatten into detection items.
    ///
    /// Countersunk holes become [`FeatureType::Countersink`], the other
    /// classes plain holes. Each present halo adds an
    /// [`FeatureType::AlodineHalo`] ring scored by its coverage.
    pub fn items(&self) -> Vec<DetectionItem> {
        let mut out = Vec::new();
        if let Some(sheet) = &self.sheet {
            out.push(DetectionItem::new(
                FeatureType::Sheet,
                PixelGeometry::Box(sheet.rect),
                1.0,
            ));
        }
        for h in &self.holes {
            let ty = match h.class {
                HoleClass::Countersink => FeatureType::Countersink,
                HoleClass::Anodized | HoleClass::Normal => FeatureType::Hole,
            };
            out.push(
                DetectionItem::new(ty, PixelGeometry::Circle(h.hole.circle()), 1.0)
                    .with_alodine(h.alodine.present),
            );
        }
        for h in self.holes.iter().filter(|h| h.alodine.present) {
            let ring = Circle {
                center: h.hole.center,
                radius: 0.5 * h.alodine.outer_diameter_px,
            };
            out.push(DetectionItem::new(
                FeatureType::AlodineHalo,
                PixelGeometry::Circle(ring),
                h.alodine.coverage.clamp(0.0, 1.0),
            ));
        }
        for s in &self.scratches {
            out.push(DetectionItem::new(
                FeatureType::Scratch,
                PixelGeometry::Line(s.segment()),
                1.0,
            ));
        }
        for d in &self.deformations {
            out.push(DetectionItem::new(
                FeatureType::Deformation,
                PixelGeometry::Box(d.bounding),
                1.0,
            ));
        }
        out
    }

    pub fn count(&self, ty: FeatureType) -> usize {
        match ty {
            FeatureType::Sheet => usize::from(self.sheet.is_some()),
            FeatureType::Hole => self
                .holes
                .iter()
                .filter(|h| h.class != HoleClass::Countersink)
                .count(),
            FeatureType::Countersink => self
                .holes
                .iter()
                .filter(|h| h.class == HoleClass::Countersink)
                .count(),
            FeatureType::AlodineHalo => self.holes.iter().filter(|h| h.alodine.present).count(),
            FeatureType::Scratch => self.scratches.len(),
            FeatureType::Deformation => self.deformations.len(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FeatureDetector {
    holes: HoleDetector,
    countersink: CountersinkClassifier,
    alodine: AlodineDetector,
    sheet: SheetDetector,
    defects: DefectDetector,
}

impl FeatureDetector {
    pub fn new(params: FeatureDetectorParams) -> Self {
        Self {
            holes: HoleDetector::new(params.holes),
            countersink: CountersinkClassifier::new(params.countersink),
            alodine: AlodineDetector::new(params.alodine),
            sheet: SheetDetector::new(params.sheet),
            defects: DefectDetector::new(params.defects),
        }
    }

    pub fn params(&self) -> FeatureDetectorParams {
        FeatureDetectorParams {
            holes: *self.holes.params(),
            countersink: *self.countersink.params(),
            alodine: *self.alodine.params(),
            sheet: *self.sheet.params(),
            defects: *self.defects.params(),
        }
    }

    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all, fields(w = rgb.width, h = rgb.height)))]
    pub fn detect_report(&self, rgb: &RgbImageView<'_>) -> FeatureReport {
        let gray = rgb.to_gray();
        let gray = gray.view();
        let holes = self
            .holes
            .detect(&gray)
            .into_iter()
            .map(|hole| HoleReport {
                hole,
                class: self.countersink.classify(rgb, &gray, &hole),
                alodine: self.alodine.inspect(rgb, &hole),
            })
            .collect();
        let report = FeatureReport {
            holes,
            sheet: self.sheet.detect(&gray),
            scratches: self.defects.scratches(&gray),
            deformations: self.defects.deformations(&gray),
        };
        log::info!(
            "features: {} holes ({} countersinks), {} scratches, {} deformations, sheet {}",
            report.holes.len(),
            report.count(FeatureType::Countersink),
            report.scratches.len(),
            report.deformations.len(),
            if report.sheet.is_some() { "found" } else { "missing" },
        );
        report
    }

    pub fn detect(&self, rgb: &RgbImageView<'_>) -> Vec<DetectionItem> {
        self.detect_report(rgb).items()
    }
}
