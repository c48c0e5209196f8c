//! Detection results returned by `/extract-stamp`.
//!
//! The service has shipped two incompatible response shapes: an older one
//! describing exactly one stamp at the top level, and a newer one with a
//! `stamps` array plus the raw OCR text. Both are parsed here and normalised
//! into a [`DetectionSet`]; the single-stamp shape becomes a one-element set.
//! The original JSON is kept next to the parsed form so front ends can show
//! and copy exactly what the service said.

use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};

/// One detected stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Classification label, e.g. `approval_stamp`.
    pub symbol_type: String,
    /// Box in the pixel space of the raster the service analysed.
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub engineer_name: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
}

/// Canonical extraction result for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSet {
    /// 0-indexed page the service analysed.
    pub page: usize,
    /// Detections in service order.
    pub detections: Vec<Detection>,
    /// OCR text of the analysed region, when the service reports it.
    pub raw_text: Option<String>,
    /// Unit of the box coordinates (the service uses `pixels`).
    pub units: String,
    /// The response body exactly as received.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl DetectionSet {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    /// Pretty-printed raw payload; this is what a "copy JSON" action copies.
    pub fn pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.raw).unwrap_or_else(|_| self.raw.to_string())
    }

    /// Parse a response body into the canonical form.
    pub fn from_json(raw: serde_json::Value) -> Result<Self, serde_json::Error> {
        let parsed: ExtractionResponse = serde_json::from_value(raw.clone())?;
        Ok(parsed.into_set(raw))
    }
}

/// Wire format of `/extract-stamp`; either shape is accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExtractionResponse {
    /// `{ page, stamps: [...], raw_text, units }`
    Multi {
        page: usize,
        stamps: Vec<Detection>,
        #[serde(default)]
        raw_text: Option<String>,
        #[serde(default = "default_units")]
        units: String,
    },
    /// `{ page, symbol_type, bounding_box, engineer_name, license_number, units }`
    Single {
        page: usize,
        #[serde(flatten)]
        stamp: Detection,
        #[serde(default = "default_units")]
        units: String,
    },
}

fn default_units() -> String {
    "pixels".to_string()
}

impl ExtractionResponse {
    fn into_set(self, raw: serde_json::Value) -> DetectionSet {
        match self {
            ExtractionResponse::Multi {
                page,
                stamps,
                raw_text,
                units,
            } => DetectionSet {
                page,
                detections: stamps,
                raw_text,
                units,
                raw,
            },
            ExtractionResponse::Single { page, stamp, units } => DetectionSet {
                page,
                detections: vec![stamp],
                raw_text: None,
                units,
                raw,
            },
        }
    }
}
