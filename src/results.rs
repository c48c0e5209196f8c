//! Plain-text results panel.
//!
//! Renders what the side panel of a viewer would show for the current page:
//! the extracted fields of each detection (with `NOT DETECTED` for missing
//! values) and the raw JSON payload as received.

use crate::detection::DetectionSet;
use crate::session::Session;
use std::fmt;

/// Placeholder for a field the service could not read.
pub const NOT_DETECTED: &str = "NOT DETECTED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    pub symbol_type: String,
    pub engineer_name: String,
    pub license_number: String,
}

/// The rendered panel for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsPanel {
    /// 0-indexed.
    pub page: usize,
    pub page_count: usize,
    pub rows: Vec<FieldRow>,
    pub raw_text: Option<String>,
    /// Pretty-printed payload; the text a copy action puts on the clipboard.
    pub json: String,
}

impl ResultsPanel {
    pub fn new(set: &DetectionSet, page_count: usize) -> Self {
        let rows = set
            .detections
            .iter()
            .map(|d| FieldRow {
                symbol_type: d.symbol_type.clone(),
                engineer_name: field(d.engineer_name.as_deref()),
                license_number: field(d.license_number.as_deref()),
            })
            .collect();
        Self {
            page: set.page,
            page_count,
            rows,
            raw_text: set.raw_text.clone().filter(|t| !t.trim().is_empty()),
            json: set.pretty_json(),
        }
    }

    /// Panel for the session's current result, if there is one.
    pub fn from_session(session: &Session) -> Option<Self> {
        session
            .detections()
            .map(|set| Self::new(set, session.page_count()))
    }
}

fn field(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NOT_DETECTED.to_string(),
    }
}

impl fmt::Display for ResultsPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PAGE {} OF {}", self.page + 1, self.page_count)?;
        writeln!(f)?;
        writeln!(f, "EXTRACTED FIELDS")?;
        if self.rows.is_empty() {
            writeln!(f, "  No stamps found on page {}", self.page + 1)?;
        }
        for (i, row) in self.rows.iter().enumerate() {
            writeln!(f, "  Stamp {} ({})", i + 1, row.symbol_type)?;
            writeln!(f, "    Engineer Name:  {}", row.engineer_name)?;
            writeln!(f, "    License Number: {}", row.license_number)?;
        }
        if let Some(text) = &self.raw_text {
            writeln!(f)?;
            writeln!(f, "OCR TEXT")?;
            for line in text.lines() {
                writeln!(f, "  {line}")?;
            }
        }
        writeln!(f)?;
        writeln!(f, "JSON OUTPUT")?;
        write!(f, "{}", self.json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(v: serde_json::Value) -> DetectionSet {
        DetectionSet::from_json(v).unwrap()
    }

    #[test]
    fn missing_fields_show_placeholder() {
        let set = parse(json!({
            "page": 0,
            "symbol_type": "approval_stamp",
            "bounding_box": [1, 2, 3, 4],
            "engineer_name": "JANE DOE",
            "license_number": null,
            "units": "pixels"
        }));
        let panel = ResultsPanel::new(&set, 2);
        assert_eq!(
            panel.rows,
            vec![FieldRow {
                symbol_type: "approval_stamp".into(),
                engineer_name: "JANE DOE".into(),
                license_number: NOT_DETECTED.into(),
            }]
        );
        let text = panel.to_string();
        assert!(text.starts_with("PAGE 1 OF 2\n"));
        assert!(text.contains("Engineer Name:  JANE DOE"));
        assert!(text.contains("License Number: NOT DETECTED"));
        assert!(text.contains("\"engineer_name\": \"JANE DOE\""));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let set = parse(json!({
            "page": 1,
            "stamps": [{
                "symbol_type": "approval_stamp",
                "bounding_box": [0, 0, 1, 1],
                "engineer_name": "  ",
                "license_number": "PE 555"
            }],
            "raw_text": "",
            "units": "pixels"
        }));
        let panel = ResultsPanel::new(&set, 3);
        assert_eq!(panel.rows[0].engineer_name, NOT_DETECTED);
        assert_eq!(panel.rows[0].license_number, "PE 555");
        assert_eq!(panel.raw_text, None);
    }

    #[test]
    fn empty_result_says_none_found() {
        let set = parse(json!({
            "page": 2,
            "stamps": [],
            "raw_text": "GENERAL NOTES\nSHEET 3",
            "units": "pixels"
        }));
        let text = ResultsPanel::new(&set, 3).to_string();
        assert!(text.contains("No stamps found on page 3"), "{text}");
        assert!(text.contains("OCR TEXT\n  GENERAL NOTES\n  SHEET 3\n"));
        assert!(text.contains("\"stamps\": []"));
    }
}
