//! Error types for the stamp-extractor library.
//!
//! A single [`StampError`] enum covers every failure the client can hit.
//! Nothing here is fatal to a [`crate::session::Session`]: each error is
//! caught where the request completes, stored as a user-visible message and
//! the session stays usable, so the user can retry by re-uploading or
//! navigating to another page.
//!
//! Errors fall into the categories returned by [`StampError::kind`]. The
//! session uses the category to pick the message shown to the user and to
//! decide which state to fall back to.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse error category, used to choose the user-facing message and the
/// fallback state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The uploaded file is unreadable or not a PDF.
    DocumentLoad,
    /// Page-count discovery failed.
    InfoFetch,
    /// A page image could not be fetched or rendered.
    Rasterization,
    /// The detection request failed or was rejected.
    Extraction,
    /// The caller asked for something the current state does not allow.
    Usage,
    /// Unexpected local failure.
    Internal,
}

/// All errors returned by the stamp-extractor library.
#[derive(Debug, Error)]
pub enum StampError {
    // ── Document errors ───────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input is neither a PDF by declared type nor by content.
    #[error("'{name}' is not a PDF ({reason})")]
    NotAPdf { name: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// pdfium could not parse the document.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    // ── Service errors ────────────────────────────────────────────────────
    /// `/get-info` failed or returned something other than a page count.
    #[error("Could not read page count: {detail}")]
    InfoFetchFailed { detail: String },

    /// The page image could not be fetched or rendered.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Requested page index is past the end of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Could not bind to a pdfium library for local rendering.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide,\n\
or use the remote rasteriser (drop --local)."
    )]
    PdfiumBindingFailed(String),

    /// The detection request could not be completed.
    #[error("Extraction failed for page {page}: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// The detection service answered with a non-success status.
    #[error("Extraction rejected for page {page}: HTTP {status}: {detail}")]
    ExtractionRejected {
        page: usize,
        status: u16,
        detail: String,
    },

    // ── Usage errors ──────────────────────────────────────────────────────
    /// An operation needs a loaded document.
    #[error("No document loaded")]
    NoDocument,

    /// A request is already pending; the control is disabled until it resolves.
    #[error("A request is already in progress")]
    Busy,

    /// The current page has no image to run extraction against.
    #[error("Page {page} has no image loaded")]
    PageNotLoaded { page: usize },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write an output artefact (annotated page, thumbnail, page image).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StampError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StampError::FileNotFound { .. }
            | StampError::PermissionDenied { .. }
            | StampError::NotAPdf { .. }
            | StampError::DownloadFailed { .. }
            | StampError::DownloadTimeout { .. }
            | StampError::CorruptPdf { .. }
            | StampError::PasswordRequired { .. }
            | StampError::WrongPassword { .. } => ErrorKind::DocumentLoad,
            StampError::InfoFetchFailed { .. } => ErrorKind::InfoFetch,
            StampError::RasterisationFailed { .. }
            | StampError::PageOutOfRange { .. }
            | StampError::PdfiumBindingFailed(_) => ErrorKind::Rasterization,
            StampError::ExtractionFailed { .. } | StampError::ExtractionRejected { .. } => {
                ErrorKind::Extraction
            }
            StampError::NoDocument
            | StampError::Busy
            | StampError::PageNotLoaded { .. }
            | StampError::InvalidConfig(_) => ErrorKind::Usage,
            StampError::OutputWriteFailed { .. } | StampError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Short message suitable for the error banner of a front end.
    pub fn user_message(&self) -> String {
        match self {
            StampError::NotAPdf { .. } => "Please upload a PDF file".to_string(),
            StampError::PasswordRequired { .. } | StampError::WrongPassword { .. } => {
                self.to_string()
            }
            StampError::InfoFetchFailed { .. } => {
                "Failed to load PDF. Make sure the backend is running.".to_string()
            }
            StampError::PageOutOfRange { .. } | StampError::PdfiumBindingFailed(_) => {
                self.to_string()
            }
            StampError::RasterisationFailed { .. } => "Failed to load page image".to_string(),
            StampError::ExtractionFailed { .. } | StampError::ExtractionRejected { .. } => {
                "Extraction failed. Make sure the backend is running.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pdf_names_expected_type() {
        let e = StampError::NotAPdf {
            name: "photo.png".into(),
            reason: "content type image/png".into(),
        };
        assert_eq!(e.kind(), ErrorKind::DocumentLoad);
        assert!(e.user_message().contains("PDF"));
        assert!(e.to_string().contains("photo.png"));
    }

    #[test]
    fn rejected_extraction_display() {
        let e = StampError::ExtractionRejected {
            page: 2,
            status: 500,
            detail: "tesseract missing".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("HTTP 500"), "got: {msg}");
        assert!(msg.contains("tesseract missing"));
        assert_eq!(e.kind(), ErrorKind::Extraction);
        assert_eq!(
            e.user_message(),
            "Extraction failed. Make sure the backend is running."
        );
    }

    #[test]
    fn page_out_of_range_is_rasterisation() {
        let e = StampError::PageOutOfRange { page: 7, total: 3 };
        assert_eq!(e.kind(), ErrorKind::Rasterization);
        assert!(e.user_message().contains("3 pages"));
    }

    #[test]
    fn usage_errors() {
        assert_eq!(StampError::Busy.kind(), ErrorKind::Usage);
        assert_eq!(StampError::NoDocument.kind(), ErrorKind::Usage);
        assert_eq!(
            StampError::InvalidConfig("x".into()).kind(),
            ErrorKind::Usage
        );
    }

    #[test]
    fn info_fetch_message_mentions_backend() {
        let e = StampError::InfoFetchFailed {
            detail: "connection refused".into(),
        };
        assert_eq!(e.kind(), ErrorKind::InfoFetch);
        assert!(e.user_message().contains("backend"));
    }
}
