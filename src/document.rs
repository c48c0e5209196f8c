//! Documents: the uploaded PDF the whole session revolves around.
//!
//! A [`Document`] is an immutable name + byte buffer. The bytes are shared
//! (`Arc<[u8]>`) so every request of a session can send or render the same
//! upload without copying it around the state machine.
//!
//! Validation happens before anything touches the network: a declared
//! content type other than `application/pdf` or content that does not start
//! with the `%PDF` magic bytes is rejected with [`StampError::NotAPdf`].

use crate::error::StampError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// MIME type accepted for uploads.
pub const PDF_MIME: &str = "application/pdf";

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// An uploaded PDF document.
#[derive(Clone)]
pub struct Document {
    name: String,
    bytes: Arc<[u8]>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Document {
    /// Build a document from an in-memory upload.
    ///
    /// `content_type` is the type declared by whatever delivered the bytes
    /// (a drop event, an HTTP header). When present it must be
    /// `application/pdf`; the content is checked for PDF magic bytes either way.
    pub fn from_upload(
        name: impl Into<String>,
        content_type: Option<&str>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<Self, StampError> {
        let name = name.into();
        if let Some(ct) = content_type {
            let essence = ct.split(';').next().unwrap_or("").trim();
            if !essence.eq_ignore_ascii_case(PDF_MIME) {
                return Err(StampError::NotAPdf {
                    name,
                    reason: format!("content type {essence}"),
                });
            }
        }
        let bytes = bytes.into();
        check_magic(&name, &bytes)?;
        debug!("Accepted upload '{}' ({} bytes)", name, bytes.len());
        Ok(Self { name, bytes })
    }

    /// Read a document from a local file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StampError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StampError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => StampError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => StampError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_upload(name, None, bytes)
    }

    /// Resolve a user-supplied path or HTTP(S) URL to a document.
    pub async fn resolve(input: &str, timeout_secs: u64) -> Result<Self, StampError> {
        if is_url(input) {
            download_url(input, timeout_secs).await
        } else {
            let path = PathBuf::from(input);
            tokio::task::spawn_blocking(move || Self::from_path(path))
                .await
                .map_err(|e| StampError::Internal(format!("Read task panicked: {e}")))?
        }
    }

    /// File name shown to the user.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw PDF bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the bytes, for moving into blocking tasks.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn check_magic(name: &str, bytes: &[u8]) -> Result<(), StampError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        let shown = &bytes[..bytes.len().min(4)];
        return Err(StampError::NotAPdf {
            name: name.to_string(),
            reason: format!("first bytes {shown:?}"),
        });
    }
    Ok(())
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, StampError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| StampError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            StampError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            StampError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(StampError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| StampError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    // Servers label PDFs as octet-stream often enough that only the magic
    // bytes are authoritative for downloads.
    let declared = content_type
        .as_deref()
        .filter(|ct| !ct.starts_with("application/octet-stream"));

    let doc = Document::from_upload(filename_from_url(url), declared, bytes.to_vec())?;
    info!("Downloaded '{}' ({} bytes)", doc.name(), doc.len());
    Ok(doc)
}

/// Extract a reasonable filename from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINI_PDF: &[u8] = b"%PDF-1.4\n%%EOF\n";

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn upload_accepts_pdf() {
        let doc = Document::from_upload("plan.pdf", Some("application/pdf"), MINI_PDF.to_vec())
            .expect("pdf accepted");
        assert_eq!(doc.name(), "plan.pdf");
        assert_eq!(doc.bytes(), MINI_PDF);
    }

    #[test]
    fn upload_rejects_declared_non_pdf() {
        // Even PDF bytes are refused when the drop declares another type.
        let err = Document::from_upload("scan.png", Some("image/png"), MINI_PDF.to_vec())
            .unwrap_err();
        assert!(matches!(err, StampError::NotAPdf { .. }));
        assert_eq!(err.user_message(), "Please upload a PDF file");
    }

    #[test]
    fn upload_accepts_content_type_parameters() {
        let doc = Document::from_upload(
            "plan.pdf",
            Some("Application/PDF; charset=binary"),
            MINI_PDF.to_vec(),
        );
        assert!(doc.is_ok());
    }

    #[test]
    fn upload_rejects_bad_magic() {
        let err = Document::from_upload("notes.pdf", None, b"hello world".to_vec()).unwrap_err();
        assert!(matches!(err, StampError::NotAPdf { .. }));
        let err = Document::from_upload("empty.pdf", None, Vec::new()).unwrap_err();
        assert!(matches!(err, StampError::NotAPdf { .. }));
    }

    #[test]
    fn from_path_reads_file() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(MINI_PDF).unwrap();
        let doc = Document::from_path(tmp.path()).unwrap();
        assert!(doc.name().ends_with(".pdf"));
        assert_eq!(doc.len(), MINI_PDF.len());
    }

    #[test]
    fn from_path_missing_file() {
        let err = Document::from_path("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, StampError::FileNotFound { .. }));
    }

    #[test]
    fn filename_from_url_falls_back() {
        assert_eq!(
            filename_from_url("https://example.com/plans/S-101.pdf"),
            "S-101.pdf"
        );
        assert_eq!(filename_from_url("https://example.com/"), "downloaded.pdf");
    }

    #[test]
    fn resolve_local_path() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(MINI_PDF).unwrap();
        let path = tmp.path().to_string_lossy().to_string();
        let doc = tokio_test::block_on(Document::resolve(&path, 5));
        // spawn_blocking needs a runtime; tokio_test provides a current-thread one.
        assert!(doc.is_ok());
    }
}
