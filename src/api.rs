//! HTTP client for the stamp-detection service.
//!
//! Every endpoint takes a multipart form with the PDF as `file` and, where a
//! page is involved, the 0-indexed `page` as a text field:
//!
//! | Endpoint               | Response                                    |
//! |------------------------|---------------------------------------------|
//! | `POST /get-info`       | `{ "page_count": n }`                       |
//! | `POST /get-page-image` | `{ "image": "data:…", "width", "height" }`  |
//! | `POST /extract-stamp`  | see [`crate::detection::ExtractionResponse`] |
//!
//! Non-2xx answers are failures. The service reports errors FastAPI-style
//! as `{ "detail": "..." }`; that text is carried into the error.

use crate::config::ClientConfig;
use crate::detection::DetectionSet;
use crate::document::{Document, PDF_MIME};
use crate::error::StampError;
use crate::raster::encode::EncodedImage;
use crate::raster::PageRaster;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const GET_INFO: &str = "/get-info";
pub const GET_PAGE_IMAGE: &str = "/get-page-image";
pub const EXTRACT_STAMP: &str = "/extract-stamp";

/// Runs stamp detection on one page of a document.
#[async_trait]
pub trait DetectionService: Send + Sync {
    async fn extract(&self, document: &Document, page: usize) -> Result<DetectionSet, StampError>;
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    page_count: usize,
}

#[derive(Debug, Deserialize)]
struct PageImageResponse {
    image: String,
    width: u32,
    height: u32,
}

/// Why a request to the service did not produce a usable body.
#[derive(Debug)]
enum ApiFailure {
    Timeout(u64),
    Transport(String),
    Status { status: u16, detail: String },
    Decode(String),
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFailure::Timeout(secs) => write!(f, "request timed out after {secs}s"),
            ApiFailure::Transport(e) => write!(f, "{e}"),
            ApiFailure::Status { status, detail } => write!(f, "HTTP {status}: {detail}"),
            ApiFailure::Decode(e) => write!(f, "unexpected response body: {e}"),
        }
    }
}

/// Client for the detection service.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct StampApiClient {
    http: reqwest::Client,
    api_base: String,
    timeout_secs: u64,
}

impl StampApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, StampError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| StampError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// `POST /get-info`: number of pages in the document.
    pub async fn page_count(&self, document: &Document) -> Result<usize, StampError> {
        let form = Form::new().part("file", file_part(document).map_err(info_err)?);
        let body = self.post_form(GET_INFO, form).await.map_err(info_err)?;
        let info: InfoResponse = serde_json::from_value(body)
            .map_err(|e| info_err(ApiFailure::Decode(e.to_string())))?;
        info!("'{}' has {} pages", document.name(), info.page_count);
        Ok(info.page_count)
    }

    /// `POST /get-page-image`: the service's rendering of one page.
    pub async fn page_image(
        &self,
        document: &Document,
        page: usize,
    ) -> Result<PageRaster, StampError> {
        let raster_err = |f: ApiFailure| StampError::RasterisationFailed {
            page,
            detail: f.to_string(),
        };
        let form = page_form(document, page).map_err(raster_err)?;
        let body = self.post_form(GET_PAGE_IMAGE, form).await.map_err(raster_err)?;
        let resp: PageImageResponse = serde_json::from_value(body)
            .map_err(|e| raster_err(ApiFailure::Decode(e.to_string())))?;
        let image = EncodedImage::from_data_uri(&resp.image)
            .map_err(|e| raster_err(ApiFailure::Decode(e.to_string())))?;
        debug!(
            "Page {} image: {}x{} {} ({} bytes)",
            page,
            resp.width,
            resp.height,
            image.mime_type,
            image.bytes.len()
        );
        Ok(PageRaster {
            page,
            image,
            width: resp.width,
            height: resp.height,
        })
    }

    async fn post_form(&self, path: &str, form: Form) -> Result<serde_json::Value, ApiFailure> {
        let url = format!("{}{}", self.api_base, path);
        let start = Instant::now();
        debug!("POST {}", url);

        let response = self.http.post(&url).multipart(form).send().await.map_err(|e| {
            if e.is_timeout() {
                ApiFailure::Timeout(self.timeout_secs)
            } else {
                ApiFailure::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiFailure::Transport(e.to_string()))?;
        debug!("POST {} → {} in {:?}", path, status, start.elapsed());

        if !status.is_success() {
            return Err(ApiFailure::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| ApiFailure::Decode(e.to_string()))
    }
}

#[async_trait]
impl DetectionService for StampApiClient {
    /// `POST /extract-stamp`.
    async fn extract(&self, document: &Document, page: usize) -> Result<DetectionSet, StampError> {
        let failed = |f: ApiFailure| match f {
            ApiFailure::Status { status, detail } => StampError::ExtractionRejected {
                page,
                status,
                detail,
            },
            other => StampError::ExtractionFailed {
                page,
                detail: other.to_string(),
            },
        };
        let form = page_form(document, page).map_err(failed)?;
        let body = self.post_form(EXTRACT_STAMP, form).await.map_err(failed)?;
        let set = DetectionSet::from_json(body)
            .map_err(|e| failed(ApiFailure::Decode(e.to_string())))?;
        if set.page != page {
            return Err(StampError::ExtractionFailed {
                page,
                detail: format!("service answered for page {}", set.page),
            });
        }
        debug!("Page {}: service returned {} stamp(s)", page, set.len());
        Ok(set)
    }
}

fn info_err(f: ApiFailure) -> StampError {
    StampError::InfoFetchFailed {
        detail: f.to_string(),
    }
}

fn file_part(document: &Document) -> Result<Part, ApiFailure> {
    Part::bytes(document.bytes().to_vec())
        .file_name(document.name().to_string())
        .mime_str(PDF_MIME)
        .map_err(|e| ApiFailure::Transport(e.to_string()))
}

fn page_form(document: &Document, page: usize) -> Result<Form, ApiFailure> {
    Ok(Form::new()
        .part("file", file_part(document)?)
        .text("page", page.to_string()))
}

/// Pull FastAPI's `detail` out of an error body, falling back to the body itself.
fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct Detail {
        detail: serde_json::Value,
    }
    match serde_json::from_str::<Detail>(body) {
        Ok(Detail {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(Detail { detail }) => detail.to_string(),
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.chars().count() > 200 {
                let cut: String = trimmed.chars().take(199).collect();
                format!("{cut}\u{2026}")
            } else {
                trimmed.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_detail_prefers_fastapi_detail() {
        assert_eq!(
            error_detail(r#"{"detail":"Invalid page number"}"#),
            "Invalid page number"
        );
        assert_eq!(
            error_detail(r#"{"detail":[{"loc":["body","page"]}]}"#),
            r#"[{"loc":["body","page"]}]"#
        );
        assert_eq!(error_detail("  Internal Server Error \n"), "Internal Server Error");
    }

    #[test]
    fn error_detail_truncates_long_bodies() {
        let body = "x".repeat(500);
        let detail = error_detail(&body);
        assert_eq!(detail.chars().count(), 200);
        assert!(detail.ends_with('\u{2026}'));
    }

    #[test]
    fn failure_display() {
        assert_eq!(
            ApiFailure::Status {
                status: 400,
                detail: "Invalid page number".into()
            }
            .to_string(),
            "HTTP 400: Invalid page number"
        );
        assert!(ApiFailure::Timeout(30).to_string().contains("30s"));
    }

    #[test]
    fn client_uses_config_base() {
        let config = ClientConfig::builder()
            .api_base("http://stamps.local:9000/")
            .build()
            .unwrap();
        let client = StampApiClient::new(&config).unwrap();
        assert_eq!(client.api_base(), "http://stamps.local:9000");
    }
}
