//! Configuration types for the stamp-extraction client.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. The same struct selects the rasterisation
//! strategy, points the client at the detection service and tunes the local
//! renderer.

use crate::error::StampError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default base URL of the detection service.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Default upscale factor for local rendering.
pub const DEFAULT_RENDER_SCALE: f32 = 1.5;

/// Configuration for a stamp-extraction client.
///
/// # Example
/// ```rust
/// use stamp_extractor::{ClientConfig, RasterStrategy};
///
/// let config = ClientConfig::builder()
///     .api_base("http://localhost:8000/")
///     .strategy(RasterStrategy::Local)
///     .render_scale(2.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.api_base, "http://localhost:8000");
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the detection service, without a trailing slash.
    /// Default: `http://127.0.0.1:8000`.
    pub api_base: String,

    /// Which rasteriser produces page images. Default: [`RasterStrategy::Remote`].
    pub strategy: RasterStrategy,

    /// Upscale factor applied by the local renderer. Range: 0.25–8.0. Default: 1.5.
    ///
    /// A constant upscale makes the small lettering inside stamps legible in
    /// the preview and in the cropped thumbnails. The remote strategy ignores
    /// it; the service picks its own resolution.
    pub render_scale: f32,

    /// Per-request timeout for the detection service in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents (local strategy only).
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Crop a thumbnail for every detection after a successful extraction.
    /// Default: true.
    pub thumbnails: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            strategy: RasterStrategy::default(),
            render_scale: DEFAULT_RENDER_SCALE,
            request_timeout_secs: 60,
            download_timeout_secs: 120,
            password: None,
            thumbnails: true,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base", &self.api_base)
            .field("strategy", &self.strategy)
            .field("render_scale", &self.render_scale)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("thumbnails", &self.thumbnails)
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn strategy(mut self, strategy: RasterStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.25, 8.0);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn thumbnails(mut self, v: bool) -> Self {
        self.config.thumbnails = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, StampError> {
        let c = &self.config;
        if !c.api_base.starts_with("http://") && !c.api_base.starts_with("https://") {
            return Err(StampError::InvalidConfig(format!(
                "API base must be an http(s) URL, got '{}'",
                c.api_base
            )));
        }
        if !c.render_scale.is_finite() || c.render_scale <= 0.0 {
            return Err(StampError::InvalidConfig(format!(
                "Render scale must be positive, got {}",
                c.render_scale
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How page images are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterStrategy {
    /// Ask the detection service (`/get-info`, `/get-page-image`). (default)
    #[default]
    Remote,
    /// Render in-process with pdfium.
    Local,
}

/// Specifies which pages a batch run visits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page.
    All,
    /// A single page (1-indexed). The default is the first page.
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
    /// First page only.
    #[default]
    First,
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::First => (0..total_pages.min(1)).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
