//! # stamp-extractor
//!
//! Client for an engineering-stamp extraction service: render a page of a
//! PDF drawing, send the drawing to the service for stamp detection, and
//! overlay the returned boxes (with the engineer name and license number
//! read from each stamp) on the page as it is displayed.
//!
//! ## Flow
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Document    validate upload (type + %PDF magic), local file or URL
//!  ├─ 2. Rasterise   page count + page image, remotely or via pdfium
//!  ├─ 3. Extract     POST /extract-stamp for the current page
//!  ├─ 4. Map         boxes: raster pixels → display pixels, per axis
//!  └─ 5. Render      overlays, per-stamp thumbnails, results panel
//! ```
//!
//! Every request is tagged with the session generation and page it was
//! issued for; results that come back after the user moved on are dropped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stamp_extractor::{ClientConfig, Document, ResultsPanel, Workbench};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .api_base("http://127.0.0.1:8000")
//!         .build()?;
//!     let workbench = Workbench::from_config(&config)?;
//!     workbench.open(Document::from_path("drawing.pdf")?).await?;
//!     workbench.extract().await?;
//!     if let Some(panel) = workbench.with_session(ResultsPanel::from_session) {
//!         println!("{panel}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `stampx` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! stamp-extractor = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod detection;
pub mod document;
pub mod error;
pub mod geometry;
pub mod observer;
pub mod overlay;
pub mod raster;
pub mod results;
pub mod session;
pub mod thumbnail;
pub mod workbench;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{DetectionService, StampApiClient};
pub use config::{ClientConfig, ClientConfigBuilder, PageSelection, RasterStrategy};
pub use detection::{Detection, DetectionSet, ExtractionResponse};
pub use document::Document;
pub use error::{ErrorKind, StampError};
pub use geometry::{BoundingBox, DisplayGeometry, PixelSize, Rect};
pub use observer::{NoopObserver, Observer, SessionObserver};
pub use overlay::{annotate, map_detections, Overlay};
pub use raster::{LocalRasterizer, PageRaster, PageRasterizer, RemoteRasterizer};
pub use results::ResultsPanel;
pub use session::{Completion, Phase, Session, SessionError, Ticket};
pub use thumbnail::Thumbnail;
pub use workbench::{Outcome, Snapshot, Workbench};
