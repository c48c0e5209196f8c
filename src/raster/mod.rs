//! Page rasterisation: turn one page of a [`Document`] into a bitmap.
//!
//! Two interchangeable strategies implement [`PageRasterizer`]:
//!
//! ```text
//!            ┌── remote ──▶ POST /get-info, POST /get-page-image
//! Document ──┤
//!            └── local  ──▶ pdfium (spawn_blocking, constant upscale)
//! ```
//!
//! Everything downstream (overlay mapping, thumbnails, the session) only
//! sees the resulting [`PageRaster`] and is strategy-agnostic.

pub mod encode;
pub mod local;
pub mod remote;

use crate::document::Document;
use crate::error::StampError;
use crate::geometry::PixelSize;
use async_trait::async_trait;
use encode::EncodedImage;
use serde::Serialize;

pub use local::LocalRasterizer;
pub use remote::RemoteRasterizer;

/// A rendered bitmap for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRaster {
    /// 0-indexed page this bitmap shows.
    pub page: usize,
    /// Encoded bitmap.
    #[serde(skip)]
    pub image: EncodedImage,
    /// Intrinsic width: the pixel space detections are expressed in.
    pub width: u32,
    /// Intrinsic height.
    pub height: u32,
}

impl PageRaster {
    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }
}

/// Produces page bitmaps for a document.
///
/// Implementations must not mutate the document and must be safe to share
/// between concurrently running requests.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Number of pages in the document.
    async fn page_count(&self, document: &Document) -> Result<usize, StampError>;

    /// Render the 0-indexed `page`.
    async fn rasterize(&self, document: &Document, page: usize) -> Result<PageRaster, StampError>;
}
