//! Remote rasterisation: the detection service renders the page.

use super::{PageRaster, PageRasterizer};
use crate::api::StampApiClient;
use crate::document::Document;
use crate::error::StampError;
use async_trait::async_trait;

/// Delegates page counting and rendering to `/get-info` and `/get-page-image`.
#[derive(Debug, Clone)]
pub struct RemoteRasterizer {
    api: StampApiClient,
}

impl RemoteRasterizer {
    pub fn new(api: StampApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PageRasterizer for RemoteRasterizer {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn page_count(&self, document: &Document) -> Result<usize, StampError> {
        self.api.page_count(document).await
    }

    async fn rasterize(&self, document: &Document, page: usize) -> Result<PageRaster, StampError> {
        self.api.page_image(document, page).await
    }
}
