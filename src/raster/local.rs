//! Local rasterisation with pdfium.
//!
//! pdfium is a C++ library with thread-local state, so every call runs on a
//! `spawn_blocking` thread and binds its own `Pdfium` instance. Pages are
//! rendered at a constant upscale of the page's natural size (1.5× by
//! default) so stamp lettering stays legible; the bitmap's pixel size is
//! recorded as the raster's intrinsic size.
//!
//! The library is located through `PDFIUM_LIB_PATH` (full path to
//! `libpdfium.so` / `.dylib` / `pdfium.dll`) or, failing that, the system
//! library search path.

use super::encode::EncodedImage;
use super::{PageRaster, PageRasterizer};
use crate::config::ClientConfig;
use crate::document::Document;
use crate::error::StampError;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// Renders pages in-process.
#[derive(Debug, Clone)]
pub struct LocalRasterizer {
    scale: f32,
    password: Option<String>,
}

impl LocalRasterizer {
    pub fn new(scale: f32) -> Self {
        Self {
            scale,
            password: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            scale: config.render_scale,
            password: config.password.clone(),
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

#[async_trait]
impl PageRasterizer for LocalRasterizer {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn page_count(&self, document: &Document) -> Result<usize, StampError> {
        let bytes = document.shared_bytes();
        let name = document.name().to_string();
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || -> Result<usize, StampError> {
            let pdfium = bind_pdfium()?;
            let doc = open(&pdfium, &bytes, &name, password.as_deref())?;
            let total = doc.pages().len() as usize;
            info!("PDF '{}' loaded: {} pages", name, total);
            Ok(total)
        })
        .await
        .map_err(|e| StampError::Internal(format!("Page-count task panicked: {e}")))?
    }

    async fn rasterize(&self, document: &Document, page: usize) -> Result<PageRaster, StampError> {
        let bytes = document.shared_bytes();
        let name = document.name().to_string();
        let password = self.password.clone();
        let scale = self.scale;

        tokio::task::spawn_blocking(move || {
            render_page_blocking(&bytes, &name, password.as_deref(), page, scale)
        })
        .await
        .map_err(|e| StampError::Internal(format!("Render task panicked: {e}")))?
    }
}

/// Bind to pdfium from `PDFIUM_LIB_PATH`, else the system library.
pub fn bind_pdfium() -> Result<Pdfium, StampError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => {
            debug!("Binding pdfium from {}", path);
            Pdfium::bind_to_library(path.as_str())
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| StampError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn open<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
    name: &str,
    password: Option<&str>,
) -> Result<PdfDocument<'a>, StampError> {
    pdfium.load_pdf_from_byte_slice(bytes, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                StampError::WrongPassword {
                    name: name.to_string(),
                }
            } else {
                StampError::PasswordRequired {
                    name: name.to_string(),
                }
            }
        } else {
            StampError::CorruptPdf {
                name: name.to_string(),
                detail: err_str,
            }
        }
    })
}

fn render_page_blocking(
    bytes: &Arc<[u8]>,
    name: &str,
    password: Option<&str>,
    page: usize,
    scale: f32,
) -> Result<PageRaster, StampError> {
    let pdfium = bind_pdfium()?;
    let document = open(&pdfium, bytes, name, password)?;

    let pages = document.pages();
    let total = pages.len() as usize;
    if page >= total {
        return Err(StampError::PageOutOfRange { page, total });
    }

    let pdf_page = pages
        .get(page as u16)
        .map_err(|e| StampError::RasterisationFailed {
            page,
            detail: format!("{:?}", e),
        })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap = pdf_page
        .render_with_config(&render_config)
        .map_err(|e| StampError::RasterisationFailed {
            page,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    let (width, height) = (image.width(), image.height());
    debug!("Rendered page {} at {}× → {}x{} px", page, scale, width, height);

    let encoded = EncodedImage::png(&image).map_err(|e| StampError::RasterisationFailed {
        page,
        detail: format!("Image encoding failed: {e}"),
    })?;

    Ok(PageRaster {
        page,
        image: encoded,
        width,
        height,
    })
}
