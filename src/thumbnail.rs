//! Per-detection thumbnails cropped from the page bitmap.
//!
//! Detection boxes are in the raster's intrinsic pixel space, but the
//! decoded bitmap may have a different natural size, so each box is scaled
//! by `natural / intrinsic` before cropping. The crop is clamped to the
//! bitmap and re-encoded as a standalone PNG. Thumbnails come out in
//! detection order; a box that falls entirely outside the bitmap is skipped
//! without affecting the others.

use crate::detection::Detection;
use crate::geometry::{axis_scale, PixelSize};
use crate::raster::encode::{EncodeError, EncodedImage};
use crate::raster::PageRaster;
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, warn};

/// A cropped, encoded stamp image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thumbnail {
    /// Position of the source detection in its result set.
    pub index: usize,
    #[serde(skip)]
    pub image: EncodedImage,
    pub width: u32,
    pub height: u32,
}

/// Crop one thumbnail per detection from `bitmap`.
///
/// `intrinsic` is the size the detections were expressed against.
pub fn crop_all(
    bitmap: &DynamicImage,
    intrinsic: PixelSize,
    detections: &[Detection],
) -> Result<Vec<Thumbnail>, EncodeError> {
    let natural = PixelSize::new(bitmap.width(), bitmap.height());
    let Some((sx, sy)) = axis_scale(intrinsic, f64::from(natural.width), f64::from(natural.height))
    else {
        warn!("Cannot crop thumbnails: raster has no recorded size");
        return Ok(Vec::new());
    };
    if (sx, sy) != (1.0, 1.0) {
        debug!(
            "Bitmap is {}x{} but detections are against {}x{}; scaling crops by ({:.3}, {:.3})",
            natural.width, natural.height, intrinsic.width, intrinsic.height, sx, sy
        );
    }

    let mut thumbnails = Vec::with_capacity(detections.len());
    for (index, detection) in detections.iter().enumerate() {
        let rect = detection.bounding_box.scaled(sx, sy);
        let Some((x, y, w, h)) = rect.to_pixel_region(natural) else {
            warn!("Detection {} lies outside the page bitmap; no thumbnail", index);
            continue;
        };
        let crop = bitmap.crop_imm(x, y, w, h);
        thumbnails.push(Thumbnail {
            index,
            image: EncodedImage::png(&crop)?,
            width: w,
            height: h,
        });
    }
    Ok(thumbnails)
}

/// Decode `raster` and crop a thumbnail per detection.
///
/// CPU-bound; async callers run it on `spawn_blocking`. Failures are logged
/// and give an empty list, since thumbnails are never required.
pub fn for_raster(raster: &PageRaster, detections: &[Detection]) -> Vec<Thumbnail> {
    if detections.is_empty() {
        return Vec::new();
    }
    let bitmap = match raster.image.decode() {
        Ok(b) => b,
        Err(e) => {
            warn!("Cannot decode page image for thumbnails: {}", e);
            return Vec::new();
        }
    };
    crop_all(&bitmap, raster.size(), detections).unwrap_or_else(|e| {
        warn!("Thumbnail encoding failed: {}", e);
        Vec::new()
    })
}
