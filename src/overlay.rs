//! Detection overlays: map boxes from raster pixels to display pixels.
//!
//! For each axis independently:
//!
//! ```text
//! scale  = displayed / intrinsic
//! origin = box origin × scale
//! extent = box extent × scale
//! ```
//!
//! Overlays are recomputed from the current raster size and display
//! geometry every time they are asked for; nothing caches a scale factor,
//! so a resize can never leave boxes drifting off the bitmap. A zero-sized
//! raster or an unknown/degenerate display yields no overlays at all.

use crate::detection::Detection;
use crate::geometry::{axis_scale, DisplayGeometry, PixelSize, Rect};
use image::{DynamicImage, Rgba, RgbaImage};
use serde::Serialize;

/// Stroke colour of overlay borders (`#f97316`).
pub const OVERLAY_COLOR: Rgba<u8> = Rgba([0xf9, 0x73, 0x16, 0xff]);
/// Border thickness in display pixels.
pub const OVERLAY_STROKE: u32 = 3;
/// Opacity of the tint filling each overlay.
pub const OVERLAY_FILL_ALPHA: f32 = 0.15;

/// One detection placed on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    /// Position of the detection in its result set.
    pub index: usize,
    pub label: String,
    pub rect: Rect,
}

/// Map every detection into display space.
///
/// Returns an empty list when the mapping is undefined (no raster size,
/// no display geometry, or either has a zero side).
pub fn map_detections(
    intrinsic: PixelSize,
    display: Option<DisplayGeometry>,
    detections: &[Detection],
) -> Vec<Overlay> {
    let Some(display) = display else {
        return Vec::new();
    };
    if display.is_degenerate() {
        return Vec::new();
    }
    let Some((sx, sy)) = axis_scale(intrinsic, display.width, display.height) else {
        return Vec::new();
    };
    detections
        .iter()
        .enumerate()
        .map(|(index, d)| Overlay {
            index,
            label: d.symbol_type.clone(),
            rect: d.bounding_box.scaled(sx, sy),
        })
        .collect()
}

/// Draw overlays onto a copy of `page` scaled to `display`.
///
/// The page is resized to the display geometry (rounded to whole pixels),
/// then each overlay gets a translucent fill and a solid border.
pub fn annotate(page: &DynamicImage, display: DisplayGeometry, overlays: &[Overlay]) -> RgbaImage {
    let w = display.width.round().max(1.0) as u32;
    let h = display.height.round().max(1.0) as u32;
    let mut canvas = if (w, h) == (page.width(), page.height()) {
        page.to_rgba8()
    } else {
        page.resize_exact(w, h, image::imageops::FilterType::Triangle)
            .to_rgba8()
    };

    let bounds = PixelSize::new(w, h);
    for overlay in overlays {
        let Some((x, y, rw, rh)) = overlay.rect.to_pixel_region(bounds) else {
            continue;
        };
        for py in y..y + rh {
            for px in x..x + rw {
                let on_border = px < x + OVERLAY_STROKE
                    || py < y + OVERLAY_STROKE
                    || px + OVERLAY_STROKE >= x + rw
                    || py + OVERLAY_STROKE >= y + rh;
                let pixel = canvas.get_pixel_mut(px, py);
                *pixel = if on_border {
                    OVERLAY_COLOR
                } else {
                    blend(*pixel, OVERLAY_COLOR, OVERLAY_FILL_ALPHA)
                };
            }
        }
    }
    canvas
}

fn blend(under: Rgba<u8>, over: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let mix = |a: u8, b: u8| (f32::from(a) * (1.0 - alpha) + f32::from(b) * alpha).round() as u8;
    Rgba([
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
        under[3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    fn stamp(x: f64, y: f64, w: f64, h: f64) -> Detection {
        Detection {
            symbol_type: "approval_stamp".into(),
            bounding_box: BoundingBox::new(x, y, w, h),
            engineer_name: None,
            license_number: None,
        }
    }

    fn rect(x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn half_size_display() {
        let dets = [stamp(10.0, 10.0, 50.0, 20.0), stamp(200.0, 300.0, 40.0, 15.0)];
        let overlays = map_detections(
            PixelSize::new(1000, 800),
            Some(DisplayGeometry::new(500.0, 400.0)),
            &dets,
        );
        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays[0].rect, rect(5.0, 5.0, 25.0, 10.0));
        assert_eq!(overlays[1].rect, rect(100.0, 150.0, 20.0, 7.5));
        assert_eq!(overlays[1].index, 1);
        assert_eq!(overlays[1].label, "approval_stamp");
    }

    #[test]
    fn axes_scale_independently() {
        let overlays = map_detections(
            PixelSize::new(100, 100),
            Some(DisplayGeometry::new(200.0, 50.0)),
            &[stamp(10.0, 10.0, 10.0, 10.0)],
        );
        assert_eq!(overlays[0].rect, rect(20.0, 5.0, 20.0, 5.0));
    }

    #[test]
    fn no_overlay_without_geometry() {
        let dets = [stamp(1.0, 1.0, 1.0, 1.0)];
        assert!(map_detections(PixelSize::new(0, 800), Some(DisplayGeometry::new(5.0, 5.0)), &dets).is_empty());
        assert!(map_detections(PixelSize::new(800, 0), Some(DisplayGeometry::new(5.0, 5.0)), &dets).is_empty());
        assert!(map_detections(PixelSize::new(10, 10), None, &dets).is_empty());
        assert!(map_detections(PixelSize::new(10, 10), Some(DisplayGeometry::new(0.0, 5.0)), &dets).is_empty());
    }

    #[test]
    fn annotate_draws_border_and_tint() {
        let page = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            200,
            100,
            Rgba([255, 255, 255, 255]),
        ));
        let display = DisplayGeometry::new(100.0, 50.0);
        let overlays = map_detections(
            PixelSize::new(200, 100),
            Some(display),
            &[stamp(20.0, 20.0, 80.0, 40.0)],
        );
        let out = annotate(&page, display, &overlays);
        assert_eq!(out.dimensions(), (100, 50));
        // Box lands at (10,10) size 40x20 on the half-size canvas.
        assert_eq!(*out.get_pixel(10, 10), OVERLAY_COLOR);
        assert_eq!(*out.get_pixel(49, 29), OVERLAY_COLOR);
        let inside = *out.get_pixel(30, 20);
        assert_ne!(inside, OVERLAY_COLOR);
        assert!(inside[2] < 240, "fill should tint the page");
        assert!(out.get_pixel(5, 5)[2] >= 250, "outside the box stays white");
    }

    #[test]
    fn annotate_skips_offscreen_boxes() {
        let page = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255])));
        let display = DisplayGeometry::new(10.0, 10.0);
        let overlays = vec![Overlay {
            index: 0,
            label: "approval_stamp".into(),
            rect: rect(50.0, 50.0, 5.0, 5.0),
        }];
        let out = annotate(&page, display, &overlays);
        assert!(out.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::geometry::BoundingBox;
    use proptest::prelude::*;

    proptest! {
        /// Property: mapped rect equals (x·W'/W, y·H'/H, w·W'/W, h·H'/H).
        #[test]
        fn mapping_matches_formula(
            w in 1u32..5000, h in 1u32..5000,
            dw in 1u32..5000, dh in 1u32..5000,
            fx in 0.0f64..=1.0, fy in 0.0f64..=1.0,
            fw in 0.0f64..=1.0, fh in 0.0f64..=1.0,
        ) {
            let (wf, hf) = (f64::from(w), f64::from(h));
            let (dwf, dhf) = (f64::from(dw), f64::from(dh));
            let bx = BoundingBox::new(fx * wf, fy * hf, fw * wf, fh * hf);
            let det = Detection {
                symbol_type: "approval_stamp".into(),
                bounding_box: bx,
                engineer_name: None,
                license_number: None,
            };
            let out = map_detections(
                PixelSize::new(w, h),
                Some(DisplayGeometry::new(dwf, dhf)),
                std::slice::from_ref(&det),
            );
            prop_assert_eq!(out.len(), 1);
            let r = out[0].rect;
            let tol = 1e-9 * dwf.max(dhf);
            prop_assert!((r.x - bx.x * dwf / wf).abs() <= tol);
            prop_assert!((r.y - bx.y * dhf / hf).abs() <= tol);
            prop_assert!((r.width - bx.width * dwf / wf).abs() <= tol);
            prop_assert!((r.height - bx.height * dhf / hf).abs() <= tol);
            prop_assert!(r.x.is_finite() && r.height.is_finite());
        }

        /// Property: a box covering the whole raster covers the whole display.
        #[test]
        fn full_page_box_maps_to_full_display(
            w in 1u32..5000, h in 1u32..5000,
            dw in 1u32..5000, dh in 1u32..5000,
        ) {
            let det = Detection {
                symbol_type: "approval_stamp".into(),
                bounding_box: BoundingBox::new(0.0, 0.0, f64::from(w), f64::from(h)),
                engineer_name: None,
                license_number: None,
            };
            let out = map_detections(
                PixelSize::new(w, h),
                Some(DisplayGeometry::new(f64::from(dw), f64::from(dh))),
                std::slice::from_ref(&det),
            );
            let r = out[0].rect;
            prop_assert_eq!(r.x, 0.0);
            prop_assert_eq!(r.y, 0.0);
            prop_assert!((r.width - f64::from(dw)).abs() < 1e-6);
            prop_assert!((r.height - f64::from(dh)).abs() < 1e-6);
        }

        /// Property: zero intrinsic size never produces an overlay.
        #[test]
        fn zero_intrinsic_never_maps(w in 0u32..10, dw in 1u32..5000) {
            let det = Detection {
                symbol_type: "approval_stamp".into(),
                bounding_box: BoundingBox::new(1.0, 1.0, 1.0, 1.0),
                engineer_name: None,
                license_number: None,
            };
            let out = map_detections(
                PixelSize::new(w, 0),
                Some(DisplayGeometry::new(f64::from(dw), f64::from(dw))),
                std::slice::from_ref(&det),
            );
            prop_assert!(out.is_empty());
        }
    }
}
