//! Canvas and mask construction for the image-edit provider.
//!
//! Every canvas and mask produced here is `CANVAS_SIZE` square RGBA. In a
//! mask, alpha 0 marks pixels the provider may repaint and alpha 255 marks
//! pixels it must keep.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use studio_contracts::operations::{Background, MaskPolicy, NormalizerMode};

pub const CANVAS_SIZE: u32 = 1024;
pub const EXPAND_INNER_SIZE: u32 = 512;

const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const OPAQUE: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Where the resized original sits on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Size of the centered region a keep-center mask preserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepRegion {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct Canvas {
    pub image: RgbaImage,
    pub placement: Placement,
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).context("failed to decode uploaded image")
}

/// Largest size with the input's aspect ratio that fits inside the bounds.
pub fn contain_size(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (max_width, max_height);
    }
    let scale = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let fit = |side: u32, max: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max);
    (fit(width, max_width), fit(height, max_height))
}

pub fn centered_offset(inner: u32, outer: u32) -> u32 {
    outer.saturating_sub(inner) / 2
}

pub fn normalize(image: &DynamicImage, mode: NormalizerMode) -> Canvas {
    let (bound, background) = match mode {
        NormalizerMode::Contain(background) => (CANVAS_SIZE, background),
        NormalizerMode::ShrinkCenter => (EXPAND_INNER_SIZE, Background::Transparent),
    };
    let (width, height) = contain_size(image.width(), image.height(), bound, bound);
    let resized = image.resize_exact(width, height, RESAMPLE_FILTER).to_rgba8();

    let mut canvas = RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Rgba(background.rgba()));
    let placement = Placement {
        x: centered_offset(width, CANVAS_SIZE),
        y: centered_offset(height, CANVAS_SIZE),
        width,
        height,
    };
    // Copy, not blend: the original's own alpha survives on any background.
    imageops::replace(
        &mut canvas,
        &resized,
        i64::from(placement.x),
        i64::from(placement.y),
    );
    Canvas {
        image: canvas,
        placement,
    }
}

/// The kept area is the whole inner expand box, whatever the upload's aspect
/// ratio: the shrunk image counts as padded to `EXPAND_INNER_SIZE` square.
pub fn keep_region(policy: MaskPolicy) -> Option<KeepRegion> {
    match policy {
        MaskPolicy::FullEdit => None,
        MaskPolicy::KeepCenter => Some(KeepRegion {
            width: EXPAND_INNER_SIZE,
            height: EXPAND_INNER_SIZE,
        }),
    }
}

pub fn make_mask(keep: Option<KeepRegion>) -> RgbaImage {
    let mut mask = RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, TRANSPARENT);
    let Some(region) = keep else {
        return mask;
    };

    // A zero-sized side falls back to the inner expand box.
    let side = |value: u32| {
        if value == 0 {
            EXPAND_INNER_SIZE
        } else {
            value.min(CANVAS_SIZE)
        }
    };
    let width = side(region.width);
    let height = side(region.height);
    let x0 = centered_offset(width, CANVAS_SIZE);
    let y0 = centered_offset(height, CANVAS_SIZE);
    for y in y0..y0 + height {
        for x in x0..x0 + width {
            mask.put_pixel(x, y, OPAQUE);
        }
    }
    mask
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use image::{ColorType, Rgb, RgbImage};

    use super::*;

    fn fixture(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    fn all_modes() -> [NormalizerMode; 3] {
        [
            NormalizerMode::Contain(Background::Transparent),
            NormalizerMode::Contain(Background::White),
            NormalizerMode::ShrinkCenter,
        ]
    }

    #[test]
    fn contain_size_preserves_aspect_ratio() {
        assert_eq!(contain_size(2000, 500, 1024, 1024), (1024, 256));
        assert_eq!(contain_size(300, 1200, 1024, 1024), (256, 1024));
        assert_eq!(contain_size(100, 100, 1024, 1024), (1024, 1024));
        assert_eq!(contain_size(2000, 1000, 512, 512), (512, 256));
        // Extreme ratios never collapse a side to zero.
        assert_eq!(contain_size(10_000, 1, 1024, 1024), (1024, 1));
    }

    #[test]
    fn canvas_is_always_square_rgba() {
        for (width, height) in [(1, 1), (2000, 500), (300, 1200), (1024, 1024), (640, 480)] {
            let source = fixture(width, height, [10, 20, 30]);
            for mode in all_modes() {
                let canvas = normalize(&source, mode);
                assert_eq!(canvas.image.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
                let png = encode_png(&canvas.image).unwrap();
                let decoded = image::load_from_memory(&png).unwrap();
                assert_eq!(decoded.color(), ColorType::Rgba8, "{width}x{height} {mode:?}");
                assert_eq!(decoded.width(), CANVAS_SIZE);
                assert_eq!(decoded.height(), CANVAS_SIZE);
            }
        }
    }

    #[test]
    fn contain_pads_with_the_requested_background() {
        let source = fixture(2000, 500, [200, 10, 10]);

        let transparent = normalize(&source, NormalizerMode::Contain(Background::Transparent));
        assert_eq!(
            transparent.placement,
            Placement {
                x: 0,
                y: 384,
                width: 1024,
                height: 256
            }
        );
        assert_eq!(*transparent.image.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*transparent.image.get_pixel(512, 512), Rgba([200, 10, 10, 255]));

        let white = normalize(&source, NormalizerMode::Contain(Background::White));
        assert_eq!(*white.image.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(*white.image.get_pixel(1023, 1023), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn shrink_center_leaves_a_transparent_border() {
        let source = fixture(800, 800, [0, 128, 255]);
        let canvas = normalize(&source, NormalizerMode::ShrinkCenter);
        assert_eq!(
            canvas.placement,
            Placement {
                x: 256,
                y: 256,
                width: 512,
                height: 512
            }
        );
        assert_eq!(*canvas.image.get_pixel(255, 255), Rgba([0, 0, 0, 0]));
        assert_eq!(*canvas.image.get_pixel(256, 256), Rgba([0, 128, 255, 255]));
        assert_eq!(*canvas.image.get_pixel(767, 767), Rgba([0, 128, 255, 255]));
        assert_eq!(*canvas.image.get_pixel(768, 768), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn normalize_is_deterministic() {
        let mut source = RgbImage::new(333, 517);
        for (x, y, pixel) in source.enumerate_pixels_mut() {
            *pixel = Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
        }
        let source = DynamicImage::ImageRgb8(source);
        for mode in all_modes() {
            let first = normalize(&source, mode);
            let second = normalize(&source, mode);
            assert_eq!(first.image, second.image);
            assert_eq!(encode_png(&first.image).unwrap(), encode_png(&second.image).unwrap());
        }
    }

    #[test]
    fn full_edit_mask_is_fully_transparent() {
        let mask = make_mask(None);
        assert_eq!(mask.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
        assert!(mask.pixels().all(|pixel| pixel[3] == 0));
    }

    #[test]
    fn keep_center_mask_is_opaque_exactly_inside_the_region() {
        let mask = make_mask(Some(KeepRegion {
            width: 512,
            height: 256,
        }));
        let (x0, y0) = (256, 384);
        let mut opaque = 0u64;
        for (x, y, pixel) in mask.enumerate_pixels() {
            let inside = (x0..x0 + 512).contains(&x) && (y0..y0 + 256).contains(&y);
            let expected = if inside { 255 } else { 0 };
            assert_eq!(pixel[3], expected, "pixel ({x}, {y})");
            if inside {
                opaque += 1;
            }
        }
        assert_eq!(opaque, 512 * 256);
    }

    #[test]
    fn zero_sized_keep_region_falls_back_to_inner_box() {
        let mask = make_mask(Some(KeepRegion {
            width: 0,
            height: 0,
        }));
        let opaque = mask.pixels().filter(|pixel| pixel[3] == 255).count();
        assert_eq!(opaque, (EXPAND_INNER_SIZE * EXPAND_INNER_SIZE) as usize);
        assert_eq!(mask.get_pixel(256, 256)[3], 255);
        assert_eq!(mask.get_pixel(255, 256)[3], 0);
    }

    #[test]
    fn keep_region_follows_policy() {
        assert_eq!(keep_region(MaskPolicy::FullEdit), None);
        assert_eq!(
            keep_region(MaskPolicy::KeepCenter),
            Some(KeepRegion {
                width: EXPAND_INNER_SIZE,
                height: EXPAND_INNER_SIZE
            })
        );
    }

    #[test]
    fn wide_upload_keeps_the_full_inner_box() {
        let source = fixture(400, 200, [90, 90, 90]);
        let canvas = normalize(&source, NormalizerMode::ShrinkCenter);
        assert_eq!(
            (canvas.placement.width, canvas.placement.height),
            (512, 256)
        );
        let mask = make_mask(keep_region(MaskPolicy::KeepCenter));
        let opaque = mask.pixels().filter(|pixel| pixel[3] == 255).count();
        assert_eq!(opaque, 512 * 512);
        assert_eq!(mask.get_pixel(256, 256)[3], 255);
        assert_eq!(mask.get_pixel(767, 767)[3], 255);
        assert_eq!(mask.get_pixel(255, 256)[3], 0);
        assert_eq!(mask.get_pixel(512, 768)[3], 0);
    }

    #[test]
    fn decode_rejects_non_images() {
        assert!(decode_image(b"definitely not a png").is_err());
        let png = encode_png(&RgbaImage::from_pixel(4, 3, Rgba([1, 2, 3, 4]))).unwrap();
        let decoded = decode_image(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }
}
