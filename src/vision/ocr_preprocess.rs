//! Image normalization for OCR
//!
//! Upscales a label image, applies a fixed contrast/brightness curve and
//! converts it to grayscale so the OCR engine sees cleaner glyph edges.
//! The transform is a pure function of the input bitmap and settings.

use crate::capture::{PixelLayout, RawImage};
use crate::config::NormalizeSettings;
use crate::vision::NormalizedImage;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel, Rgb, Rgba};
use thiserror::Error;
use tracing::debug;

/// Upper bound on the normalized buffer size (bytes)
const MAX_OUTPUT_BYTES: u64 = 1 << 30;

/// Precondition failures. These are programmer errors and are never
/// papered over with default values.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("image has zero dimension ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("pixel buffer is {actual} bytes, expected {expected} for {width}x{height}")]
    BufferMismatch {
        width: u32,
        height: u32,
        expected: u64,
        actual: usize,
    },
    #[error("scale factor must be finite and >= 1, got {0}")]
    InvalidScale(f32),
    #[error("normalized image would be {width}x{height}, which is too large")]
    TooLarge { width: u64, height: u64 },
}

/// Normalize with all settings taken from config
pub fn normalize(image: &RawImage, settings: &NormalizeSettings) -> Result<NormalizedImage, NormalizeError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(NormalizeError::EmptyImage { width, height });
    }

    let channels = image.layout().channels();
    let expected = width as u64 * height as u64 * channels as u64;
    if image.data().len() as u64 != expected {
        return Err(NormalizeError::BufferMismatch {
            width,
            height,
            expected,
            actual: image.data().len(),
        });
    }

    let scale = settings.scale;
    if !scale.is_finite() || scale < 1.0 {
        return Err(NormalizeError::InvalidScale(scale));
    }

    let (new_width, new_height) = scaled_dimensions(width, height, scale, channels, MAX_OUTPUT_BYTES)?;

    debug!(
        "Normalizing {}x{} -> {}x{} (contrast={}, brightness={}, sharpen={})",
        width, height, new_width, new_height, settings.contrast, settings.brightness, settings.sharpen
    );

    // Upscale first so the later filters work at the final resolution
    let mut result = if new_width == width && new_height == height {
        image.data().to_vec()
    } else {
        let upscaled = match image.layout() {
            PixelLayout::Rgba => apply_upscale::<Rgba<u8>>(image.data(), width, height, new_width, new_height),
            PixelLayout::Rgb => apply_upscale::<Rgb<u8>>(image.data(), width, height, new_width, new_height),
        };
        upscaled.ok_or(NormalizeError::BufferMismatch {
            width,
            height,
            expected,
            actual: image.data().len(),
        })?
    };

    if (settings.contrast - 1.0).abs() > f32::EPSILON || (settings.brightness - 1.0).abs() > f32::EPSILON {
        apply_contrast(&mut result, channels, settings.contrast, settings.brightness);
    }

    if settings.sharpen > 0.01 {
        result = apply_sharpen(&result, new_width, new_height, channels, settings.sharpen);
    }

    apply_grayscale(&mut result, channels);

    Ok(NormalizedImage::new(result, new_width, new_height, image.layout()))
}

/// Normalize with an explicit scale factor and the default tone curve
pub fn normalize_with_scale(image: &RawImage, scale: f32) -> Result<NormalizedImage, NormalizeError> {
    let settings = NormalizeSettings {
        scale,
        ..NormalizeSettings::default()
    };
    normalize(image, &settings)
}

/// floor(dimension * scale) on both axes. The size limit only applies to
/// images that actually grow.
fn scaled_dimensions(
    width: u32,
    height: u32,
    scale: f32,
    channels: usize,
    max_bytes: u64,
) -> Result<(u32, u32), NormalizeError> {
    let new_width = (width as f64 * scale as f64).floor() as u64;
    let new_height = (height as f64 * scale as f64).floor() as u64;
    if new_width == width as u64 && new_height == height as u64 {
        return Ok((width, height));
    }

    let bytes = new_width
        .checked_mul(new_height)
        .and_then(|px| px.checked_mul(channels as u64));
    match bytes {
        Some(b) if b <= max_bytes => Ok((new_width as u32, new_height as u32)),
        _ => Err(NormalizeError::TooLarge {
            width: new_width,
            height: new_height,
        }),
    }
}

/// Contrast around mid-gray, then a brightness multiplier, color channels
/// only. Each step clamps to 0..=255, so `contrast(150%) brightness(90%)`
/// maps white to 229.
fn apply_contrast(data: &mut [u8], channels: usize, factor: f32, brightness: f32) {
    for chunk in data.chunks_exact_mut(channels) {
        for value in chunk.iter_mut().take(3) {
            let contrasted = ((*value as f32 - 127.5) * factor + 127.5).clamp(0.0, 255.0);
            *value = (contrasted * brightness).clamp(0.0, 255.0) as u8;
        }
    }
}

/// Luminance grayscale written to all three color channels, alpha untouched
fn apply_grayscale(data: &mut [u8], channels: usize) {
    for chunk in data.chunks_exact_mut(channels) {
        let gray = (0.299 * chunk[0] as f32 + 0.587 * chunk[1] as f32 + 0.114 * chunk[2] as f32) as u8;
        chunk[0] = gray;
        chunk[1] = gray;
        chunk[2] = gray;
    }
}

/// 3x3 unsharp kernel. Edge pixels are copied unchanged.
fn apply_sharpen(data: &[u8], width: u32, height: u32, channels: usize, strength: f32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let mut result = data.to_vec();
    if w < 3 || h < 3 {
        return result;
    }

    let center_weight = 1.0 + 4.0 * strength;
    let neighbor_weight = -strength;

    for y in 1..(h - 1) {
        for x in 1..(w - 1) {
            let idx = (y * w + x) * channels;

            for c in 0..3 {
                let top = data[((y - 1) * w + x) * channels + c] as f32;
                let bottom = data[((y + 1) * w + x) * channels + c] as f32;
                let left = data[(y * w + x - 1) * channels + c] as f32;
                let right = data[(y * w + x + 1) * channels + c] as f32;
                let center = data[idx + c] as f32;

                let sharpened =
                    center * center_weight + (top + bottom + left + right) * neighbor_weight;

                result[idx + c] = sharpened.clamp(0.0, 255.0) as u8;
            }
        }
    }

    result
}

/// Bilinear (triangle filter) resize onto a `new_width` x `new_height` canvas.
/// `None` if the buffer does not hold `width` x `height` pixels.
fn apply_upscale<P>(data: &[u8], width: u32, height: u32, new_width: u32, new_height: u32) -> Option<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let source: ImageBuffer<P, &[u8]> = ImageBuffer::from_raw(width, height, data)?;
    Some(imageops::resize(&source, new_width, new_height, FilterType::Triangle).into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgba(width: u32, height: u32, px: [u8; 4]) -> RawImage {
        let data = px.repeat((width * height) as usize);
        RawImage::from_rgba(data, width, height)
    }

    /// Resize and gray only, no tone curve
    fn plain(scale: f32) -> NormalizeSettings {
        NormalizeSettings {
            scale,
            contrast: 1.0,
            brightness: 1.0,
            sharpen: 0.0,
        }
    }

    #[test]
    fn test_contrast_increase() {
        let mut data = vec![100, 128, 200, 255];
        apply_contrast(&mut data, 4, 2.0, 1.0);
        // 100: (100-127.5)*2+127.5 = 72.5
        // 200: (200-127.5)*2+127.5 = 272.5 -> clamped to 255
        assert_eq!(data[0], 72);
        assert_eq!(data[1], 128);
        assert_eq!(data[2], 255);
        assert_eq!(data[3], 255);
    }

    #[test]
    fn test_brightness_multiplier() {
        let mut data = vec![10, 250, 128];
        apply_contrast(&mut data, 3, 1.0, 1.2);
        // 250*1.2 = 300 -> 255, 128*1.2 = 153.6
        assert_eq!(data, vec![12, 255, 153]);
    }

    #[test]
    fn test_default_tone_curve() {
        // contrast(150%) then brightness(90%), each clamped
        let image = RawImage::from_rgba(
            vec![100, 100, 100, 255, 255, 255, 255, 255, 250, 250, 250, 255, 0, 0, 0, 255],
            4,
            1,
        );
        let settings = NormalizeSettings {
            scale: 1.0,
            ..NormalizeSettings::default()
        };
        let result = normalize(&image, &settings).unwrap();
        assert_eq!(
            result.data(),
            &[77, 77, 77, 255, 229, 229, 229, 255, 229, 229, 229, 255, 0, 0, 0, 255]
        );
    }

    #[test]
    fn test_grayscale() {
        let mut data = vec![255, 0, 0, 77]; // Red pixel
        apply_grayscale(&mut data, 4);
        // Gray = 0.299*255 = 76.245 ≈ 76
        assert_eq!(data, vec![76, 76, 76, 77]);
    }

    #[test]
    fn test_grayscale_rgb_layout() {
        let mut data = vec![0, 255, 0, 0, 0, 255];
        apply_grayscale(&mut data, 3);
        assert_eq!(data, vec![149, 149, 149, 29, 29, 29]);
    }

    #[test]
    fn test_normalize_dimensions_floor() {
        let image = solid_rgba(3, 5, [10, 20, 30, 255]);
        let result = normalize(&image, &plain(2.5)).unwrap();
        // floor(3*2.5)=7, floor(5*2.5)=12
        assert_eq!(result.dimensions(), (7, 12));
        assert_eq!(result.data().len(), 7 * 12 * 4);
    }

    #[test]
    fn test_normalize_output_is_gray_with_alpha_kept() {
        let data = vec![
            255, 0, 0, 10, //
            0, 255, 0, 20, //
            0, 0, 255, 30, //
            255, 255, 0, 40,
        ];
        let image = RawImage::from_rgba(data, 2, 2);
        let result = normalize(&image, &plain(3.0)).unwrap();

        for px in result.data().chunks_exact(4) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
        // Top-left source pixel maps exactly onto (0, 0)
        assert_eq!(&result.data()[..4], &[76, 76, 76, 10]);
    }

    #[test]
    fn test_normalize_scale_one_keeps_size() {
        let image = RawImage::from_rgb(vec![200, 100, 50], 1, 1);
        let result = normalize(&image, &plain(1.0)).unwrap();
        assert_eq!(result.dimensions(), (1, 1));
        assert_eq!(result.layout(), PixelLayout::Rgb);
        // 0.299*200 + 0.587*100 + 0.114*50 = 124.2
        assert_eq!(result.data(), &[124, 124, 124]);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let data: Vec<u8> = (0..(7 * 4 * 4)).map(|i| (i * 37 % 256) as u8).collect();
        let image = RawImage::from_rgba(data, 7, 4);
        let settings = NormalizeSettings {
            scale: 2.7,
            contrast: 1.4,
            brightness: 0.95,
            sharpen: 0.5,
        };
        let a = normalize(&image, &settings).unwrap();
        let b = normalize(&image, &settings).unwrap();
        assert_eq!(a.dimensions(), b.dimensions());
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_normalize_does_not_touch_input() {
        let image = solid_rgba(2, 2, [255, 0, 0, 255]);
        let before = image.data().to_vec();
        let _ = normalize_with_scale(&image, 2.0).unwrap();
        assert_eq!(image.data(), before.as_slice());
    }

    #[test]
    fn test_normalize_rejects_empty_image() {
        let image = RawImage::from_rgba(vec![], 0, 4);
        assert_eq!(
            normalize_with_scale(&image, 2.0).unwrap_err(),
            NormalizeError::EmptyImage { width: 0, height: 4 }
        );
    }

    #[test]
    fn test_normalize_rejects_bad_scale() {
        let image = solid_rgba(1, 1, [0, 0, 0, 255]);
        for scale in [0.0, -2.0, 0.5, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                normalize_with_scale(&image, scale),
                Err(NormalizeError::InvalidScale(_))
            ));
        }
    }

    #[test]
    fn test_normalize_rejects_buffer_mismatch() {
        let image = RawImage::from_rgba(vec![0; 7], 2, 1);
        assert!(matches!(
            normalize_with_scale(&image, 2.0),
            Err(NormalizeError::BufferMismatch { expected: 8, actual: 7, .. })
        ));
    }

    #[test]
    fn test_normalize_rejects_huge_output() {
        let image = solid_rgba(1, 1, [0, 0, 0, 255]);
        assert!(matches!(
            normalize_with_scale(&image, 1.0e6),
            Err(NormalizeError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_sharpen_flat_image_unchanged() {
        let data = vec![100u8; 4 * 4 * 4];
        let result = apply_sharpen(&data, 4, 4, 4, 1.0);
        assert_eq!(result, data);
    }

    #[test]
    fn test_size_limit_only_applies_when_growing() {
        // 100x100 RGBA is 40000 bytes, over a 1000 byte limit
        assert_eq!(scaled_dimensions(100, 100, 1.0, 4, 1000), Ok((100, 100)));
        assert_eq!(
            scaled_dimensions(100, 100, 2.0, 4, 1000),
            Err(NormalizeError::TooLarge { width: 200, height: 200 })
        );
        assert_eq!(scaled_dimensions(100, 100, 2.0, 4, MAX_OUTPUT_BYTES), Ok((200, 200)));
    }

    #[test]
    fn test_upscale_2x() {
        let data = vec![
            255, 0, 0, 255, //
            0, 255, 0, 255, //
            0, 0, 255, 255, //
            255, 255, 0, 200,
        ];
        let result = apply_upscale::<Rgba<u8>>(&data, 2, 2, 4, 4).unwrap();
        assert_eq!(result.len(), 4 * 4 * 4);
        // Corners land on the source corners
        assert_eq!(&result[0..4], &[255, 0, 0, 255]);
        assert_eq!(&result[60..64], &[255, 255, 0, 200]);
        // Between red and green the two blend
        assert!(result[4] > 0 && result[4] < 255);
        assert!(result[5] > 0 && result[5] < 255);
    }

    #[test]
    fn test_upscale_solid_color_stays_solid() {
        let data = [40u8, 90, 160].repeat(3 * 2);
        let result = apply_upscale::<Rgb<u8>>(&data, 3, 2, 7, 5).unwrap();
        assert_eq!(result, [40u8, 90, 160].repeat(7 * 5));
    }

    #[test]
    fn test_upscale_rejects_short_buffer() {
        assert!(apply_upscale::<Rgb<u8>>(&[0; 5], 2, 1, 4, 2).is_none());
    }
}
