//! Vision/OCR Layer
//!
//! Prepares label images for text recognition and talks to the OCR engine.
//! The engine itself is an external collaborator behind [`OcrEngine`].

pub mod ocr;
pub mod ocr_preprocess;

pub use ocr::{OcrEngine, OcrError, TesseractOcr};
pub use ocr_preprocess::{normalize, normalize_with_scale, NormalizeError};

use crate::capture::PixelLayout;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;

/// Output of the normalizer: upscaled, grayscale, same channel layout as the input
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
    layout: PixelLayout,
}

impl NormalizedImage {
    pub(crate) fn new(data: Vec<u8>, width: u32, height: u32, layout: PixelLayout) -> Self {
        Self {
            data,
            width,
            height,
            layout,
        }
    }

    /// Pixel bytes; R, G and B are equal for every pixel
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Get image dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Encode as PNG for handoff to an OCR engine
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let image = match self.layout {
            PixelLayout::Rgba => RgbaImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgba8),
            PixelLayout::Rgb => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8),
        };
        let image = image.ok_or_else(|| {
            image::ImageError::Parameter(image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ))
        })?;

        let mut buffer = Vec::new();
        image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }
}
