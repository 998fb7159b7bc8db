//! Bitmap data structures for captured label images

use std::path::Path;

/// Channel layout of a bitmap buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 3 bytes per pixel
    Rgb,
    /// 4 bytes per pixel, alpha last
    Rgba,
}

impl PixelLayout {
    /// Bytes per pixel for this layout
    pub fn channels(&self) -> usize {
        match self {
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }
}

/// A captured label image, owned by the caller until handed to the normalizer
#[derive(Debug, Clone)]
pub struct RawImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
    layout: PixelLayout,
}

impl RawImage {
    /// Wrap a pixel buffer. Dimensions are checked when the image is normalized.
    pub fn new(data: Vec<u8>, width: u32, height: u32, layout: PixelLayout) -> Self {
        Self {
            data,
            width,
            height,
            layout,
        }
    }

    /// Wrap an RGBA buffer
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self::new(data, width, height, PixelLayout::Rgba)
    }

    /// Wrap an RGB buffer
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self::new(data, width, height, PixelLayout::Rgb)
    }

    /// Decode an image file (PNG, JPEG, ...) into an RGBA bitmap
    pub fn open(path: &Path) -> Result<Self, image::ImageError> {
        let decoded = image::open(path)?.to_rgba8();
        let (width, height) = decoded.dimensions();
        Ok(Self::from_rgba(decoded.into_raw(), width, height))
    }

    /// Raw pixel bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Get image dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
