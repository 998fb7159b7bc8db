//! Capture Layer
//!
//! Inputs handed to the detection pipeline by the outside world: label
//! bitmaps from a camera or file, and decoded product barcodes.

pub mod barcode;
pub mod frame;

pub use barcode::{Barcode, BarcodeError, BarcodeScanner, StdinBarcodeScanner};
pub use frame::{PixelLayout, RawImage};
