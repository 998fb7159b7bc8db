//! allergen-scan - allergen detection for food labels
//!
//! Reads ingredient text from a label photo (via OCR) or a barcode lookup
//! and scans it for allergen keywords, tolerating OCR noise and spelling
//! variants through bounded edit-distance matching.

pub mod analysis;
pub mod capture;
pub mod config;
pub mod lookup;
pub mod pipeline;
pub mod storage;
pub mod vision;

pub use analysis::{AllergenCategory, Dictionary, Finding, FindingSet, FuzzyMatcher};
pub use capture::{Barcode, RawImage};
pub use config::AppConfig;
pub use pipeline::{Detection, DetectionPipeline, PipelineError, TextSource};
