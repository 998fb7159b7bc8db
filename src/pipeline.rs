//! Detection pipeline
//!
//! Image path: normalize -> OCR engine -> tokenize -> match.
//! Barcode path: product lookup -> tokenize -> match.
//!
//! The pipeline holds only immutable configuration, so one instance can
//! serve any number of concurrent runs. Collaborator failures degrade to an
//! empty finding set; only invalid input is returned as an error.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analysis::{tokenize, Dictionary, FindingSet, FuzzyMatcher};
use crate::capture::{Barcode, RawImage};
use crate::config::{AppConfig, NormalizeSettings};
use crate::lookup::{LookupError, LookupOutcome, OpenFoodFactsClient, ProductLookup};
use crate::vision::{normalize, NormalizeError, OcrEngine, TesseractOcr};

/// Errors that abort a run. Collaborator failures are not among them.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid image: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("image normalization task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("no OCR engine configured")]
    NoOcrEngine,
    #[error("no product lookup configured")]
    NoProductLookup,
    #[error("detection cancelled")]
    Cancelled,
}

/// Where the scanned text came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextSource {
    /// Recognized by the OCR engine
    Ocr,
    /// OCR engine failed; the text is empty
    OcrFailed { reason: String },
    /// Supplied directly by the caller
    Provided,
    /// Product lookup by barcode
    Lookup { barcode: String, outcome: LookupOutcome },
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    /// Id used in log spans for this run
    pub run_id: Uuid,
    /// Text that was scanned, for display
    pub text: String,
    pub findings: FindingSet,
    pub source: TextSource,
}

/// Allergen detection over label images, barcodes and plain text
pub struct DetectionPipeline {
    dictionary: Arc<Dictionary>,
    matcher: FuzzyMatcher,
    normalize: NormalizeSettings,
    language: String,
    ocr: Option<Arc<dyn OcrEngine>>,
    lookup: Option<Arc<dyn ProductLookup>>,
}

impl DetectionPipeline {
    /// Text-only pipeline; attach collaborators with the `with_*` methods
    pub fn new(dictionary: Arc<Dictionary>, matcher: FuzzyMatcher) -> Self {
        Self {
            dictionary,
            matcher,
            normalize: NormalizeSettings::default(),
            language: crate::config::OcrSettings::default().language,
            ocr: None,
            lookup: None,
        }
    }

    /// Pipeline wired to Tesseract and Open Food Facts as configured
    pub fn from_config(config: &AppConfig, dictionary: Arc<Dictionary>) -> Result<Self, LookupError> {
        let lookup = OpenFoodFactsClient::new(&config.lookup)?;
        Ok(Self::new(dictionary, FuzzyMatcher::from(&config.matching))
            .with_normalize(config.normalize.clone())
            .with_ocr(Arc::new(TesseractOcr::new(config.ocr.clone())), &config.ocr.language)
            .with_lookup(Arc::new(lookup)))
    }

    pub fn with_normalize(mut self, settings: NormalizeSettings) -> Self {
        self.normalize = settings;
        self
    }

    /// Attach an OCR engine and the language hint passed to it
    pub fn with_ocr(mut self, engine: Arc<dyn OcrEngine>, language: &str) -> Self {
        self.ocr = Some(engine);
        self.language = language.to_string();
        self
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn ProductLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn matcher(&self) -> FuzzyMatcher {
        self.matcher
    }

    /// Scan ingredient text, whatever its provenance
    pub fn detect_text(&self, text: &str) -> FindingSet {
        self.matcher.find(&tokenize(text), &self.dictionary)
    }

    /// Scan caller-supplied text and wrap the result
    pub fn analyze_text(&self, text: &str) -> Detection {
        let run_id = Uuid::new_v4();
        let _span = info_span!("analyze_text", %run_id).entered();
        let findings = self.detect_text(text);
        info!("Text scan: {} findings", findings.len());
        Detection {
            run_id,
            text: text.to_string(),
            findings,
            source: TextSource::Provided,
        }
    }

    /// Normalize a label image, recognize its text and scan it.
    ///
    /// The image is consumed; normalization runs on the blocking pool so
    /// concurrent runs are not stalled by large bitmaps.
    pub async fn detect_image(&self, image: RawImage) -> Result<Detection, PipelineError> {
        let run_id = Uuid::new_v4();
        self.run_image(run_id, image)
            .instrument(info_span!("detect_image", %run_id))
            .await
    }

    /// [`detect_image`](Self::detect_image) that gives up when `cancel` fires.
    /// The in-flight OCR call is dropped; nothing from the run is kept.
    pub async fn detect_image_cancellable(
        &self,
        image: RawImage,
        cancel: &CancellationToken,
    ) -> Result<Detection, PipelineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Image detection cancelled");
                Err(PipelineError::Cancelled)
            }
            result = self.detect_image(image) => result,
        }
    }

    async fn run_image(&self, run_id: Uuid, image: RawImage) -> Result<Detection, PipelineError> {
        let ocr = self.ocr.as_ref().ok_or(PipelineError::NoOcrEngine)?;

        let settings = self.normalize.clone();
        let normalized = tokio::task::spawn_blocking(move || normalize(&image, &settings)).await??;
        debug!("Normalized image to {:?}", normalized.dimensions());

        let (text, source) = match ocr.recognize(&normalized, &self.language).await {
            Ok(text) => (text, TextSource::Ocr),
            Err(e) => {
                warn!("OCR failed, reporting no findings: {}", e);
                (String::new(), TextSource::OcrFailed { reason: e.to_string() })
            }
        };

        if text.trim().is_empty() {
            info!("No text recognized");
        }
        let findings = self.detect_text(&text);
        info!("Image scan: {} findings", findings.len());

        Ok(Detection {
            run_id,
            text,
            findings,
            source,
        })
    }

    /// Look up a product's ingredients by barcode and scan them.
    ///
    /// Not-found and failed lookups are scanned like any other text (their
    /// status message), which yields no findings.
    pub async fn detect_barcode(&self, barcode: &Barcode) -> Result<Detection, PipelineError> {
        let lookup = self.lookup.as_ref().ok_or(PipelineError::NoProductLookup)?;
        let run_id = Uuid::new_v4();

        let detection = async {
            let outcome = lookup.lookup(barcode).await;
            let text = outcome.text().to_string();
            let findings = self.detect_text(&text);
            info!("Barcode scan: {} findings", findings.len());

            Detection {
                run_id,
                text,
                findings,
                source: TextSource::Lookup {
                    barcode: barcode.to_string(),
                    outcome,
                },
            }
        }
        .instrument(info_span!("detect_barcode", %run_id, %barcode))
        .await;

        Ok(detection)
    }
}
