//! OCR (Optical Character Recognition) module
//!
//! The recognition engine is external. [`OcrEngine`] is the seam the
//! pipeline calls through; [`TesseractOcr`] drives the `tesseract` CLI.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::OcrSettings;
use crate::vision::NormalizedImage;

/// Recognition failures reported by an OCR engine
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),
    #[error("OCR failed: {0}")]
    OcrFailed(String),
    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to encode image for OCR: {0}")]
    Encode(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text recognition collaborator
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text in a normalized image. `language` is an engine
    /// specific hint such as `"deu"`.
    async fn recognize(&self, image: &NormalizedImage, language: &str) -> Result<String, OcrError>;
}

/// Tesseract OCR via its command-line interface.
///
/// The PNG is piped on stdin so nothing touches disk. The child process is
/// killed if the recognition future is dropped.
pub struct TesseractOcr {
    settings: OcrSettings,
}

impl TesseractOcr {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    fn build_command(&self, language: &str) -> Command {
        let mut command = Command::new(&self.settings.command);
        command.arg("stdin").arg("stdout").args(["-l", language]);
        if let Some(psm) = self.settings.page_segmentation_mode {
            command.args(["--psm", &psm.to_string()]);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run(&self, png: Vec<u8>, language: &str) -> Result<String, OcrError> {
        let mut child = self.build_command(language).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrError::BackendNotAvailable(format!(
                    "{} not found (install tesseract-ocr)",
                    self.settings.command
                ))
            } else {
                OcrError::Io(e)
            }
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::OcrFailed("tesseract stdin unavailable".to_string()))?;
        let writer = tokio::spawn(async move {
            stdin.write_all(&png).await?;
            stdin.shutdown().await
        });

        let output = child.wait_with_output().await?;
        // A write error after tesseract exited is reported through its status
        let _ = writer.await;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr.trim())))
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &NormalizedImage, language: &str) -> Result<String, OcrError> {
        let (width, height) = image.dimensions();
        debug!("Running tesseract on {}x{} image (lang={})", width, height, language);

        let start = Instant::now();
        let png = image.to_png()?;
        let timeout = Duration::from_secs(self.settings.timeout_secs);

        let text = tokio::time::timeout(timeout, self.run(png, language))
            .await
            .map_err(|_| OcrError::Timeout(timeout))??;

        info!(
            "OCR complete: {} characters in {}ms",
            text.chars().count(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}
