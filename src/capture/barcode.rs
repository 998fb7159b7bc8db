//! Barcode values and the scanner contract
//!
//! Symbol decoding happens outside this crate. A scanner hands over one
//! decoded string and is consumed in the process, so it cannot keep
//! capturing after a successful read.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// Errors for barcode values and scanners
#[derive(Debug, Error)]
pub enum BarcodeError {
    #[error("barcode is empty")]
    Empty,
    #[error("barcode contains invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("scanner I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A decoded product barcode
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Barcode(String);

impl Barcode {
    /// Parse a decoded barcode string. Surrounding whitespace is dropped;
    /// the rest must be ASCII alphanumeric so it can be placed in a URL path.
    pub fn parse(raw: &str) -> Result<Self, BarcodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BarcodeError::Empty);
        }
        if let Some(bad) = trimmed.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(BarcodeError::InvalidCharacter(bad));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of a single decoded barcode
#[async_trait]
pub trait BarcodeScanner: Send {
    /// Wait for one barcode and stop capturing. `Ok(None)` means the
    /// source closed without producing a code.
    async fn scan(self: Box<Self>) -> Result<Option<Barcode>, BarcodeError>;
}

/// Reads one line from stdin. Keyboard-wedge hardware scanners type the
/// code followed by Enter, so this doubles as manual entry.
pub struct StdinBarcodeScanner;

#[async_trait]
impl BarcodeScanner for StdinBarcodeScanner {
    async fn scan(self: Box<Self>) -> Result<Option<Barcode>, BarcodeError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let code = Barcode::parse(&line)?;
            debug!("Scanned barcode {}", code);
            return Ok(Some(code));
        }
        Ok(None)
    }
}
