//! Product Lookup Layer
//!
//! Fetches ingredient text for a scanned barcode. The lookup service is an
//! external collaborator; failures are reported as an outcome, not an error,
//! so the caller can tell "not found" from "lookup failed".

pub mod open_food_facts;

pub use open_food_facts::OpenFoodFactsClient;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::capture::Barcode;

/// Errors constructing a lookup client
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result of looking up one barcode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum LookupOutcome {
    /// Product found with an ingredient list
    Ingredients(String),
    /// Product found but it has no ingredient list
    NoIngredients,
    /// Barcode unknown to the service
    NotFound,
    /// Transport, HTTP or decoding failure
    Failed(String),
}

impl LookupOutcome {
    /// Text to show and to scan: the ingredient list, or a status message
    pub fn text(&self) -> &str {
        match self {
            LookupOutcome::Ingredients(text) => text,
            LookupOutcome::NoIngredients => "Keine Zutaten gefunden",
            LookupOutcome::NotFound => "Produkt nicht gefunden",
            LookupOutcome::Failed(_) => "Fehler beim Laden der Produktdaten",
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LookupOutcome::Ingredients(_) | LookupOutcome::NoIngredients)
    }
}

/// Barcode to ingredient text collaborator
#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn lookup(&self, barcode: &Barcode) -> LookupOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_text() {
        assert_eq!(LookupOutcome::Ingredients("Zucker, Milch".into()).text(), "Zucker, Milch");
        assert_eq!(LookupOutcome::NoIngredients.text(), "Keine Zutaten gefunden");
        assert_eq!(LookupOutcome::NotFound.text(), "Produkt nicht gefunden");
        assert_eq!(
            LookupOutcome::Failed("timeout".into()).text(),
            "Fehler beim Laden der Produktdaten"
        );
    }

    #[test]
    fn test_outcome_is_found() {
        assert!(LookupOutcome::NoIngredients.is_found());
        assert!(!LookupOutcome::NotFound.is_found());
        assert!(!LookupOutcome::Failed(String::new()).is_found());
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(LookupOutcome::Failed("HTTP 503".into())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed", "detail": "HTTP 503"}));
        let json = serde_json::to_value(LookupOutcome::NotFound).unwrap();
        assert_eq!(json, serde_json::json!({"status": "not_found"}));
    }
}
