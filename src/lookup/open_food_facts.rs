//! Open Food Facts product lookup
//!
//! `GET {base_url}/api/v0/product/{barcode}.json`. A `status` of 1 means the
//! product exists; the ingredient list is `ingredients_text`, falling back
//! to the German `ingredients_text_de`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{LookupError, LookupOutcome, ProductLookup};
use crate::capture::Barcode;
use crate::config::LookupSettings;

#[derive(Debug, Deserialize)]
struct ProductResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    product: Option<Product>,
}

#[derive(Debug, Deserialize)]
struct Product {
    #[serde(default)]
    ingredients_text: Option<String>,
    #[serde(default)]
    ingredients_text_de: Option<String>,
}

/// HTTP client for the Open Food Facts API
pub struct OpenFoodFactsClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    pub fn new(settings: &LookupSettings) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn product_url(&self, barcode: &Barcode) -> String {
        format!("{}/api/v0/product/{}.json", self.base_url, barcode)
    }

    async fn fetch(&self, barcode: &Barcode) -> Result<LookupOutcome, reqwest::Error> {
        let url = self.product_url(barcode);
        debug!("Looking up product at {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // The API answers unknown products with 404 and a status-0 body
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Ok(LookupOutcome::Failed(format!("HTTP {}", status)));
        }
        Ok(parse_product_response(&body))
    }
}

#[async_trait]
impl ProductLookup for OpenFoodFactsClient {
    async fn lookup(&self, barcode: &Barcode) -> LookupOutcome {
        let outcome = match self.fetch(barcode).await {
            Ok(outcome) => outcome,
            Err(e) => LookupOutcome::Failed(e.to_string()),
        };

        match &outcome {
            LookupOutcome::Ingredients(text) => {
                info!("Product {} found ({} characters of ingredients)", barcode, text.chars().count())
            }
            LookupOutcome::NoIngredients => info!("Product {} has no ingredient list", barcode),
            LookupOutcome::NotFound => info!("Product {} not found", barcode),
            LookupOutcome::Failed(reason) => warn!("Lookup for {} failed: {}", barcode, reason),
        }
        outcome
    }
}

/// Interpret an API response body
pub(crate) fn parse_product_response(body: &str) -> LookupOutcome {
    let response: ProductResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => return LookupOutcome::Failed(format!("invalid response: {}", e)),
    };

    if response.status != 1 {
        return LookupOutcome::NotFound;
    }

    let ingredients = response.product.and_then(|product| {
        [product.ingredients_text, product.ingredients_text_de]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
    });

    match ingredients {
        Some(text) => LookupOutcome::Ingredients(text),
        None => LookupOutcome::NoIngredients,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_found_with_ingredients() {
        let body = r#"{"code":"4008400402222","status":1,"status_verbose":"product found",
            "product":{"ingredients_text":"Zucker, Weizenmehl, Vollmilchpulver"}}"#;
        assert_eq!(
            parse_product_response(body),
            LookupOutcome::Ingredients("Zucker, Weizenmehl, Vollmilchpulver".to_string())
        );
    }

    #[test]
    fn test_parse_falls_back_to_german_text() {
        let body = r#"{"status":1,"product":{"ingredients_text":"  ","ingredients_text_de":"Haselnüsse"}}"#;
        assert_eq!(
            parse_product_response(body),
            LookupOutcome::Ingredients("Haselnüsse".to_string())
        );
    }

    #[test]
    fn test_parse_found_without_ingredients() {
        let body = r#"{"status":1,"product":{"product_name":"Wasser"}}"#;
        assert_eq!(parse_product_response(body), LookupOutcome::NoIngredients);
    }

    #[test]
    fn test_parse_not_found() {
        let body = r#"{"code":"0000","status":0,"status_verbose":"product not found"}"#;
        assert_eq!(parse_product_response(body), LookupOutcome::NotFound);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_product_response("<html>502 Bad Gateway</html>"),
            LookupOutcome::Failed(_)
        ));
    }

    #[test]
    fn test_product_url() {
        let settings = LookupSettings {
            base_url: "https://example.org/".to_string(),
            ..LookupSettings::default()
        };
        let client = OpenFoodFactsClient::new(&settings).unwrap();
        let barcode = Barcode::parse("737628064502").unwrap();
        assert_eq!(
            client.product_url(&barcode),
            "https://example.org/api/v0/product/737628064502.json"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_failed_outcome() {
        let settings = LookupSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..LookupSettings::default()
        };
        let client = OpenFoodFactsClient::new(&settings).unwrap();
        let barcode = Barcode::parse("737628064502").unwrap();
        assert!(matches!(client.lookup(&barcode).await, LookupOutcome::Failed(_)));
    }
}
