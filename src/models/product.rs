//! Product record produced by every scraping strategy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structured product data extracted from a single product page.
///
/// `product_code` together with `source_url` is the natural key used by
/// the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub storage: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub sale_price: Option<f64>,
    /// Image URLs in page order.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub product_code: String,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub screen_diagonal: String,
    #[serde(default)]
    pub display_resolution: String,
    #[serde(default)]
    pub characteristics: BTreeMap<String, String>,
    #[serde(default)]
    pub source_url: String,
    /// Free-form extra data (sku, offers, which strategy produced it, ...).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ProductRecord {
    /// Fields the persistence layer cannot accept empty.
    pub const REQUIRED_FIELDS: &'static [&'static str] = &["name", "product_code", "source_url"];

    /// Whether the record carries the minimum a parse must produce.
    pub fn has_product_code(&self) -> bool {
        !self.product_code.trim().is_empty()
    }

    /// Required fields that are still empty, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        Self::REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| match *field {
                "name" => self.name.trim().is_empty(),
                "product_code" => self.product_code.trim().is_empty(),
                "source_url" => self.source_url.trim().is_empty(),
                _ => false,
            })
            .collect()
    }

    /// Record which strategy produced this record.
    pub fn tag_strategy(&mut self, strategy: &str) {
        self.metadata.insert(
            "strategy".to_string(),
            serde_json::Value::String(strategy.to_string()),
        );
    }
}
