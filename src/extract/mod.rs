//! Turning product page HTML into a [`ProductRecord`].
//!
//! Extraction is best-effort: every field other than the product code may
//! come back empty when the page layout changes.

pub mod characteristics;
pub mod jsonld;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::models::ProductRecord;

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid digits regex"));

/// Turns product page HTML into a record.
pub trait Extractor: Send + Sync {
    /// `Ok(None)` means the page is not a recognizable product page.
    fn extract(&self, html: &str, url: &str) -> anyhow::Result<Option<ProductRecord>>;
}

/// Extracts from the page's JSON-LD `Product` node plus its DOM.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLdExtractor;

impl JsonLdExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for JsonLdExtractor {
    fn extract(&self, html: &str, url: &str) -> anyhow::Result<Option<ProductRecord>> {
        let document = Html::parse_document(html);
        let product = jsonld::find_product(&document);
        let dom_code = first_text(&document, "#product_code span.br-pr-code-val");

        if product.is_none() && dom_code.is_none() {
            debug!("No product data found on {}", url);
            return Ok(None);
        }
        let product = product.unwrap_or_default();

        let name = jsonld::string_field(&product, "name")
            .or_else(|| first_text(&document, "h1"))
            .unwrap_or_default();
        let product_code = dom_code
            .or_else(|| jsonld::string_field(&product, "mpn"))
            .or_else(|| jsonld::string_field(&product, "sku"))
            .unwrap_or_default();

        let offers = jsonld::Offers::from_product(&product);
        let review_count = jsonld::review_count(&product)
            .or_else(|| review_link_count(&document))
            .unwrap_or(0);

        let characteristics = characteristics::extract(&document);
        let (screen_diagonal, display_resolution) = characteristics::display_info(&characteristics);
        let (color, storage) = characteristics::color_and_storage(&characteristics, &name);

        Ok(Some(ProductRecord {
            manufacturer: jsonld::brand_name(&product).unwrap_or_default(),
            price: offers.price,
            sale_price: offers.sale_price,
            images: jsonld::images(&product),
            metadata: jsonld::metadata(&product, &offers),
            name,
            color,
            storage,
            product_code,
            review_count,
            screen_diagonal,
            display_resolution,
            characteristics,
            source_url: url.to_string(),
        }))
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(characteristics::clean_text)
        .filter(|text| !text.is_empty())
}

fn review_link_count(document: &Html) -> Option<u32> {
    let text = first_text(document, "a[href*='#reviews']")?;
    DIGITS.find(&text)?.as_str().parse().ok()
}
