//! Product data from `application/ld+json` blocks.

use scraper::{Html, Selector};
use serde_json::{Map, Value};

/// Find the first `Product` node, looking inside `@graph` wrappers and arrays.
pub fn find_product(document: &Html) -> Option<Map<String, Value>> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    for script in document.select(&selector) {
        let raw: String = script.text().collect();
        let Ok(payload) = serde_json::from_str::<Value>(raw.trim()) else {
            continue;
        };

        let candidates: Vec<&Value> = match &payload {
            Value::Object(obj) if obj.contains_key("@graph") => obj
                .get("@graph")
                .and_then(Value::as_array)
                .map(|nodes| nodes.iter().collect())
                .unwrap_or_default(),
            Value::Array(nodes) => nodes.iter().collect(),
            other => vec![other],
        };

        for node in candidates {
            if let Value::Object(obj) = node {
                if is_product(obj.get("@type")) {
                    return Some(obj.clone());
                }
            }
        }
    }
    None
}

fn is_product(node_type: Option<&Value>) -> bool {
    match node_type {
        Some(Value::String(t)) => t == "Product",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Product")),
        _ => false,
    }
}

/// Price fields taken from a product's offers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Offers {
    pub price: Option<f64>,
    pub sale_price: Option<f64>,
    pub availability: Option<String>,
    pub currency: Option<String>,
}

impl Offers {
    /// When the product declares its own price and it differs from the offer
    /// price, the declared one is the regular price and the offer is the sale.
    pub fn from_product(product: &Map<String, Value>) -> Self {
        let offer = match product.get("offers") {
            Some(Value::Array(list)) => list.first().and_then(Value::as_object),
            Some(Value::Object(obj)) => Some(obj),
            _ => None,
        };

        let mut price = offer.and_then(|o| o.get("price")).and_then(number);
        let mut sale_price = None;
        if let Some(declared) = product.get("price").and_then(number) {
            if Some(declared) != price {
                sale_price = price;
                price = Some(declared);
            }
        }

        Self {
            price,
            sale_price,
            availability: offer
                .and_then(|o| o.get("availability"))
                .and_then(Value::as_str)
                .map(str::to_string),
            currency: offer
                .and_then(|o| o.get("priceCurrency"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                map.insert(key.to_string(), value);
            }
        };
        put("price", self.price.map(Value::from));
        put("sale_price", self.sale_price.map(Value::from));
        put("availability", self.availability.clone().map(Value::from));
        put("price_currency", self.currency.clone().map(Value::from));
        Value::Object(map)
    }
}

/// Numbers may be encoded as JSON numbers or strings ("41999.00", "41 999,00").
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    }
}

pub fn string_field(product: &Map<String, Value>, key: &str) -> Option<String> {
    match product.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn brand_name(product: &Map<String, Value>) -> Option<String> {
    match product.get("brand")? {
        Value::Object(brand) => string_field(brand, "name"),
        Value::String(name) if !name.trim().is_empty() => Some(name.trim().to_string()),
        _ => None,
    }
}

pub fn images(product: &Map<String, Value>) -> Vec<String> {
    match product.get("image") {
        Some(Value::String(url)) if !url.is_empty() => vec![url.clone()],
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

pub fn review_count(product: &Map<String, Value>) -> Option<u32> {
    product
        .get("aggregateRating")
        .and_then(|rating| rating.get("reviewCount"))
        .and_then(number)
        .map(|n| n as u32)
        .filter(|n| *n > 0)
}

/// Extra product facts kept in the record's metadata. Empty values are dropped.
pub fn metadata(product: &Map<String, Value>, offers: &Offers) -> Map<String, Value> {
    let mut out = Map::new();
    let present = |v: &&Value| !matches!(v, Value::Null) && v.as_str() != Some("");
    let gtin = product
        .get("gtin")
        .filter(present)
        .or_else(|| product.get("gtin13"));
    let entries = [
        ("sku", product.get("sku").cloned()),
        ("gtin", gtin.cloned()),
        ("aggregate_rating", product.get("aggregateRating").cloned()),
        ("offers", Some(offers.to_json())),
        ("description", product.get("description").cloned()),
    ];
    for (key, value) in entries {
        match value {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if s.is_empty() => {}
            Some(value) => {
                out.insert(key.to_string(), value);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(body: &str) -> Html {
        Html::parse_document(&format!("<html><head>{}</head><body></body></html>", body))
    }

    #[test]
    fn test_find_product_in_graph() {
        let html = doc(r#"
            <script type="application/ld+json">{"@type": "BreadcrumbList"}</script>
            <script type="application/ld+json">
              {"@graph": [{"@type": "Organization"}, {"@type": ["Product"], "name": "Phone"}]}
            </script>"#);
        let product = find_product(&html).unwrap();
        assert_eq!(product.get("name"), Some(&json!("Phone")));
    }

    #[test]
    fn test_find_product_skips_invalid_json() {
        let html = doc(r#"
            <script type="application/ld+json">{not json</script>
            <script type="application/ld+json">[{"@type": "Product", "mpn": "X1"}]</script>"#);
        assert!(find_product(&html).is_some());
        assert!(find_product(&doc("")).is_none());
    }

    #[test]
    fn test_offers_declared_price_marks_sale() {
        let product = json!({
            "price": "45999",
            "offers": [{"price": 41999, "priceCurrency": "UAH"}]
        });
        let offers = Offers::from_product(product.as_object().unwrap());
        assert_eq!(offers.price, Some(45999.0));
        assert_eq!(offers.sale_price, Some(41999.0));
        assert_eq!(offers.currency.as_deref(), Some("UAH"));
    }

    #[test]
    fn test_offers_single_price() {
        let product = json!({"offers": {"price": "41 999,50"}});
        let offers = Offers::from_product(product.as_object().unwrap());
        assert_eq!(offers.price, Some(41999.5));
        assert_eq!(offers.sale_price, None);
    }

    #[test]
    fn test_metadata_drops_empty_values() {
        let product = json!({"sku": "1045486", "gtin13": "", "description": null});
        let product = product.as_object().unwrap();
        let meta = metadata(product, &Offers::from_product(product));
        assert_eq!(meta.get("sku"), Some(&json!("1045486")));
        assert!(!meta.contains_key("gtin"));
        assert!(!meta.contains_key("description"));
        assert!(meta.contains_key("offers"));
    }

    #[test]
    fn test_brand_and_images() {
        let product = json!({"brand": {"name": "Apple"}, "image": "https://x/1.jpg"});
        let product = product.as_object().unwrap();
        assert_eq!(brand_name(product).as_deref(), Some("Apple"));
        assert_eq!(images(product), vec!["https://x/1.jpg".to_string()]);
    }
}
