//! Characteristics table and the fields derived from it.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static COLOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(Natural Titanium|Blue Titanium|Black Titanium|Black|Blue|White|Silver|Gold|Green|Red|Pink|Purple)\b",
    )
    .expect("valid color regex")
});

static STORAGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+\s?(?:GB|TB))").expect("valid storage regex"));

static DIAGONAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[.,]?\d*)").expect("valid diagonal regex"));

static RESOLUTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+\s*[xх×]\s*\d+)").expect("valid resolution regex"));

const COLOR_KEYS: &[&str] = &["Колір", "Цвет"];
const STORAGE_KEYS: &[&str] = &[
    "Вбудована пам'ять",
    "Вбудована пам’ять",
    "Объем встроенной памяти",
    "Пам'ять",
];
const DIAGONAL_KEYS: &[&str] = &[
    "Діагональ екрану",
    "Діагональ екрана",
    "Діагональ",
    "Диагональ экрана",
];
const RESOLUTION_KEYS: &[&str] = &[
    "Роздільна здатність екрану",
    "Роздільна здатність екрана",
    "Роздільна здатність",
    "Разрешение экрана",
    "Разрешение",
];

/// (row, key, value) selector triples for the layouts the site has used.
const ROW_LAYOUTS: &[(&str, &str, &str)] = &[
    (".br-pr-chr > div > div", "span:nth-of-type(1)", "span:nth-of-type(2)"),
    (
        "div.product-characteristic__item",
        "div.product-characteristic__title",
        "div.product-characteristic__value",
    ),
    (
        "div.product-properties__item",
        "div.product-properties__title",
        "div.product-properties__value",
    ),
    (
        "li.characteristics__list-item",
        "span.characteristics__name",
        "span.characteristics__value",
    ),
];

/// Collapse whitespace runs the way rendered text reads.
pub fn clean_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Read the characteristics table using the first layout that yields rows.
pub fn extract(document: &Html) -> BTreeMap<String, String> {
    for (row, key, value) in ROW_LAYOUTS {
        let found = rows(document, row, key, value);
        if !found.is_empty() {
            return found;
        }
    }
    table_rows(document)
}

fn rows(document: &Html, row: &str, key: &str, value: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let (Ok(row), Ok(key), Ok(value)) = (
        Selector::parse(row),
        Selector::parse(key),
        Selector::parse(value),
    ) else {
        return out;
    };
    for container in document.select(&row) {
        let k = container.select(&key).next().map(clean_text);
        let v = container.select(&value).next().map(clean_text);
        if let (Some(k), Some(v)) = (k, v) {
            if !k.is_empty() && !v.is_empty() {
                out.insert(k, v);
            }
        }
    }
    out
}

fn table_rows(document: &Html) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let (Ok(table), Ok(tr), Ok(cell)) = (
        Selector::parse("table.characteristics, table.product-characteristics"),
        Selector::parse("tr"),
        Selector::parse("td, th"),
    ) else {
        return out;
    };
    if let Some(table) = document.select(&table).next() {
        for row in table.select(&tr) {
            let cells: Vec<String> = row.select(&cell).map(clean_text).collect();
            if cells.len() >= 2 && !cells[0].is_empty() && !cells[1].is_empty() {
                out.insert(cells[0].clone(), cells[1].clone());
            }
        }
    }
    out
}

fn first_value<'a>(characteristics: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| characteristics.get(*k))
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

/// Screen diagonal (inches, dot decimal) and resolution ("2556x1179").
pub fn display_info(characteristics: &BTreeMap<String, String>) -> (String, String) {
    let diagonal = first_value(characteristics, DIAGONAL_KEYS)
        .and_then(|v| DIAGONAL_PATTERN.captures(v))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace(',', "."))
        .unwrap_or_default();

    let resolution = first_value(characteristics, RESOLUTION_KEYS)
        .and_then(|v| RESOLUTION_PATTERN.captures(v))
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase()
                .replace(['х', '×'], "x")
        })
        .unwrap_or_default();

    (diagonal, resolution)
}

/// Colour and storage from characteristics, falling back to the product name.
pub fn color_and_storage(characteristics: &BTreeMap<String, String>, name: &str) -> (String, String) {
    let color = first_value(characteristics, COLOR_KEYS)
        .map(str::to_string)
        .or_else(|| {
            COLOR_PATTERN
                .captures(name)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
        .unwrap_or_default();

    let storage = first_value(characteristics, STORAGE_KEYS)
        .map(str::to_string)
        .or_else(|| {
            STORAGE_PATTERN
                .captures(name)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_uppercase().replace(' ', ""))
        })
        .unwrap_or_default();

    (color, storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_rows() {
        let html = Html::parse_document(
            r#"<div id="br-pr-7"><div class="br-pr-chr"><div>
                 <div><span>Діагональ екрану</span><span>6,1"</span></div>
                 <div><span>Роздільна здатність екрану</span><span>2556 х 1179</span></div>
                 <div><span>Колір</span><span><a>Black</a></span></div>
                 <div><span>only key</span></div>
               </div></div></div>"#,
        );
        let chars = extract(&html);
        assert_eq!(chars.len(), 3);
        assert_eq!(chars.get("Колір").map(String::as_str), Some("Black"));

        let (diagonal, resolution) = display_info(&chars);
        assert_eq!(diagonal, "6.1");
        assert_eq!(resolution, "2556x1179");
    }

    #[test]
    fn test_table_fallback() {
        let html = Html::parse_document(
            r#"<table class="characteristics"><tr><th>Вага</th><td>171 г</td></tr></table>"#,
        );
        assert_eq!(extract(&html).get("Вага").map(String::as_str), Some("171 г"));
    }

    #[test]
    fn test_color_and_storage_from_name() {
        let (color, storage) =
            color_and_storage(&BTreeMap::new(), "Apple iPhone 15 128 gb Black Titanium");
        assert_eq!(color, "Black Titanium");
        assert_eq!(storage, "128GB");
    }

    #[test]
    fn test_characteristics_win_over_name() {
        let mut chars = BTreeMap::new();
        chars.insert("Вбудована пам'ять".to_string(), "256 ГБ".to_string());
        let (_, storage) = color_and_storage(&chars, "Phone 128GB");
        assert_eq!(storage, "256 ГБ");
    }
}
