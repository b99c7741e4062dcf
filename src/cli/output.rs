//! Human-readable rendering of product records.

use console::style;
use serde_json::Value;

use brainscrape::models::ProductRecord;

const MAX_STRING: usize = 200;
const MAX_LIST: usize = 10;
const MAX_MAP: usize = 20;
const RULE_WIDTH: usize = 60;

/// Render a record as indented `key: value` lines under a header.
pub fn render_record(record: &ProductRecord) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!("{}\n", style("PRODUCT DATA").bold()));
    out.push_str(&rule);
    out.push('\n');

    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => {
            for (key, value) in &fields {
                render_entry(&mut out, key, value, 0);
            }
        }
        Ok(other) => render_entry(&mut out, "record", &other, 0),
        Err(e) => out.push_str(&format!("<unprintable record: {}>\n", e)),
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

fn render_entry(out: &mut String, key: &str, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    let label = style(key).cyan();
    match value {
        Value::Array(items) if !items.is_empty() => {
            out.push_str(&format!("{}{}:\n", indent, label));
            for item in items.iter().take(MAX_LIST) {
                match item {
                    Value::Array(_) | Value::Object(_) => render_entry(out, "-", item, depth + 1),
                    scalar => out.push_str(&format!("{}  - {}\n", indent, scalar_text(scalar))),
                }
            }
            if items.len() > MAX_LIST {
                out.push_str(&format!(
                    "{}  {}\n",
                    indent,
                    style(format!("... ({} more)", items.len() - MAX_LIST)).dim()
                ));
            }
        }
        Value::Object(map) if !map.is_empty() => {
            out.push_str(&format!("{}{}:\n", indent, label));
            for (k, v) in map.iter().take(MAX_MAP) {
                render_entry(out, k, v, depth + 1);
            }
            if map.len() > MAX_MAP {
                out.push_str(&format!(
                    "{}  {}\n",
                    indent,
                    style(format!("... ({} more)", map.len() - MAX_MAP)).dim()
                ));
            }
        }
        scalar => out.push_str(&format!("{}{}: {}\n", indent, label, scalar_text(scalar))),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) if s.is_empty() => "-".to_string(),
        Value::String(s) => truncate(s, MAX_STRING),
        Value::Array(_) => "[]".to_string(),
        Value::Object(_) => "{}".to_string(),
        other => other.to_string(),
    }
}

/// Cut `text` to `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(record: &ProductRecord) -> String {
        console::set_colors_enabled(false);
        render_record(record)
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("Діагональ", 4), "Діаг…");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_lists_are_capped() {
        let record = ProductRecord {
            images: (0..15).map(|i| format!("https://img/{}.jpg", i)).collect(),
            ..Default::default()
        };
        let text = plain(&record);
        assert!(text.contains("https://img/9.jpg"));
        assert!(!text.contains("https://img/10.jpg"));
        assert!(text.contains("... (5 more)"));
    }

    #[test]
    fn test_maps_are_capped() {
        let mut record = ProductRecord::default();
        for i in 0..25 {
            record
                .characteristics
                .insert(format!("key{:02}", i), "v".to_string());
        }
        let text = plain(&record);
        assert!(text.contains("key19: v"));
        assert!(!text.contains("key20: v"));
        assert!(text.contains("... (5 more)"));
    }

    #[test]
    fn test_long_strings_are_cut() {
        let record = ProductRecord {
            name: "x".repeat(250),
            ..Default::default()
        };
        let text = plain(&record);
        assert!(text.contains(&format!("name: {}…", "x".repeat(200))));
    }
}
