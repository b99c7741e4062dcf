//! The strategy contract shared by every parsing backend.

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::{Result, ScrapeError};
use crate::models::ProductRecord;

/// Which backend produced (or should produce) a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyKind {
    /// Plain HTTP fetch of a known product URL.
    Static,
    /// Synchronous browser driver.
    Driver,
    /// Async browser automation on a dedicated runtime thread.
    Automation,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Static,
        StrategyKind::Driver,
        StrategyKind::Automation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Static => "static",
            StrategyKind::Driver => "driver",
            StrategyKind::Automation => "automation",
        }
    }

    /// Whether this backend can turn a free-text query into a URL.
    pub fn resolves_queries(&self) -> bool {
        !matches!(self, StrategyKind::Static)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "static" | "bs4" => Ok(StrategyKind::Static),
            "driver" | "selenium" => Ok(StrategyKind::Driver),
            "automation" | "playwright" => Ok(StrategyKind::Automation),
            other => Err(ScrapeError::configuration(format!(
                "Unknown strategy '{}'. Allowed values: {}",
                other,
                StrategyKind::ALL.map(|k| k.as_str()).join(", ")
            ))),
        }
    }
}

/// Normalize an optional input: trimmed, and `None` when blank.
fn normalize(input: Option<&str>) -> Option<&str> {
    input.map(str::trim).filter(|s| !s.is_empty())
}

/// A parsing backend.
///
/// Implementors provide [`parse_inner`](ParsingStrategy::parse_inner); callers
/// use [`parse`](ParsingStrategy::parse), which validates the inputs, maps
/// errors into the public taxonomy and rejects records without a product code.
pub trait ParsingStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Produce a record for a query or a direct URL. Inputs are already
    /// trimmed and at least one of them is present.
    fn parse_inner(&self, query: Option<&str>, url: Option<&str>) -> Result<ProductRecord>;

    fn parse(&self, query: Option<&str>, url: Option<&str>) -> Result<ProductRecord> {
        let query = normalize(query);
        let url = normalize(url);
        if query.is_none() && url.is_none() {
            return Err(ScrapeError::configuration(
                "Either 'query' or 'url' must be provided.",
            ));
        }

        info!(
            "[{}] parsing query={:?} url={:?}",
            self.kind(),
            query.unwrap_or(""),
            url.unwrap_or("")
        );

        let record = self.parse_inner(query, url).map_err(|e| {
            let e = e.at_strategy_boundary();
            warn!("[{}] parse failed: {}", self.kind(), e);
            e
        })?;

        if !record.has_product_code() {
            return Err(ScrapeError::execution(
                "Parsed product does not contain a product code.",
            ));
        }
        info!(
            "[{}] Parsed product '{}' (code={})",
            self.kind(),
            record.name,
            record.product_code
        );
        Ok(record)
    }

    /// Whether this strategy should be warmed up at startup.
    fn wants_warm_up(&self) -> bool {
        false
    }

    /// Bring up any expensive runtime ahead of the first parse.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    /// Release any runtime this strategy owns.
    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<(Option<String>, Option<String>)>>,
        result: fn() -> Result<ProductRecord>,
    }

    impl ParsingStrategy for Recording {
        fn kind(&self) -> StrategyKind {
            StrategyKind::Static
        }

        fn parse_inner(&self, query: Option<&str>, url: Option<&str>) -> Result<ProductRecord> {
            self.seen
                .lock()
                .unwrap()
                .push((query.map(String::from), url.map(String::from)));
            (self.result)()
        }
    }

    fn recording(result: fn() -> Result<ProductRecord>) -> Recording {
        Recording {
            seen: Mutex::new(Vec::new()),
            result,
        }
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!("bs4".parse::<StrategyKind>().unwrap(), StrategyKind::Static);
        assert_eq!(" Selenium ".parse::<StrategyKind>().unwrap(), StrategyKind::Driver);
        assert_eq!("playwright".parse::<StrategyKind>().unwrap(), StrategyKind::Automation);

        let err = "scrapy".parse::<StrategyKind>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("static, driver, automation"));
    }

    #[test]
    fn test_blank_inputs_rejected_before_backend() {
        let strategy = recording(|| Ok(ProductRecord::default()));
        let err = strategy.parse(Some("  "), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(strategy.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_inputs_are_trimmed() {
        let strategy = recording(|| {
            Ok(ProductRecord {
                product_code: "1".into(),
                ..Default::default()
            })
        });
        strategy.parse(Some(" iphone "), Some("")).unwrap();
        assert_eq!(
            strategy.seen.lock().unwrap()[0],
            (Some("iphone".to_string()), None)
        );
    }

    #[test]
    fn test_record_without_code_rejected() {
        let strategy = recording(|| Ok(ProductRecord::default()));
        let err = strategy.parse(None, Some("https://x/y")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(
            err.to_string(),
            "Parsed product does not contain a product code."
        );
    }

    #[test]
    fn test_foreign_errors_become_execution() {
        let strategy = recording(|| Err(ScrapeError::Runtime("worker gone".into())));
        let err = strategy.parse(Some("q"), None).unwrap_err();
        assert!(matches!(err, ScrapeError::Execution(_)));
    }
}
