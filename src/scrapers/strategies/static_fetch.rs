//! Static strategy: one HTTP GET of a known product URL, no browser.

use std::sync::Arc;

use tracing::debug;

use super::build_record;
use crate::error::{Result, ScrapeError};
use crate::extract::Extractor;
use crate::models::ProductRecord;
use crate::scrapers::http_client::PageFetcher;
use crate::scrapers::strategy::{ParsingStrategy, StrategyKind};

pub struct StaticStrategy {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn Extractor>,
}

impl StaticStrategy {
    pub fn new(fetcher: Arc<dyn PageFetcher>, extractor: Arc<dyn Extractor>) -> Self {
        Self { fetcher, extractor }
    }
}

impl ParsingStrategy for StaticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Static
    }

    fn parse_inner(&self, _query: Option<&str>, url: Option<&str>) -> Result<ProductRecord> {
        let url = url.ok_or_else(|| {
            ScrapeError::execution(
                "'url' is required for the static strategy; it cannot resolve a query.",
            )
        })?;

        let page = self.fetcher.fetch(url)?;
        debug!(
            "Fetched {} ({} bytes, status {})",
            page.final_url,
            page.body.len(),
            page.status
        );
        build_record(self.extractor.as_ref(), &page.body, url, self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::scrapers::http_client::FetchedPage;

    struct CannedFetcher(Option<&'static str>);

    impl PageFetcher for CannedFetcher {
        fn fetch(&self, url: &str) -> Result<FetchedPage> {
            match self.0 {
                Some(body) => Ok(FetchedPage {
                    url: url.to_string(),
                    final_url: url.to_string(),
                    status: 200,
                    content_type: Some("text/html".to_string()),
                    body: body.to_string(),
                }),
                None => Err(ScrapeError::execution(format!("HTTP 404 fetching {}", url))),
            }
        }
    }

    struct NothingExtractor;

    impl Extractor for NothingExtractor {
        fn extract(&self, _html: &str, _url: &str) -> anyhow::Result<Option<ProductRecord>> {
            Ok(None)
        }
    }

    fn strategy(body: Option<&'static str>) -> StaticStrategy {
        StaticStrategy::new(Arc::new(CannedFetcher(body)), Arc::new(NothingExtractor))
    }

    #[test]
    fn test_query_only_is_execution_error() {
        let err = strategy(Some("")).parse(Some("iphone"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("'url' is required"));
    }

    #[test]
    fn test_http_failure_is_execution_error() {
        let err = strategy(None).parse(None, Some("https://x/a-p1.html")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn test_no_data_message_names_strategy() {
        let err = strategy(Some("<html></html>"))
            .parse(None, Some("https://x/a-p1.html"))
            .unwrap_err();
        assert_eq!(err.to_string(), "No data returned from static strategy.");
    }
}
