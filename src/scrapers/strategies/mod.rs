//! The three parsing strategies and the page flow the browser-backed ones share.

pub mod automation;
pub mod driver;
pub mod static_fetch;

pub use automation::AutomationStrategy;
pub use driver::DriverStrategy;
pub use static_fetch::StaticStrategy;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};
use crate::extract::Extractor;
use crate::models::ProductRecord;
use crate::scrapers::cache::QueryCache;
use crate::scrapers::resolver::{AutomationPage, Resolver, ResolverConfig};
use crate::scrapers::strategy::StrategyKind;

/// Run the extractor and stamp the record with its origin.
pub(crate) fn build_record(
    extractor: &dyn Extractor,
    html: &str,
    url: &str,
    kind: StrategyKind,
) -> Result<ProductRecord> {
    let mut record = extractor
        .extract(html, url)?
        .ok_or_else(|| ScrapeError::execution(format!("No data returned from {} strategy.", kind)))?;
    record.source_url = url.to_string();
    record.tag_strategy(kind.as_str());
    Ok(record)
}

/// A product page loaded through an automation handle.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub url: String,
    pub html: String,
}

/// Cache lookup, resolution and page load, independent of the backend.
///
/// Owned and `Send` so it can be moved into a browser job.
#[derive(Clone)]
pub struct PageFlow {
    pub kind: StrategyKind,
    pub cache: Option<Arc<QueryCache>>,
    pub resolver: ResolverConfig,
    /// Snapshot directory and file label for resolver failures.
    pub snapshots: Option<(PathBuf, String)>,
}

impl PageFlow {
    pub fn new(kind: StrategyKind, cache: Option<Arc<QueryCache>>, resolver: ResolverConfig) -> Self {
        Self {
            kind,
            cache,
            resolver,
            snapshots: None,
        }
    }

    pub fn with_snapshots(mut self, dir: impl Into<PathBuf>, label: &str) -> Self {
        self.snapshots = Some((dir.into(), label.to_string()));
        self
    }

    /// Load the product page for `query`, or for `url` when no query is given.
    ///
    /// A query wins over a URL. A cached resolution is used as-is; if it no
    /// longer loads, that is an ordinary failure and the entry stays.
    pub async fn load<P: AutomationPage + ?Sized>(
        &self,
        page: &P,
        query: Option<&str>,
        url: Option<&str>,
    ) -> Result<LoadedPage> {
        let Some(query) = query else {
            let url = url.ok_or_else(|| {
                ScrapeError::configuration("Either 'query' or 'url' must be provided.")
            })?;
            debug!("[{}] direct URL, skipping resolution", self.kind);
            return self.open(page, url).await;
        };

        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(self.kind, query)) {
            info!("[{}] cache hit for '{}': {}", self.kind, query, cached);
            return self.open(page, &cached).await.map_err(|e| {
                ScrapeError::execution(format!("Cached URL {} failed: {}", cached, e))
            });
        }

        let mut resolver = Resolver::new(page, &self.resolver);
        if let Some((dir, label)) = &self.snapshots {
            resolver = resolver.with_snapshots(dir.clone(), label);
        }
        let resolved = resolver.resolve(query).await?;
        if let Some(cache) = &self.cache {
            cache.set(self.kind, query, &resolved);
        }

        let current = page.current_url().await.unwrap_or_default();
        if current != resolved {
            self.goto(page, &resolved).await?;
        }
        let html = page.content().await?;
        Ok(LoadedPage {
            url: resolved,
            html,
        })
    }

    async fn open<P: AutomationPage + ?Sized>(&self, page: &P, url: &str) -> Result<LoadedPage> {
        self.goto(page, url).await?;
        let html = page.content().await?;
        Ok(LoadedPage {
            url: url.to_string(),
            html,
        })
    }

    async fn goto<P: AutomationPage + ?Sized>(&self, page: &P, url: &str) -> Result<()> {
        let limit = self.resolver.navigation_timeout;
        match timeout(limit, page.goto(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::execution(format!(
                "Navigation to {} failed: {:#}",
                url, e
            ))),
            Err(_) => {
                warn!("[{}] navigation to {} timed out", self.kind, url);
                Err(ScrapeError::timeout(format!("navigation to {}", url), limit))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::resolver::{ElementState, Locator};
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::time::Duration;

    /// Page that serves fixed HTML for any URL and records visits.
    struct FixedPage {
        visits: RefCell<Vec<String>>,
        fail: bool,
    }

    impl FixedPage {
        fn new() -> Self {
            Self {
                visits: RefCell::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait(?Send)]
    impl AutomationPage for FixedPage {
        async fn goto(&self, url: &str) -> anyhow::Result<()> {
            self.visits.borrow_mut().push(url.to_string());
            if self.fail {
                anyhow::bail!("net::ERR_NAME_NOT_RESOLVED");
            }
            Ok(())
        }
        async fn current_url(&self) -> anyhow::Result<String> {
            Ok(self.visits.borrow().last().cloned().unwrap_or_default())
        }
        async fn content(&self) -> anyhow::Result<String> {
            Ok("<html></html>".to_string())
        }
        async fn element_state(&self, _l: &Locator) -> anyhow::Result<ElementState> {
            Ok(ElementState::Missing)
        }
        async fn attribute(&self, _l: &Locator, _n: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
        async fn scroll_into_view(&self, _l: &Locator) -> anyhow::Result<()> {
            Ok(())
        }
        async fn click(&self, _l: &Locator) -> anyhow::Result<()> {
            Ok(())
        }
        async fn fill(&self, _l: &Locator, _t: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn assign_value(&self, _l: &Locator, _t: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn press_enter(&self, _l: &Locator) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn flow(cache: Option<Arc<QueryCache>>) -> PageFlow {
        let resolver = ResolverConfig {
            navigation_timeout: Duration::from_millis(200),
            overlay_timeout: Duration::from_millis(20),
            element_timeout: Duration::from_millis(20),
            input_visible_timeout: Duration::from_millis(20),
            submit_timeout: Duration::from_millis(20),
            fast_path_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
        };
        PageFlow::new(StrategyKind::Automation, cache, resolver)
    }

    #[tokio::test]
    async fn test_direct_url_skips_resolution() {
        let page = FixedPage::new();
        let loaded = flow(None)
            .load(&page, None, Some("https://brain.com.ua/ukr/a-p1.html"))
            .await
            .unwrap();
        assert_eq!(loaded.url, "https://brain.com.ua/ukr/a-p1.html");
        assert_eq!(*page.visits.borrow(), vec![loaded.url.clone()]);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_resolution() {
        let cache = Arc::new(QueryCache::default());
        cache.set(StrategyKind::Automation, "iphone", "https://brain.com.ua/ukr/b-p2.html");
        let page = FixedPage::new();
        let loaded = flow(Some(cache)).load(&page, Some("iphone"), None).await.unwrap();
        assert_eq!(loaded.url, "https://brain.com.ua/ukr/b-p2.html");
        assert_eq!(page.visits.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_cache_entry_is_kept() {
        let cache = Arc::new(QueryCache::default());
        cache.set(StrategyKind::Automation, "iphone", "https://brain.com.ua/ukr/gone-p3.html");
        let page = FixedPage {
            fail: true,
            ..FixedPage::new()
        };
        let err = flow(Some(Arc::clone(&cache)))
            .load(&page, Some("iphone"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Cached URL https://brain.com.ua/ukr/gone-p3.html failed"));
        assert!(cache.get(StrategyKind::Automation, "iphone").is_some());
    }

    #[tokio::test]
    async fn test_unresolvable_query_reports_stage() {
        let page = FixedPage::new();
        let err = flow(None).load(&page, Some("nothing"), None).await.unwrap_err();
        assert!(err.stage().is_some());
    }
}
