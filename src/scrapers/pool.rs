//! Strategy registry and composition root.
//!
//! The pool owns one instance of each available strategy, the query cache
//! they share, and the long-lived runtimes behind them. Callers select a
//! strategy by name; unknown or unavailable names are configuration errors.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::config::ScrapeSettings;
use crate::error::{Result, ScrapeError};
use crate::extract::{Extractor, JsonLdExtractor};
use crate::models::ProductRecord;
use crate::scrapers::cache::QueryCache;
use crate::scrapers::http_client::HttpFetcher;
use crate::scrapers::strategies::StaticStrategy;
use crate::scrapers::strategy::{ParsingStrategy, StrategyKind};

#[cfg(any(feature = "browser", feature = "driver"))]
use crate::scrapers::browser::LaunchConfig;
#[cfg(any(feature = "browser", feature = "driver"))]
use crate::scrapers::strategies::PageFlow;

pub struct ScraperPool {
    cache: Arc<QueryCache>,
    strategies: BTreeMap<StrategyKind, Arc<dyn ParsingStrategy>>,
}

impl ScraperPool {
    /// An empty pool around `cache`. Register strategies with [`register`](Self::register).
    pub fn new(cache: Arc<QueryCache>) -> Self {
        Self {
            cache,
            strategies: BTreeMap::new(),
        }
    }

    /// Add or replace the strategy for its kind.
    pub fn register(&mut self, strategy: Arc<dyn ParsingStrategy>) -> &mut Self {
        self.strategies.insert(strategy.kind(), strategy);
        self
    }

    /// Build every strategy this binary was compiled with.
    pub fn from_settings(settings: &ScrapeSettings) -> Result<Self> {
        let cache = Arc::new(QueryCache::new(settings.cache_capacity));
        let extractor: Arc<dyn Extractor> = Arc::new(JsonLdExtractor::new());
        let mut pool = Self::new(Arc::clone(&cache));

        let fetcher = HttpFetcher::from_settings(settings)?;
        pool.register(Arc::new(StaticStrategy::new(
            Arc::new(fetcher),
            Arc::clone(&extractor),
        )));

        #[cfg(any(feature = "browser", feature = "driver"))]
        {
            let shared_cache = settings.cache_enabled.then(|| Arc::clone(&cache));
            let launch = LaunchConfig::from_settings(settings);

            #[cfg(feature = "driver")]
            {
                use crate::scrapers::driver::chrome::ChromeLauncher;
                use crate::scrapers::driver::DriverRuntime;
                use crate::scrapers::strategies::DriverStrategy;

                let runtime = Arc::new(DriverRuntime::new(ChromeLauncher::new(launch.clone())));
                let flow = PageFlow::new(
                    StrategyKind::Driver,
                    shared_cache.clone(),
                    settings.resolver_config(),
                )
                .with_snapshots(&settings.debug_dir, StrategyKind::Driver.as_str());
                let strategy =
                    DriverStrategy::new(runtime, flow, Arc::clone(&extractor), settings.driver_reuse)
                        .with_warm_up(settings.driver_warmup);
                pool.register(Arc::new(strategy));
            }

            #[cfg(feature = "browser")]
            {
                use crate::scrapers::browser::chromium::ChromiumLauncher;
                use crate::scrapers::browser::BrowserRuntime;
                use crate::scrapers::strategies::AutomationStrategy;

                let runtime = Arc::new(BrowserRuntime::new(
                    ChromiumLauncher::new(launch),
                    settings.runtime_options(),
                ));
                let flow = PageFlow::new(
                    StrategyKind::Automation,
                    shared_cache,
                    settings.resolver_config(),
                );
                let strategy =
                    AutomationStrategy::new(runtime, flow, extractor, settings.browser_reuse)
                        .with_warm_up(settings.browser_warmup);
                pool.register(Arc::new(strategy));
            }
        }

        info!(
            "Scraper pool ready: {}",
            pool.available()
                .iter()
                .map(StrategyKind::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(pool)
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Kinds with a registered strategy, in a stable order.
    pub fn available(&self) -> Vec<StrategyKind> {
        self.strategies.keys().copied().collect()
    }

    pub fn strategy(&self, kind: StrategyKind) -> Result<Arc<dyn ParsingStrategy>> {
        self.strategies.get(&kind).cloned().ok_or_else(|| {
            ScrapeError::configuration(format!(
                "Strategy '{}' is not available in this build",
                kind
            ))
        })
    }

    /// Look a strategy up by name (aliases accepted).
    pub fn get(&self, name: &str) -> Result<Arc<dyn ParsingStrategy>> {
        self.strategy(name.parse()?)
    }

    /// Parse with the named strategy.
    pub fn parse(
        &self,
        name: &str,
        query: Option<&str>,
        url: Option<&str>,
    ) -> Result<ProductRecord> {
        self.get(name)?.parse(query, url)
    }

    /// Warm configured strategies up on background threads.
    ///
    /// Never blocks and never fails; problems are logged. The handles are
    /// returned for callers that want to wait.
    pub fn warm_up(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for (kind, strategy) in &self.strategies {
            if !strategy.wants_warm_up() {
                continue;
            }
            let kind = *kind;
            let strategy = Arc::clone(strategy);
            let spawned = thread::Builder::new()
                .name(format!("{}-warmup", kind))
                .spawn(move || match strategy.warm_up() {
                    Ok(()) => info!("[{}] warm-up finished", kind),
                    Err(e) => warn!("[{}] warm-up failed: {}", kind, e),
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("[{}] could not start warm-up thread: {}", kind, e),
            }
        }
        handles
    }

    /// Release every runtime the strategies own.
    pub fn close(&self) {
        for strategy in self.strategies.values() {
            strategy.close();
        }
    }
}
