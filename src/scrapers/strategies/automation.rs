//! Automation strategy: isolated pages on the shared async browser.

use std::rc::Rc;
use std::sync::Arc;

use tracing::info;

use super::{build_record, LoadedPage, PageFlow};
use crate::error::{Result, ScrapeError};
use crate::extract::Extractor;
use crate::models::ProductRecord;
use crate::scrapers::browser::{BrowserLauncher, BrowserRuntime, BrowserSession};
use crate::scrapers::resolver::{site, AutomationPage};
use crate::scrapers::strategy::{ParsingStrategy, StrategyKind};

pub struct AutomationStrategy<L>
where
    L: BrowserLauncher + Clone,
    L::Browser: BrowserSession,
{
    runtime: Arc<BrowserRuntime<L>>,
    reuse: bool,
    warm_up: bool,
    flow: PageFlow,
    extractor: Arc<dyn Extractor>,
}

impl<L> AutomationStrategy<L>
where
    L: BrowserLauncher + Clone,
    L::Browser: BrowserSession,
{
    pub fn new(
        runtime: Arc<BrowserRuntime<L>>,
        flow: PageFlow,
        extractor: Arc<dyn Extractor>,
        reuse: bool,
    ) -> Self {
        Self {
            runtime,
            reuse,
            warm_up: false,
            flow,
            extractor,
        }
    }

    /// Open the home page on the shared browser at startup (reuse mode only).
    pub fn with_warm_up(mut self, enabled: bool) -> Self {
        self.warm_up = enabled;
        self
    }

    pub fn runtime(&self) -> &Arc<BrowserRuntime<L>> {
        &self.runtime
    }

    fn load(&self, query: Option<&str>, url: Option<&str>) -> Result<LoadedPage> {
        let flow = self.flow.clone();
        let query = query.map(str::to_string);
        let url = url.map(str::to_string);
        let job = move |browser: Rc<L::Browser>| async move {
            let page = browser.open_page().await?;
            let outcome = flow.load(&page, query.as_deref(), url.as_deref()).await;
            browser.close_page(page).await;
            outcome
        };

        if self.reuse {
            return self.runtime.run(job);
        }

        info!("Starting private browser runtime");
        let private = BrowserRuntime::new(
            self.runtime.launcher().clone(),
            self.runtime.options().clone(),
        );
        let outcome = private.run(job);
        private.close();
        outcome
    }
}

impl<L> ParsingStrategy for AutomationStrategy<L>
where
    L: BrowserLauncher + Clone,
    L::Browser: BrowserSession,
{
    fn kind(&self) -> StrategyKind {
        StrategyKind::Automation
    }

    fn parse_inner(&self, query: Option<&str>, url: Option<&str>) -> Result<ProductRecord> {
        let loaded = self.load(query, url)?;
        build_record(self.extractor.as_ref(), &loaded.html, &loaded.url, self.kind())
    }

    fn wants_warm_up(&self) -> bool {
        self.warm_up && self.reuse
    }

    fn warm_up(&self) -> Result<()> {
        self.runtime.run(|browser| async move {
            let page = browser.open_page().await?;
            let visited = page.goto(site::HOME_URL).await;
            browser.close_page(page).await;
            visited.map_err(ScrapeError::from)
        })?;
        info!("Browser warmed up");
        Ok(())
    }

    fn close(&self) {
        self.runtime.close();
    }
}
