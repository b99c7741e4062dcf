//! Shared stubs for integration tests. Nothing here touches a network or a browser.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use brainscrape::extract::Extractor;
use brainscrape::models::ProductRecord;
use brainscrape::scrapers::browser::{BrowserLauncher, BrowserSession, RuntimeOptions};
use brainscrape::scrapers::http_client::{FetchedPage, PageFetcher};
use brainscrape::scrapers::resolver::{AutomationPage, ElementState, Locator};
use brainscrape::ScrapeError;

/// A page that serves canned HTML per URL and records every navigation.
pub struct StubPage {
    pages: HashMap<String, String>,
    current: RefCell<String>,
    pub visits: Arc<Mutex<Vec<String>>>,
}

impl StubPage {
    pub fn new(pages: &[(&str, &str)], visits: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, html)| (url.to_string(), html.to_string()))
                .collect(),
            current: RefCell::new(String::new()),
            visits,
        }
    }
}

#[async_trait(?Send)]
impl AutomationPage for StubPage {
    async fn goto(&self, url: &str) -> anyhow::Result<()> {
        self.visits.lock().unwrap().push(url.to_string());
        *self.current.borrow_mut() = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> anyhow::Result<String> {
        Ok(self.current.borrow().clone())
    }

    async fn content(&self) -> anyhow::Result<String> {
        let current = self.current.borrow();
        Ok(self.pages.get(current.as_str()).cloned().unwrap_or_default())
    }

    async fn element_state(&self, _locator: &Locator) -> anyhow::Result<ElementState> {
        Ok(ElementState::Missing)
    }

    async fn attribute(&self, _locator: &Locator, _name: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    async fn scroll_into_view(&self, _locator: &Locator) -> anyhow::Result<()> {
        Ok(())
    }

    async fn click(&self, _locator: &Locator) -> anyhow::Result<()> {
        Ok(())
    }

    async fn fill(&self, _locator: &Locator, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn assign_value(&self, _locator: &Locator, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn press_enter(&self, _locator: &Locator) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Launch/shutdown counters shared with a test.
#[derive(Default)]
pub struct Counters {
    pub launches: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl Counters {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

/// A browser launcher whose pages are [`StubPage`]s over a fixed site.
#[derive(Clone)]
pub struct StubLauncher {
    pub counters: Arc<Counters>,
    pub pages: Vec<(String, String)>,
    pub visits: Arc<Mutex<Vec<String>>>,
    /// Artificial launch delay, to widen start races.
    pub launch_delay: Duration,
}

impl StubLauncher {
    pub fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            pages: pages
                .iter()
                .map(|(u, h)| (u.to_string(), h.to_string()))
                .collect(),
            visits: Arc::new(Mutex::new(Vec::new())),
            launch_delay: Duration::ZERO,
        }
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

pub struct StubBrowser {
    pages: Vec<(String, String)>,
    visits: Arc<Mutex<Vec<String>>>,
}

#[async_trait(?Send)]
impl BrowserLauncher for StubLauncher {
    type Browser = StubBrowser;

    async fn launch(&self) -> anyhow::Result<StubBrowser> {
        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        Ok(StubBrowser {
            pages: self.pages.clone(),
            visits: Arc::clone(&self.visits),
        })
    }

    async fn shutdown(&self, _browser: StubBrowser) {
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait(?Send)]
impl BrowserSession for StubBrowser {
    type Page = StubPage;

    async fn open_page(&self) -> anyhow::Result<StubPage> {
        let pages: Vec<(&str, &str)> = self
            .pages
            .iter()
            .map(|(u, h)| (u.as_str(), h.as_str()))
            .collect();
        Ok(StubPage::new(&pages, Arc::clone(&self.visits)))
    }

    async fn close_page(&self, _page: StubPage) {}
}

/// Fetcher that returns the same body for every URL.
pub struct StubFetcher {
    pub body: String,
}

impl PageFetcher for StubFetcher {
    fn fetch(&self, url: &str) -> brainscrape::Result<FetchedPage> {
        Ok(FetchedPage {
            url: url.to_string(),
            final_url: url.to_string(),
            status: 200,
            content_type: Some("text/html".to_string()),
            body: self.body.clone(),
        })
    }
}

/// Fetcher that always fails like an HTTP error would.
pub struct FailingFetcher;

impl PageFetcher for FailingFetcher {
    fn fetch(&self, url: &str) -> brainscrape::Result<FetchedPage> {
        Err(ScrapeError::execution(format!("HTTP 503 fetching {}", url)))
    }
}

/// Extractor returning a fixed record regardless of input.
pub struct StubExtractor {
    pub record: Option<ProductRecord>,
}

impl StubExtractor {
    pub fn returning(record: ProductRecord) -> Self {
        Self {
            record: Some(record),
        }
    }
}

impl Extractor for StubExtractor {
    fn extract(&self, _html: &str, _url: &str) -> anyhow::Result<Option<ProductRecord>> {
        Ok(self.record.clone())
    }
}

pub fn quick_options() -> RuntimeOptions {
    RuntimeOptions {
        job_timeout: Duration::from_secs(5),
        startup_timeout: Duration::from_secs(5),
        close_timeout: Duration::from_secs(5),
    }
}
