//! Navigation resolver: turns a free-text query into a product page URL.
//!
//! The resolver drives a live page through the site's UI. It first tries
//! the search-results URL directly (fast path). If that yields nothing it
//! walks the full flow: home page, overlays, header search input, submit,
//! results, first product link. Both automation backends implement
//! [`AutomationPage`], so the flow is written once.
//!
//! On failure the stage name is embedded in the returned error and, when a
//! snapshot directory is configured, the page HTML is dumped for triage.

pub mod script;
pub mod site;

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};

/// How an element is addressed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locator {
    XPath(&'static str),
    Css(&'static str),
}

impl Locator {
    pub fn selector(&self) -> &'static str {
        match self {
            Locator::XPath(s) | Locator::Css(s) => s,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::XPath(s) => write!(f, "xpath={}", s),
            Locator::Css(s) => write!(f, "css={}", s),
        }
    }
}

/// Observed state of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    Missing,
    Hidden,
    Visible,
}

impl ElementState {
    pub fn is_attached(self) -> bool {
        !matches!(self, ElementState::Missing)
    }
}

/// Condition a wait is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitFor {
    Attached,
    Visible,
    /// Hidden or removed from the DOM.
    Gone,
}

impl WaitFor {
    fn satisfied_by(self, state: ElementState) -> bool {
        match self {
            WaitFor::Attached => state.is_attached(),
            WaitFor::Visible => state == ElementState::Visible,
            WaitFor::Gone => state != ElementState::Visible,
        }
    }
}

/// Stages of the resolution flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    HomeOrSearchResults,
    OverlayDismissal,
    SearchInputFocus,
    QuerySubmission,
    ResultsWait,
    FirstResultExtraction,
    ProductPageConfirmed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::HomeOrSearchResults => "open_home",
            Stage::OverlayDismissal => "dismiss_overlays",
            Stage::SearchInputFocus => "focus_search_input",
            Stage::QuerySubmission => "submit_search",
            Stage::ResultsWait => "wait_search_page",
            Stage::FirstResultExtraction => "resolve_first_product",
            Stage::ProductPageConfirmed => "product_page_confirmed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live page the resolver can drive.
///
/// Implementations are backend adapters; errors are plain `anyhow` errors
/// and the resolver decides which of them are fatal.
#[async_trait(?Send)]
pub trait AutomationPage {
    /// Navigate and wait for the load to finish.
    async fn goto(&self, url: &str) -> anyhow::Result<()>;

    async fn current_url(&self) -> anyhow::Result<String>;

    /// Full page HTML.
    async fn content(&self) -> anyhow::Result<String>;

    async fn element_state(&self, locator: &Locator) -> anyhow::Result<ElementState>;

    async fn attribute(&self, locator: &Locator, name: &str) -> anyhow::Result<Option<String>>;

    async fn scroll_into_view(&self, locator: &Locator) -> anyhow::Result<()>;

    async fn click(&self, locator: &Locator) -> anyhow::Result<()>;

    /// Type into an input, replacing its current value.
    async fn fill(&self, locator: &Locator, text: &str) -> anyhow::Result<()>;

    /// Set an input's value by script and fire input/change events.
    async fn assign_value(&self, locator: &Locator, text: &str) -> anyhow::Result<()>;

    /// Press Enter with the element focused.
    async fn press_enter(&self, locator: &Locator) -> anyhow::Result<()>;
}

/// Timing knobs for the resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Bound on any single navigation, and on waiting for the results URL.
    pub navigation_timeout: Duration,
    /// Wait for the page-loading overlay to go away.
    pub overlay_timeout: Duration,
    /// Wait for elements that must attach (fallback input, product links).
    pub element_timeout: Duration,
    /// Wait for the primary search input to become visible.
    pub input_visible_timeout: Duration,
    /// Wait for a submit button to attach.
    pub submit_timeout: Duration,
    /// Wait for a product link on the fast path.
    pub fast_path_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(60),
            overlay_timeout: Duration::from_secs(20),
            element_timeout: Duration::from_secs(20),
            input_visible_timeout: Duration::from_secs(8),
            submit_timeout: Duration::from_secs(5),
            fast_path_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Per-call resolution state. Never shared across calls.
#[derive(Debug)]
pub struct ResolverContext<'q> {
    query: &'q str,
    stage: Stage,
    fallbacks: Vec<String>,
}

impl<'q> ResolverContext<'q> {
    fn new(query: &'q str) -> Self {
        Self {
            query,
            stage: Stage::HomeOrSearchResults,
            fallbacks: Vec::new(),
        }
    }

    pub fn query(&self) -> &'q str {
        self.query
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Fallbacks taken so far, oldest first.
    pub fn fallbacks(&self) -> &[String] {
        &self.fallbacks
    }

    fn enter(&mut self, stage: Stage) {
        debug!("resolver stage {} (query={:?})", stage, self.query);
        self.stage = stage;
    }

    fn fallback(&mut self, what: impl Into<String>) {
        let what = what.into();
        debug!("resolver fallback at {}: {}", self.stage, what);
        self.fallbacks.push(what);
    }
}

/// Try candidates in order and return the first success.
///
/// Errors from failed candidates are logged at debug; the last one is
/// returned when every candidate fails.
pub async fn first_success<'c, C, T, F, Fut>(candidates: &'c [C], mut attempt: F) -> anyhow::Result<T>
where
    C: fmt::Debug,
    F: FnMut(&'c C) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut last_error = None;
    for candidate in candidates {
        match attempt(candidate).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!("candidate {:?} failed: {:#}", candidate, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow!("no candidates to try")))
}

#[derive(Debug, Clone, Copy)]
struct InputCandidate {
    locator: Locator,
    wait: WaitFor,
    primary: bool,
}

#[derive(Debug, Clone, Copy)]
enum SubmitAction {
    Click(Locator),
    PressEnter,
}

/// Where the page ended up after submitting a search.
#[derive(Debug, PartialEq, Eq)]
enum Landing {
    Results,
    Product(String),
    Elsewhere,
}

impl Landing {
    fn of(url: &str) -> Option<Landing> {
        if url.contains(site::SEARCH_PATH_MARKER) {
            Some(Landing::Results)
        } else if site::is_product_url(url) {
            Some(Landing::Product(url.to_string()))
        } else {
            None
        }
    }
}

/// Where failure snapshots go and how they are named.
#[derive(Debug, Clone)]
struct SnapshotSink {
    dir: PathBuf,
    label: String,
}

pub struct Resolver<'a, P: AutomationPage + ?Sized> {
    page: &'a P,
    config: &'a ResolverConfig,
    snapshots: Option<SnapshotSink>,
}

impl<'a, P: AutomationPage + ?Sized> Resolver<'a, P> {
    pub fn new(page: &'a P, config: &'a ResolverConfig) -> Self {
        Self {
            page,
            config,
            snapshots: None,
        }
    }

    /// Dump page HTML to `dir` when resolution fails.
    pub fn with_snapshots(mut self, dir: impl Into<PathBuf>, label: &str) -> Self {
        self.snapshots = Some(SnapshotSink {
            dir: dir.into(),
            label: label.to_string(),
        });
        self
    }

    /// Resolve `query` to a product page URL.
    pub async fn resolve(&self, query: &str) -> Result<String> {
        let mut ctx = ResolverContext::new(query);

        if let Some(url) = self.fast_path(&mut ctx).await {
            ctx.enter(Stage::ProductPageConfirmed);
            info!("Resolved '{}' via search URL: {}", query, url);
            return Ok(url);
        }
        ctx.fallback("search URL yielded no product link");

        match self.full_path(&mut ctx).await {
            Ok(url) => {
                ctx.enter(Stage::ProductPageConfirmed);
                info!(
                    "Resolved '{}' via site search: {} ({} fallbacks)",
                    query,
                    url,
                    ctx.fallbacks().len()
                );
                Ok(url)
            }
            Err(e) => Err(self.fail(&ctx, e).await),
        }
    }

    async fn fast_path(&self, ctx: &mut ResolverContext<'_>) -> Option<String> {
        ctx.enter(Stage::HomeOrSearchResults);
        let url = site::search_url(ctx.query());
        if let Err(e) = self.navigate(&url).await {
            debug!("fast path navigation failed: {:#}", e);
            return None;
        }

        if self
            .wait_for(&site::PRODUCT_LINK, WaitFor::Attached, self.config.fast_path_timeout)
            .await
        {
            if let Some(href) = self.product_href().await {
                return Some(href);
            }
        }

        ctx.fallback("scanning search results HTML");
        self.scan_page_html().await
    }

    async fn full_path(&self, ctx: &mut ResolverContext<'_>) -> anyhow::Result<String> {
        ctx.enter(Stage::HomeOrSearchResults);
        self.navigate(site::HOME_URL).await?;
        if !self
            .wait_for(&site::PAGE_PRELOADER, WaitFor::Gone, self.config.overlay_timeout)
            .await
        {
            ctx.fallback("preloader still visible, continuing");
        }

        ctx.enter(Stage::OverlayDismissal);
        self.dismiss_overlays().await;

        ctx.enter(Stage::SearchInputFocus);
        let input = self.focus_search_input(ctx).await?;

        ctx.enter(Stage::QuerySubmission);
        self.fill_query(ctx, &input).await?;
        self.submit(&input).await?;

        ctx.enter(Stage::ResultsWait);
        match self.wait_for_search_page().await {
            Landing::Results => {}
            Landing::Product(url) => {
                ctx.fallback("search submitted straight to a product page");
                return Ok(url);
            }
            Landing::Elsewhere => {
                ctx.fallback("results URL not reached, opening search URL");
                self.navigate(&site::search_url(ctx.query())).await?;
            }
        }

        ctx.enter(Stage::FirstResultExtraction);
        self.first_product(ctx).await
    }

    async fn focus_search_input(&self, ctx: &mut ResolverContext<'_>) -> anyhow::Result<Locator> {
        let candidates = [
            InputCandidate {
                locator: site::SEARCH_INPUT,
                wait: WaitFor::Visible,
                primary: true,
            },
            InputCandidate {
                locator: site::SEARCH_INPUT_FALLBACK,
                wait: WaitFor::Attached,
                primary: false,
            },
        ];
        let chosen = first_success(&candidates, |candidate| async move {
            let limit = if candidate.primary {
                self.config.input_visible_timeout
            } else {
                self.config.element_timeout
            };
            if self.wait_for(&candidate.locator, candidate.wait, limit).await {
                Ok(*candidate)
            } else {
                Err(anyhow!("search input not found ({})", candidate.locator))
            }
        })
        .await
        .context("Search input is not available")?;

        if !chosen.primary {
            ctx.fallback("using alternate header layout");
        }

        let input = chosen.locator;
        if let Err(e) = self.page.scroll_into_view(&input).await {
            debug!("scroll to search input failed: {:#}", e);
        }
        if let Err(e) = self.page.click(&input).await {
            ctx.fallback(format!("input click failed ({:#}), retrying after overlays", e));
            self.dismiss_overlays().await;
            if let Err(e) = self.page.click(&input).await {
                warn!("Search input could not be clicked: {:#}", e);
            }
        }
        Ok(input)
    }

    async fn fill_query(&self, ctx: &mut ResolverContext<'_>, input: &Locator) -> anyhow::Result<()> {
        let query = ctx.query();
        match self.page.fill(input, query).await {
            Ok(()) => Ok(()),
            Err(e) => {
                ctx.fallback(format!("fill failed ({:#}), assigning value by script", e));
                self.page
                    .assign_value(input, query)
                    .await
                    .context("Unable to enter search query")
            }
        }
    }

    async fn submit(&self, input: &Locator) -> anyhow::Result<()> {
        let actions = [
            SubmitAction::Click(site::SEARCH_SUBMIT),
            SubmitAction::Click(site::SEARCH_SUBMIT_FALLBACK),
            SubmitAction::PressEnter,
        ];
        first_success(&actions, |action| async move {
            match action {
                SubmitAction::Click(button) => {
                    if !self
                        .wait_for(button, WaitFor::Attached, self.config.submit_timeout)
                        .await
                    {
                        return Err(anyhow!("submit button not found ({})", button));
                    }
                    self.page.click(button).await
                }
                SubmitAction::PressEnter => self.page.press_enter(input).await,
            }
        })
        .await
        .context("Unable to submit search")
    }

    /// Wait until the submit lands on the results page or a product page.
    async fn wait_for_search_page(&self) -> Landing {
        let landed = self
            .poll(self.config.navigation_timeout, move || async move {
                self.page
                    .current_url()
                    .await
                    .map(|u| Landing::of(&u).is_some())
                    .unwrap_or(false)
            })
            .await;
        if !landed {
            return Landing::Elsewhere;
        }
        match self.page.current_url().await {
            Ok(url) => Landing::of(&url).unwrap_or(Landing::Elsewhere),
            Err(_) => Landing::Elsewhere,
        }
    }

    async fn first_product(&self, ctx: &mut ResolverContext<'_>) -> anyhow::Result<String> {
        if self
            .wait_for(&site::PRODUCT_LINK, WaitFor::Attached, self.config.element_timeout)
            .await
        {
            if let Some(href) = self.product_href().await {
                match self.navigate(&href).await {
                    Ok(()) => {
                        if let Some(current) = self.current_product_url().await {
                            return Ok(current);
                        }
                        return Ok(href);
                    }
                    Err(e) => {
                        ctx.fallback(format!("following product href failed ({:#}), clicking", e));
                        if let Err(e) = self.page.click(&site::PRODUCT_LINK).await {
                            debug!("product link click failed: {:#}", e);
                        }
                    }
                }
            }
        }

        if let Some(current) = self.current_product_url().await {
            return Ok(current);
        }

        ctx.fallback("scanning results HTML");
        self.scan_page_html()
            .await
            .ok_or_else(|| anyhow!("Unable to resolve product URL from search results."))
    }

    /// Click every visible overlay closer; failures are ignored.
    async fn dismiss_overlays(&self) -> usize {
        let mut dismissed = 0;
        for closer in site::OVERLAY_CLOSERS {
            if !matches!(self.page.element_state(closer).await, Ok(ElementState::Visible)) {
                continue;
            }
            match self.page.click(closer).await {
                Ok(()) => dismissed += 1,
                Err(e) => debug!("overlay {} not dismissed: {:#}", closer, e),
            }
        }
        if dismissed > 0 {
            debug!("dismissed {} overlays", dismissed);
        }
        dismissed
    }

    async fn product_href(&self) -> Option<String> {
        let href = self
            .page
            .attribute(&site::PRODUCT_LINK, "href")
            .await
            .ok()
            .flatten()?;
        let absolute = site::absolutize(href.trim());
        site::is_product_url(&absolute).then_some(absolute)
    }

    async fn current_product_url(&self) -> Option<String> {
        let current = self.page.current_url().await.ok()?;
        site::is_product_url(&current).then_some(current)
    }

    async fn scan_page_html(&self) -> Option<String> {
        let html = self.page.content().await.ok()?;
        site::scan_product_href(&html).filter(|u| site::is_product_url(u))
    }

    async fn navigate(&self, url: &str) -> anyhow::Result<()> {
        match timeout(self.config.navigation_timeout, self.page.goto(url)).await {
            Ok(result) => result.with_context(|| format!("Navigation to {} failed", url)),
            Err(_) => Err(anyhow!(
                "Navigation to {} timed out after {:?}",
                url,
                self.config.navigation_timeout
            )),
        }
    }

    async fn wait_for(&self, locator: &Locator, want: WaitFor, limit: Duration) -> bool {
        self.poll(limit, move || async move {
            self.page
                .element_state(locator)
                .await
                .map(|state| want.satisfied_by(state))
                .unwrap_or(false)
        })
        .await
    }

    /// Re-check `probe` until it holds or `limit` elapses. Always probes once.
    async fn poll<F, Fut>(&self, limit: Duration, mut probe: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = Instant::now() + limit;
        loop {
            if probe().await {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    async fn fail(&self, ctx: &ResolverContext<'_>, error: anyhow::Error) -> ScrapeError {
        let stage = ctx.stage();
        let message = format!("{:#}", error);
        warn!(
            "Resolver failed at {} for '{}': {} (fallbacks: {:?})",
            stage,
            ctx.query(),
            message,
            ctx.fallbacks()
        );
        if let Some(sink) = &self.snapshots {
            match self.write_snapshot(sink, stage).await {
                Ok(path) => warn!("Saved page snapshot to {}", path.display()),
                Err(e) => warn!("Could not save page snapshot: {:#}", e),
            }
        }
        ScrapeError::Navigation { stage, message }
    }

    async fn write_snapshot(&self, sink: &SnapshotSink, stage: Stage) -> anyhow::Result<PathBuf> {
        let html = self.page.content().await.unwrap_or_default();
        write_snapshot_file(&sink.dir, &sink.label, stage, &html)
    }
}

fn write_snapshot_file(dir: &Path, label: &str, stage: Stage, html: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{}_debug_resolve_{}_{}.html", label, stage, stamp));
    std::fs::write(&path, html).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
