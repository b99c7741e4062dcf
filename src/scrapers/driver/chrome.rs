//! headless_chrome backend for the driver runtime.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use tracing::{debug, info};

use super::{DriverLauncher, DriverSession};
use crate::scrapers::browser::LaunchConfig;
use crate::scrapers::resolver::{script, AutomationPage, ElementState, Locator};

/// Chrome exits on its own after this long without commands.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Clone)]
pub struct ChromeLauncher {
    config: LaunchConfig,
}

impl ChromeLauncher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }

    /// Default wait for the tab. Navigation blocks the calling thread, so
    /// this is the only bound on a page load.
    pub fn tab_timeout(&self) -> Duration {
        self.config.navigation_timeout()
    }
}

impl DriverLauncher for ChromeLauncher {
    type Driver = ChromeDriver;

    fn launch(&self) -> Result<ChromeDriver> {
        info!("Launching driver (headless={})", self.config.headless);
        let path = self.config.executable()?;
        let flags = self.config.flags();
        let args: Vec<&OsStr> = flags.iter().map(OsStr::new).collect();

        let options = LaunchOptions::default_builder()
            .headless(self.config.headless)
            .window_size(Some(self.config.window))
            .path(Some(path))
            .args(args)
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| anyhow!("Failed to build Chrome launch options: {}", e))?;
        let browser = Browser::new(options).context("Failed to launch headless Chrome")?;

        let tab = browser.new_tab().context("Failed to open driver tab")?;
        tab.set_default_timeout(self.tab_timeout());
        tab.set_user_agent(&self.config.user_agent, None, None)?;
        let headers: HashMap<&str, &str> = self
            .config
            .extra_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        tab.set_extra_http_headers(headers)?;

        Ok(ChromeDriver {
            browser,
            page: ChromeTab { tab },
        })
    }
}

/// A Chrome process and its single tab.
pub struct ChromeDriver {
    browser: Browser,
    page: ChromeTab,
}

impl DriverSession for ChromeDriver {
    type Page = ChromeTab;

    fn page(&self) -> &ChromeTab {
        &self.page
    }

    fn clear_state(&self) -> Result<()> {
        self.page
            .tab
            .call_method(Network::ClearBrowserCookies(None))?;
        Ok(())
    }

    fn quit(self) -> Result<()> {
        let ChromeDriver { browser, page } = self;
        drop(page);
        // Dropping the last Browser handle kills the process.
        drop(browser);
        Ok(())
    }
}

pub struct ChromeTab {
    tab: Arc<Tab>,
}

impl ChromeTab {
    fn eval(&self, expression: &str) -> Result<Option<serde_json::Value>> {
        let object = self.tab.evaluate(expression, false)?;
        Ok(object.value)
    }

    fn find(&self, locator: &Locator) -> Result<Element<'_>> {
        let element = match locator {
            Locator::XPath(xpath) => self.tab.find_element_by_xpath(xpath),
            Locator::Css(css) => self.tab.find_element(css),
        };
        element.with_context(|| format!("Element not found: {}", locator))
    }
}

#[async_trait(?Send)]
impl AutomationPage for ChromeTab {
    async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.tab.navigate_to(url)?.wait_until_navigated()?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn content(&self) -> Result<String> {
        self.tab.get_content()
    }

    async fn element_state(&self, locator: &Locator) -> Result<ElementState> {
        let value = self.eval(&script::element_state(locator))?;
        Ok(script::parse_element_state(value.as_ref()))
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        let value = self.eval(&script::attribute(locator, name))?;
        Ok(value.and_then(|v| v.as_str().map(str::to_string)))
    }

    async fn scroll_into_view(&self, locator: &Locator) -> Result<()> {
        let value = self.eval(&script::scroll_into_view(locator))?;
        script::expect_found(value.as_ref(), "scroll", locator)
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        match self.find(locator) {
            Ok(element) => match element.click() {
                Ok(_) => return Ok(()),
                Err(e) => debug!("Native click on {} failed: {}", locator, e),
            },
            Err(e) => debug!("{:#}", e),
        }
        let value = self.eval(&script::click(locator))?;
        script::expect_found(value.as_ref(), "click", locator)
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        let element = self.find(locator)?;
        let cleared = self.eval(&script::focus_and_clear(locator))?;
        script::expect_found(cleared.as_ref(), "focus", locator)?;
        element.type_into(text)?;
        Ok(())
    }

    async fn assign_value(&self, locator: &Locator, text: &str) -> Result<()> {
        let value = self.eval(&script::assign_value(locator, text))?;
        script::expect_found(value.as_ref(), "assign value", locator)
    }

    async fn press_enter(&self, locator: &Locator) -> Result<()> {
        let focused = self.eval(&script::focus(locator))?;
        script::expect_found(focused.as_ref(), "focus", locator)?;
        self.tab.press_key("Enter")?;
        Ok(())
    }
}
