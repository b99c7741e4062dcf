//! chromiumoxide backend for the async browser runtime.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserLauncher, BrowserSession, LaunchConfig};
use crate::scrapers::resolver::{script, AutomationPage, ElementState, Locator};

/// Launches Chrome over CDP with chromiumoxide.
#[derive(Clone)]
pub struct ChromiumLauncher {
    config: LaunchConfig,
}

impl ChromiumLauncher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }
}

/// A launched browser and the task pumping its CDP connection.
pub struct ChromiumBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    config: LaunchConfig,
}

#[async_trait(?Send)]
impl BrowserLauncher for ChromiumLauncher {
    type Browser = ChromiumBrowser;

    async fn launch(&self) -> Result<ChromiumBrowser> {
        info!("Launching browser (headless={})", self.config.headless);
        let chrome_path = self.config.executable()?;

        let (width, height) = self.config.window;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(width, height);

        // Set headless mode (with_head means NOT headless, confusingly)
        if !self.config.headless {
            builder = builder.with_head();
        }
        for flag in self.config.flags() {
            builder = builder.arg(flag);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        // Spawn handler task
        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(ChromiumBrowser {
            browser,
            handler,
            config: self.config.clone(),
        })
    }

    async fn shutdown(&self, mut browser: ChromiumBrowser) {
        if let Err(e) = browser.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        let _ = browser.browser.wait().await;
        browser.handler.abort();
        info!("Browser closed");
    }
}

#[async_trait(?Send)]
impl BrowserSession for ChromiumBrowser {
    type Page = ChromiumPage;

    async fn open_page(&self) -> Result<ChromiumPage> {
        let context = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("Failed to create browser context")?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid target params: {}", e))?;
        let page = match self.browser.new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                self.dispose_context(context).await;
                return Err(e).context("Failed to open page");
            }
        };

        let page = ChromiumPage {
            page,
            context: Some(context),
        };
        page.prepare(&self.config).await?;
        Ok(page)
    }

    async fn close_page(&self, page: ChromiumPage) {
        let ChromiumPage { page, context } = page;
        if let Err(e) = page.close().await {
            debug!("Page close failed: {}", e);
        }
        if let Some(context) = context {
            self.dispose_context(context).await;
        }
    }
}

impl ChromiumBrowser {
    async fn dispose_context(&self, context: BrowserContextId) {
        if let Err(e) = self
            .browser
            .execute(DisposeBrowserContextParams::new(context))
            .await
        {
            debug!("Browser context disposal failed: {}", e);
        }
    }
}

/// One tab in its own browsing context.
pub struct ChromiumPage {
    page: Page,
    context: Option<BrowserContextId>,
}

impl ChromiumPage {
    /// Apply user agent and extra headers before any navigation.
    async fn prepare(&self, config: &LaunchConfig) -> Result<()> {
        self.page
            .execute(SetUserAgentOverrideParams::new(config.user_agent.clone()))
            .await
            .context("Failed to set user agent")?;

        let headers: HashMap<&str, &str> = config
            .extra_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let headers = Headers::new(serde_json::to_value(headers)?);
        self.page
            .execute(SetExtraHttpHeadersParams::new(headers))
            .await
            .context("Failed to set extra headers")?;
        Ok(())
    }

    async fn eval(&self, expression: String) -> Result<Option<serde_json::Value>> {
        let result = self.page.evaluate(expression).await?;
        Ok(result.value().cloned())
    }

    async fn find(&self, locator: &Locator) -> Result<Element> {
        let element = match locator {
            Locator::XPath(xpath) => self.page.find_xpath(*xpath).await,
            Locator::Css(css) => self.page.find_element(*css).await,
        };
        element.with_context(|| format!("Element not found: {}", locator))
    }
}

#[async_trait(?Send)]
impl AutomationPage for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.page.goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn element_state(&self, locator: &Locator) -> Result<ElementState> {
        let value = self.eval(script::element_state(locator)).await?;
        Ok(script::parse_element_state(value.as_ref()))
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        let value = self.eval(script::attribute(locator, name)).await?;
        Ok(value.and_then(|v| v.as_str().map(str::to_string)))
    }

    async fn scroll_into_view(&self, locator: &Locator) -> Result<()> {
        let value = self.eval(script::scroll_into_view(locator)).await?;
        script::expect_found(value.as_ref(), "scroll", locator)
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        match self.find(locator).await {
            Ok(element) => match element.click().await {
                Ok(_) => return Ok(()),
                Err(e) => debug!("Native click on {} failed: {}", locator, e),
            },
            Err(e) => debug!("{:#}", e),
        }
        // Scripted click works through overlays that intercept the pointer.
        let value = self.eval(script::click(locator)).await?;
        script::expect_found(value.as_ref(), "click", locator)
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        let element = self.find(locator).await?;
        let cleared = self.eval(script::focus_and_clear(locator)).await?;
        script::expect_found(cleared.as_ref(), "focus", locator)?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn assign_value(&self, locator: &Locator, text: &str) -> Result<()> {
        let value = self.eval(script::assign_value(locator, text)).await?;
        script::expect_found(value.as_ref(), "assign value", locator)
    }

    async fn press_enter(&self, locator: &Locator) -> Result<()> {
        self.find(locator).await?.press_key("Enter").await?;
        Ok(())
    }
}
