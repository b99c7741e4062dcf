//! Blocking HTTP fetch used by the static strategy.

mod user_agent;

pub use user_agent::{resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::config::ScrapeSettings;
use crate::error::{Result, ScrapeError};
use crate::scrapers::resolver::site::BROWSER_EXTRA_HEADERS;

/// A fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Source of raw page HTML for a URL.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// reqwest-backed fetcher sending browser-like headers.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with custom user agent configuration.
    /// See [`resolve_user_agent`] for accepted values.
    pub fn new(
        timeout: Duration,
        user_agent_config: Option<&str>,
        proxy: Option<&str>,
    ) -> Result<Self> {
        let user_agent = resolve_user_agent(user_agent_config);

        let mut headers = HeaderMap::new();
        for &(name, value) in BROWSER_EXTRA_HEADERS {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| anyhow::anyhow!("Invalid header name {}: {}", name, e))?;
            headers.insert(name, HeaderValue::from_static(value));
        }

        let mut builder = Client::builder()
            .user_agent(&user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true);
        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_settings(settings: &ScrapeSettings) -> Result<Self> {
        Self::new(
            settings.http_timeout(),
            settings.http_user_agent.as_deref(),
            settings.proxy.as_deref(),
        )
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let start = Instant::now();
        let response = self.client.get(url).send()?;
        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        debug!(
            "GET {} -> {} in {}ms",
            url,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        if !status.is_success() {
            warn!("Fetching {} returned HTTP {}", url, status.as_u16());
            return Err(ScrapeError::execution(format!(
                "HTTP {} fetching {}",
                status.as_u16(),
                url
            )));
        }

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            body: response.text()?,
        })
    }
}
