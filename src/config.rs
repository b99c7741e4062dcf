//! Runtime settings for the scraping core.
//!
//! Settings come from an optional TOML file, then environment variables
//! (a `.env` file is loaded by the binary before anything else).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::scrapers::browser::RuntimeOptions;
use crate::scrapers::resolver::ResolverConfig;

/// Settings consumed by runtimes, strategies and the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    /// Cache resolved query URLs in-process.
    pub cache_enabled: bool,
    /// Maximum number of cached query resolutions.
    pub cache_capacity: usize,

    /// Share one long-lived browser across async-strategy calls.
    pub browser_reuse: bool,
    /// Share one long-lived driver across driver-strategy calls.
    pub driver_reuse: bool,
    /// Warm the shared browser up in the background at startup.
    pub browser_warmup: bool,
    /// Warm the shared driver up in the background at startup.
    pub driver_warmup: bool,

    /// How long a caller waits for a browser job, in seconds.
    pub job_timeout_secs: u64,
    /// How long a caller waits for the browser worker to come up, in seconds.
    pub startup_timeout_secs: u64,
    /// How long `close` waits for the browser worker to exit, in seconds.
    pub close_timeout_secs: u64,

    /// Page navigation timeout in milliseconds.
    pub navigation_timeout_ms: u64,
    /// Wait for the page-loading overlay to disappear, in milliseconds.
    pub overlay_timeout_ms: u64,
    /// Wait for elements to attach or become visible, in milliseconds.
    pub element_timeout_ms: u64,

    /// Static fetch timeout in seconds.
    pub http_timeout_secs: u64,
    /// Static fetch user agent: unset for the desktop browser agent,
    /// "impersonate", "honest", or a custom string.
    pub http_user_agent: Option<String>,

    /// Run browsers headless.
    pub headless: bool,
    /// Explicit Chrome/Chromium executable (autodetected when unset).
    pub chrome_executable: Option<PathBuf>,
    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    pub proxy: Option<String>,

    /// Where resolver failure snapshots are written.
    pub debug_dir: PathBuf,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_capacity: crate::scrapers::cache::DEFAULT_CAPACITY,
            browser_reuse: true,
            driver_reuse: false,
            browser_warmup: false,
            driver_warmup: false,
            job_timeout_secs: 90,
            startup_timeout_secs: 60,
            close_timeout_secs: 10,
            navigation_timeout_ms: 60_000,
            overlay_timeout_ms: 20_000,
            element_timeout_ms: 20_000,
            http_timeout_secs: 15,
            http_user_agent: None,
            headless: true,
            chrome_executable: None,
            proxy: None,
            debug_dir: PathBuf::from("temp"),
        }
    }
}

impl ScrapeSettings {
    /// Load settings from a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply environment variable overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str, current: bool| {
            lookup(key)
                .and_then(|v| parse_flag(&v))
                .unwrap_or(current)
        };
        let number = |key: &str, current: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(current)
        };

        self.cache_enabled = flag("SCRAPER_CACHE_ENABLED", self.cache_enabled);
        self.cache_capacity = number("SCRAPER_CACHE_CAPACITY", self.cache_capacity as u64) as usize;
        self.browser_reuse = flag("BROWSER_REUSE", self.browser_reuse);
        self.driver_reuse = flag("DRIVER_REUSE", self.driver_reuse);
        self.browser_warmup = flag("BROWSER_WARMUP_ON_STARTUP", self.browser_warmup);
        self.driver_warmup = flag("DRIVER_WARMUP_ON_STARTUP", self.driver_warmup);
        self.job_timeout_secs = number("BROWSER_JOB_TIMEOUT_SECS", self.job_timeout_secs);
        self.startup_timeout_secs = number("BROWSER_STARTUP_TIMEOUT_SECS", self.startup_timeout_secs);
        self.close_timeout_secs = number("BROWSER_CLOSE_TIMEOUT_SECS", self.close_timeout_secs);
        self.navigation_timeout_ms = number("NAVIGATION_TIMEOUT_MS", self.navigation_timeout_ms);
        self.overlay_timeout_ms = number("OVERLAY_WAIT_TIMEOUT_MS", self.overlay_timeout_ms);
        self.element_timeout_ms = number("ELEMENT_WAIT_TIMEOUT_MS", self.element_timeout_ms);
        self.http_timeout_secs = number("HTTP_TIMEOUT_SECS", self.http_timeout_secs);
        self.headless = flag("BROWSER_HEADLESS", self.headless);

        if let Some(path) = lookup("CHROME_BINARY").filter(|v| !v.trim().is_empty()) {
            self.chrome_executable = Some(PathBuf::from(path.trim()));
        }
        if let Some(agent) = lookup("HTTP_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            self.http_user_agent = Some(agent.trim().to_string());
        }
        if let Some(proxy) = lookup("SCRAPER_PROXY").filter(|v| !v.trim().is_empty()) {
            self.proxy = Some(proxy.trim().to_string());
        }
        if let Some(dir) = lookup("SCRAPER_DEBUG_DIR").filter(|v| !v.trim().is_empty()) {
            self.debug_dir = PathBuf::from(dir.trim());
        }

        self
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Caller-side timeouts for the shared browser runtime.
    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            job_timeout: self.job_timeout(),
            startup_timeout: self.startup_timeout(),
            close_timeout: self.close_timeout(),
        }
    }

    /// Resolver timings derived from these settings.
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            navigation_timeout: Duration::from_millis(self.navigation_timeout_ms),
            overlay_timeout: Duration::from_millis(self.overlay_timeout_ms),
            element_timeout: Duration::from_millis(self.element_timeout_ms),
            ..ResolverConfig::default()
        }
    }
}

/// Parse a boolean-ish environment value.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Load settings: optional file first, then environment overrides.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ScrapeSettings> {
    let base = match path {
        Some(path) => ScrapeSettings::from_file(path)?,
        None => ScrapeSettings::default(),
    };
    Ok(base.with_env_overrides())
}
