//! Browser launch configuration shared by both automation backends.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ScrapeSettings;
use crate::scrapers::resolver::site::{BROWSER_EXTRA_HEADERS, BROWSER_USER_AGENT};

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// Flags passed to every launched browser.
pub const CHROME_FLAGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--no-sandbox", // Often needed for headless in containers/restricted environments
    "--disable-gpu",
    "--disable-software-rasterizer",
];

/// How a browser process is launched and how its pages are set up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Explicit browser executable; autodetected when unset.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Extra request headers applied to every page.
    #[serde(default = "default_extra_headers")]
    pub extra_headers: Vec<(String, String)>,

    /// Window size in pixels.
    #[serde(default = "default_window")]
    pub window: (u32, u32),

    /// Upper bound for a page load, applied by backends that block on
    /// navigation instead of awaiting it.
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
}

pub fn default_headless() -> bool {
    true
}

fn default_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}

fn default_extra_headers() -> Vec<(String, String)> {
    BROWSER_EXTRA_HEADERS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_window() -> (u32, u32) {
    (1920, 1080)
}

fn default_navigation_timeout_ms() -> u64 {
    60_000
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            proxy: None,
            chrome_executable: None,
            chrome_args: Vec::new(),
            user_agent: default_user_agent(),
            extra_headers: default_extra_headers(),
            window: default_window(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
        }
    }
}

impl LaunchConfig {
    pub fn from_settings(settings: &ScrapeSettings) -> Self {
        Self {
            headless: settings.headless,
            proxy: settings.proxy.clone(),
            chrome_executable: settings.chrome_executable.clone(),
            navigation_timeout_ms: settings.navigation_timeout_ms,
            ..Self::default()
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Every command-line flag for a launch, including proxy and custom args.
    pub fn flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = CHROME_FLAGS.iter().map(|f| f.to_string()).collect();
        if let Some(ref proxy) = self.proxy {
            flags.push(format!("--proxy-server={}", proxy));
        }
        flags.extend(self.chrome_args.iter().cloned());
        flags
    }

    /// Resolve the browser executable to launch.
    pub fn executable(&self) -> Result<PathBuf> {
        find_chrome(self.chrome_executable.as_deref())
    }
}

/// Find a Chrome executable, preferring an explicit path.
pub fn find_chrome(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow::anyhow!(
            "Configured Chrome executable does not exist: {}",
            path.display()
        ));
    }

    // First, check common paths
    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    // Check if in PATH via `which`
    for cmd in &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    info!("Found Chrome in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(anyhow::anyhow!(
        "Chrome/Chromium not found. Please install it:\n\
         - Arch/Manjaro: sudo pacman -S chromium\n\
         - Ubuntu/Debian: sudo apt install chromium-browser\n\
         - Fedora: sudo dnf install chromium\n\
         - Or set CHROME_BINARY to an existing executable"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_include_proxy_and_custom_args() {
        let config = LaunchConfig {
            proxy: Some("socks5://127.0.0.1:1080".into()),
            chrome_args: vec!["--lang=uk".into()],
            ..Default::default()
        };
        let flags = config.flags();
        assert!(flags.contains(&"--no-sandbox".to_string()));
        assert!(flags.contains(&"--proxy-server=socks5://127.0.0.1:1080".to_string()));
        assert_eq!(flags.last().map(String::as_str), Some("--lang=uk"));
    }

    #[test]
    fn test_explicit_missing_executable_is_an_error() {
        let err = find_chrome(Some(Path::new("/nonexistent/chrome"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/chrome"));
    }

    #[test]
    fn test_from_settings() {
        let settings = ScrapeSettings {
            headless: false,
            proxy: Some("http://proxy:3128".into()),
            navigation_timeout_ms: 45_000,
            ..Default::default()
        };
        let config = LaunchConfig::from_settings(&settings);
        assert!(!config.headless);
        assert_eq!(config.navigation_timeout(), Duration::from_secs(45));
        assert_eq!(config.window, (1920, 1080));
        assert!(config
            .extra_headers
            .iter()
            .any(|(k, v)| k == "DNT" && v == "1"));
    }
}
