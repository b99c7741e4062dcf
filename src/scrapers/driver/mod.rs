//! Shared synchronous browser driver.
//!
//! One driver is launched lazily and reused across calls to amortize the
//! launch cost. The driver is a single navigable session with no isolation
//! between users, so callers must serialize their use of it (for example
//! through a single-worker queue). The runtime only guards the handle.

#[cfg(feature = "driver")]
pub mod chrome;

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::error::{Result, ScrapeError};
use crate::scrapers::resolver::AutomationPage;

/// Creates driver sessions.
pub trait DriverLauncher: Send + Sync + 'static {
    type Driver: DriverSession;

    fn launch(&self) -> anyhow::Result<Self::Driver>;
}

/// A live driver process with one page.
pub trait DriverSession: Send + Sync + 'static {
    type Page: AutomationPage;

    fn page(&self) -> &Self::Page;

    /// Drop cookies and session state without restarting the process.
    fn clear_state(&self) -> anyhow::Result<()>;

    /// Terminate the driver process.
    fn quit(self) -> anyhow::Result<()>
    where
        Self: Sized;
}

pub struct DriverRuntime<L: DriverLauncher> {
    launcher: L,
    driver: Mutex<Option<Arc<L::Driver>>>,
}

impl<L: DriverLauncher> DriverRuntime<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            driver: Mutex::new(None),
        }
    }

    /// The launcher, for callers that need a private driver.
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn is_running(&self) -> bool {
        self.lock_driver().is_some()
    }

    /// Return the shared driver, launching it on first use.
    pub fn acquire(&self) -> Result<Arc<L::Driver>> {
        let mut slot = self.lock_driver();
        if let Some(driver) = slot.as_ref() {
            return Ok(Arc::clone(driver));
        }
        info!("Launching shared driver");
        let driver = self
            .launcher
            .launch()
            .map_err(|e| ScrapeError::execution(format!("Failed to launch driver: {:#}", e)))?;
        let driver = Arc::new(driver);
        *slot = Some(Arc::clone(&driver));
        Ok(driver)
    }

    /// Clear cookies and session state on the shared driver, if one is running.
    pub fn reset(&self) {
        let driver = self.lock_driver().clone();
        if let Some(driver) = driver {
            match driver.clear_state() {
                Ok(()) => info!("Shared driver state cleared"),
                Err(e) => warn!("Failed to clear driver state: {:#}", e),
            }
        }
    }

    /// Terminate the shared driver. The next `acquire` launches a new one.
    pub fn close(&self) {
        let Some(driver) = self.lock_driver().take() else {
            return;
        };
        match Arc::try_unwrap(driver) {
            Ok(driver) => match driver.quit() {
                Ok(()) => info!("Shared driver closed"),
                Err(e) => warn!("Driver did not quit cleanly: {:#}", e),
            },
            // The process goes away when the last user drops its handle.
            Err(_) => warn!("Shared driver still in use; releasing it without quit"),
        }
    }

    fn lock_driver(&self) -> MutexGuard<'_, Option<Arc<L::Driver>>> {
        self.driver.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<L: DriverLauncher> Drop for DriverRuntime<L> {
    fn drop(&mut self) {
        self.close();
    }
}
