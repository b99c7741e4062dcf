//! Driver strategy: a synchronous browser driver, shared or per call.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::runtime::Builder;
use tokio::time::timeout;
use tracing::{info, warn};

use super::{build_record, PageFlow};
use crate::error::{Result, ScrapeError};
use crate::extract::Extractor;
use crate::models::ProductRecord;
use crate::scrapers::driver::{DriverLauncher, DriverRuntime, DriverSession};
use crate::scrapers::resolver::{site, AutomationPage};
use crate::scrapers::strategy::{ParsingStrategy, StrategyKind};

/// A driver borrowed for one parse.
enum Lease<D: DriverSession> {
    Shared(Arc<D>),
    Private(D),
}

impl<D: DriverSession> Lease<D> {
    fn driver(&self) -> &D {
        match self {
            Lease::Shared(driver) => driver.as_ref(),
            Lease::Private(driver) => driver,
        }
    }

    fn release(self) {
        if let Lease::Private(driver) = self {
            if let Err(e) = driver.quit() {
                warn!("Private driver did not quit cleanly: {:#}", e);
            }
        }
    }
}

pub struct DriverStrategy<L: DriverLauncher> {
    runtime: Arc<DriverRuntime<L>>,
    reuse: bool,
    warm_up: bool,
    flow: PageFlow,
    extractor: Arc<dyn Extractor>,
    /// The shared driver has one page; parses take turns on it.
    turn: Mutex<()>,
}

impl<L: DriverLauncher> DriverStrategy<L> {
    pub fn new(
        runtime: Arc<DriverRuntime<L>>,
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
            turn: Mutex::new(()),
        }
    }

    /// Load the home page on the shared driver at startup (reuse mode only).
    pub fn with_warm_up(mut self, enabled: bool) -> Self {
        self.warm_up = enabled;
        self
    }

    pub fn runtime(&self) -> &Arc<DriverRuntime<L>> {
        &self.runtime
    }

    /// Drive `future` to completion on the calling thread, on an executor
    /// that lives only for this call.
    fn block_on<F: Future>(&self, future: F) -> Result<F::Output> {
        let executor = Builder::new_current_thread().enable_all().build()?;
        Ok(executor.block_on(future))
    }

    fn lease(&self) -> Result<Lease<L::Driver>> {
        if self.reuse {
            let driver = self.runtime.acquire()?;
            self.runtime.reset();
            Ok(Lease::Shared(driver))
        } else {
            info!("Launching private driver");
            let driver = self.runtime.launcher().launch().map_err(|e| {
                ScrapeError::execution(format!("Failed to launch driver: {:#}", e))
            })?;
            Ok(Lease::Private(driver))
        }
    }
}

impl<L: DriverLauncher> ParsingStrategy for DriverStrategy<L> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Driver
    }

    fn parse_inner(&self, query: Option<&str>, url: Option<&str>) -> Result<ProductRecord> {
        let _turn = self
            .reuse
            .then(|| self.turn.lock().unwrap_or_else(|e| e.into_inner()));

        let lease = self.lease()?;
        let loaded = self.block_on(self.flow.load(lease.driver().page(), query, url));
        lease.release();

        let loaded = loaded??;
        build_record(self.extractor.as_ref(), &loaded.html, &loaded.url, self.kind())
    }

    fn wants_warm_up(&self) -> bool {
        self.warm_up && self.reuse
    }

    fn warm_up(&self) -> Result<()> {
        let _turn = self.turn.lock().unwrap_or_else(|e| e.into_inner());
        let driver = self.runtime.acquire()?;
        let limit = self.flow.resolver.navigation_timeout;
        self.block_on(async {
            match timeout(limit, driver.page().goto(site::HOME_URL)).await {
                Ok(result) => result.map_err(ScrapeError::from),
                Err(_) => Err(ScrapeError::timeout("driver warm-up", limit)),
            }
        })??;
        info!("Driver warmed up");
        Ok(())
    }

    fn close(&self) {
        self.runtime.close();
    }
}
