//! Shared async browser owned by a dedicated worker thread.
//!
//! The browser is not thread-safe, so exactly one thread ever touches it.
//! That thread runs a single-threaded tokio runtime and receives jobs over a
//! channel; callers on any other thread submit a job and block on a reply
//! channel with a timeout. The worker is started lazily on first use and
//! restarted after `close`.
//!
//! A timed-out job is not cancelled. It keeps running on the worker until it
//! finishes or the runtime is closed.

mod config;

#[cfg(feature = "browser")]
pub mod chromium;

pub use config::{find_chrome, LaunchConfig, CHROME_FLAGS};

use std::future::Future;
use std::rc::Rc;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};
use crate::scrapers::resolver::AutomationPage;

/// Launches and tears down the browser owned by the worker thread.
///
/// Both methods run on the worker thread, inside its event loop.
#[async_trait(?Send)]
pub trait BrowserLauncher: Send + Sync + 'static {
    type Browser: 'static;

    async fn launch(&self) -> anyhow::Result<Self::Browser>;

    async fn shutdown(&self, browser: Self::Browser);
}

/// Isolated pages on a shared browser. One page (and browsing context) per job.
#[async_trait(?Send)]
pub trait BrowserSession: 'static {
    type Page: AutomationPage + 'static;

    async fn open_page(&self) -> anyhow::Result<Self::Page>;

    /// Close the page and its browsing context. Never fails.
    async fn close_page(&self, page: Self::Page);
}

/// Timeouts governing callers of a [`BrowserRuntime`].
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// How long a caller waits for a job result.
    pub job_timeout: Duration,
    /// How long a caller waits for the worker to launch the browser.
    pub startup_timeout: Duration,
    /// How long `close` waits for the worker to exit.
    pub close_timeout: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(90),
            startup_timeout: Duration::from_secs(60),
            close_timeout: Duration::from_secs(10),
        }
    }
}

type Job<B> = Box<dyn FnOnce(Rc<B>) -> LocalBoxFuture<'static, ()> + Send>;

enum Command<B> {
    Run(Job<B>),
    Shutdown,
}

/// A live worker. The command channel and the owner thread identity are
/// published and torn down together.
struct Worker<B> {
    commands: mpsc::UnboundedSender<Command<B>>,
    thread: JoinHandle<()>,
    owner: ThreadId,
    done: std_mpsc::Receiver<()>,
}

pub struct BrowserRuntime<L: BrowserLauncher> {
    launcher: Arc<L>,
    options: RuntimeOptions,
    worker: Mutex<Option<Worker<L::Browser>>>,
}

impl<L: BrowserLauncher> BrowserRuntime<L> {
    pub fn new(launcher: L, options: RuntimeOptions) -> Self {
        Self {
            launcher: Arc::new(launcher),
            options,
            worker: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Whether a worker is up and accepting jobs.
    pub fn is_running(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(|w| !w.commands.is_closed())
    }

    /// Thread that owns the browser, if the worker is running.
    pub fn owner_thread(&self) -> Option<ThreadId> {
        self.lock_worker().as_ref().map(|w| w.owner)
    }

    /// Start the worker now instead of on first job.
    pub fn start(&self) -> Result<()> {
        self.ensure_worker(&mut self.lock_worker())
    }

    /// Run a job with the default job timeout.
    pub fn run<F, Fut, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(Rc<L::Browser>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + 'static,
        T: Send + 'static,
    {
        self.run_with_timeout(self.options.job_timeout, job)
    }

    /// Run a job on the worker and block until it finishes or `limit` elapses.
    ///
    /// Fails fast with a runtime error when called from the worker thread.
    pub fn run_with_timeout<F, Fut, T>(&self, limit: Duration, job: F) -> Result<T>
    where
        F: FnOnce(Rc<L::Browser>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + 'static,
        T: Send + 'static,
    {
        if self.owner_thread() == Some(thread::current().id()) {
            return Err(ScrapeError::Runtime(
                "cannot wait on the browser runtime from its own worker thread".to_string(),
            ));
        }

        let (reply_tx, reply_rx) = std_mpsc::sync_channel::<Result<T>>(1);
        let job: Job<L::Browser> = Box::new(move |browser| {
            Box::pin(async move {
                let outcome = job(browser).await;
                // The caller may have timed out and gone away.
                let _ = reply_tx.send(outcome);
            })
        });
        self.submit(job)?;

        match reply_rx.recv_timeout(limit) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                warn!("Browser job exceeded {:?}; it keeps running in the background", limit);
                Err(ScrapeError::timeout("browser job", limit))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ScrapeError::execution(
                "Browser job was dropped before completing",
            )),
        }
    }

    /// Stop the worker and release the browser. The next job starts a fresh one.
    pub fn close(&self) {
        let Some(worker) = self.lock_worker().take() else {
            return;
        };
        info!("Shutting down browser runtime");
        let _ = worker.commands.send(Command::Shutdown);

        if worker.owner == thread::current().id() {
            warn!("Browser runtime closed from its own worker; not waiting for exit");
            return;
        }

        match worker.done.recv_timeout(self.options.close_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.thread.join().is_err() {
                    warn!("Browser worker thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Browser worker did not exit within {:?}; detaching it",
                    self.options.close_timeout
                );
            }
        }
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker<L::Browser>>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn submit(&self, job: Job<L::Browser>) -> Result<()> {
        let mut guard = self.lock_worker();
        self.ensure_worker(&mut guard)?;
        let worker = guard
            .as_ref()
            .ok_or_else(|| ScrapeError::Runtime("browser worker unavailable".to_string()))?;
        worker
            .commands
            .send(Command::Run(job))
            .map_err(|_| ScrapeError::Runtime("browser worker stopped accepting jobs".to_string()))
    }

    /// Start the worker if there is none or the previous one died.
    ///
    /// Runs under the worker lock, so concurrent first calls launch once.
    fn ensure_worker(&self, slot: &mut Option<Worker<L::Browser>>) -> Result<()> {
        if slot.as_ref().is_some_and(|w| !w.commands.is_closed()) {
            return Ok(());
        }
        if slot.take().is_some() {
            warn!("Browser worker exited unexpectedly; restarting");
        }
        *slot = Some(self.spawn_worker()?);
        Ok(())
    }

    fn spawn_worker(&self) -> Result<Worker<L::Browser>> {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<std::result::Result<(), String>>(1);
        let (done_tx, done_rx) = std_mpsc::sync_channel::<()>(1);
        let launcher = Arc::clone(&self.launcher);

        info!("Starting browser runtime");
        let thread = thread::Builder::new()
            .name("browser-runtime".to_string())
            .spawn(move || {
                worker_main(launcher, receiver, ready_tx);
                let _ = done_tx.send(());
            })?;
        let owner = thread.thread().id();

        match ready_rx.recv_timeout(self.options.startup_timeout) {
            Ok(Ok(())) => {
                info!("Browser runtime ready");
                Ok(Worker {
                    commands,
                    thread,
                    owner,
                    done: done_rx,
                })
            }
            Ok(Err(message)) => {
                let _ = thread.join();
                Err(ScrapeError::execution(format!(
                    "Failed to launch browser: {}",
                    message
                )))
            }
            Err(RecvTimeoutError::Timeout) => {
                // Dropping the sender makes the worker shut down once the launch finishes.
                drop(commands);
                Err(ScrapeError::timeout(
                    "browser startup",
                    self.options.startup_timeout,
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = thread.join();
                Err(ScrapeError::Runtime(
                    "browser worker exited during startup".to_string(),
                ))
            }
        }
    }
}

impl<L: BrowserLauncher> Drop for BrowserRuntime<L> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Body of the worker thread: launch, serve jobs, shut down.
fn worker_main<L: BrowserLauncher>(
    launcher: Arc<L>,
    mut commands: mpsc::UnboundedReceiver<Command<L::Browser>>,
    ready: std_mpsc::SyncSender<std::result::Result<(), String>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(format!("failed to build event loop: {}", e)));
            return;
        }
    };

    runtime.block_on(async move {
        let browser = match launcher.launch().await {
            Ok(browser) => Rc::new(browser),
            Err(e) => {
                let _ = ready.send(Err(format!("{:#}", e)));
                return;
            }
        };
        let _ = ready.send(Ok(()));

        let jobs = LocalSet::new();
        jobs.run_until(async {
            while let Some(command) = commands.recv().await {
                match command {
                    Command::Run(job) => {
                        tokio::task::spawn_local(job(Rc::clone(&browser)));
                    }
                    Command::Shutdown => break,
                }
            }
        })
        .await;
        // Dropping the set cancels unfinished jobs and releases their browser handles.
        drop(jobs);

        match Rc::try_unwrap(browser) {
            Ok(browser) => launcher.shutdown(browser).await,
            Err(_) => warn!("Browser still referenced at shutdown; dropping without close"),
        }
        debug!("Browser worker finished");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLauncher {
        launches: Arc<AtomicUsize>,
        shutdowns: Arc<AtomicUsize>,
    }

    #[async_trait(?Send)]
    impl BrowserLauncher for CountingLauncher {
        type Browser = usize;

        async fn launch(&self) -> anyhow::Result<usize> {
            Ok(self.launches.fetch_add(1, Ordering::SeqCst) + 1)
        }

        async fn shutdown(&self, _browser: usize) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn runtime() -> (BrowserRuntime<CountingLauncher>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let launches = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let runtime = BrowserRuntime::new(
            CountingLauncher {
                launches: Arc::clone(&launches),
                shutdowns: Arc::clone(&shutdowns),
            },
            RuntimeOptions {
                job_timeout: Duration::from_secs(5),
                startup_timeout: Duration::from_secs(5),
                close_timeout: Duration::from_secs(5),
            },
        );
        (runtime, launches, shutdowns)
    }

    #[test]
    fn test_lazy_start_and_job_result() {
        let (runtime, launches, _) = runtime();
        assert!(!runtime.is_running());
        assert_eq!(launches.load(Ordering::SeqCst), 0);

        let generation = runtime.run(|browser| async move { Ok(*browser) }).unwrap();
        assert_eq!(generation, 1);
        assert!(runtime.is_running());
        assert_ne!(runtime.owner_thread(), Some(thread::current().id()));
    }

    #[test]
    fn test_close_shuts_browser_down_on_worker() {
        let (runtime, _, shutdowns) = runtime();
        runtime.start().unwrap();
        runtime.close();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert!(!runtime.is_running());
        assert_eq!(runtime.owner_thread(), None);
        // Closing twice is harmless.
        runtime.close();
    }

    #[test]
    fn test_job_errors_pass_through() {
        let (runtime, _, _) = runtime();
        let err = runtime
            .run(|_| async move { Err::<(), _>(ScrapeError::execution("page crashed")) })
            .unwrap_err();
        assert_eq!(err.to_string(), "page crashed");
    }

    #[test]
    fn test_launch_failure_is_reported() {
        struct FailingLauncher;

        #[async_trait(?Send)]
        impl BrowserLauncher for FailingLauncher {
            type Browser = ();

            async fn launch(&self) -> anyhow::Result<()> {
                Err(anyhow::anyhow!("chrome missing"))
            }

            async fn shutdown(&self, _browser: ()) {}
        }

        let runtime = BrowserRuntime::new(FailingLauncher, RuntimeOptions::default());
        let err = runtime.run(|_| async move { Ok(()) }).unwrap_err();
        assert!(err.to_string().contains("chrome missing"));
        assert!(!runtime.is_running());
    }
}
