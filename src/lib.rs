//! brainscrape - product record extraction for a single e-commerce site.
//!
//! Three interchangeable strategies produce a [`ProductRecord`]: a static
//! HTTP fetch, a synchronous browser driver, and async browser automation.
//! The browser-backed strategies share a query cache and a navigation
//! resolver that turns a free-text query into a product URL.

pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod scrapers;

pub use config::{load_settings, ScrapeSettings};
pub use error::{ErrorKind, Result, ScrapeError};
pub use extract::{Extractor, JsonLdExtractor};
pub use models::ProductRecord;
pub use scrapers::{ParsingStrategy, QueryCache, ScraperPool, StrategyKind};
