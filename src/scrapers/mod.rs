//! Scraping core: strategies, the runtimes behind them and the resolver.

pub mod browser;
pub mod cache;
pub mod driver;
pub mod http_client;
pub mod pool;
pub mod resolver;
pub mod strategies;
pub mod strategy;

pub use cache::QueryCache;
pub use pool::ScraperPool;
pub use strategy::{ParsingStrategy, StrategyKind};
