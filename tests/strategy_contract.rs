//! Strategy contract: input validation, error taxonomy and the record shape
//! every strategy returns.

mod common;

use std::sync::Arc;

use brainscrape::models::ProductRecord;
use brainscrape::scrapers::browser::BrowserRuntime;
use brainscrape::scrapers::resolver::ResolverConfig;
use brainscrape::scrapers::strategies::{AutomationStrategy, PageFlow, StaticStrategy};
use brainscrape::{ErrorKind, ParsingStrategy, QueryCache, ScraperPool, StrategyKind};

use common::{quick_options, FailingFetcher, StubExtractor, StubFetcher, StubLauncher};

fn sample_record() -> ProductRecord {
    ProductRecord {
        product_code: "123".into(),
        name: "X".into(),
        price: Some(10.0),
        source_url: "https://elsewhere/ignored".into(),
        ..Default::default()
    }
}

fn static_strategy(record: Option<ProductRecord>) -> StaticStrategy {
    StaticStrategy::new(
        Arc::new(StubFetcher {
            body: "<html></html>".into(),
        }),
        Arc::new(StubExtractor { record }),
    )
}

#[test]
fn test_static_end_to_end() {
    let strategy = static_strategy(Some(sample_record()));
    let record = strategy
        .parse(None, Some("https://site/example-p123.html"))
        .unwrap();

    assert_eq!(record.product_code, "123");
    assert_eq!(record.name, "X");
    assert_eq!(record.price, Some(10.0));
    assert_eq!(record.source_url, "https://site/example-p123.html");
    assert_eq!(record.metadata["strategy"], "static");
}

#[test]
fn test_empty_inputs_are_configuration_errors() {
    let strategy = static_strategy(Some(sample_record()));
    for (query, url) in [(None, None), (Some(""), Some("   ")), (Some("\t"), None)] {
        let err = strategy.parse(query, url).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "Either 'query' or 'url' must be provided.");
    }
}

#[test]
fn test_missing_product_code_is_execution_error() {
    let strategy = static_strategy(Some(ProductRecord {
        name: "No code".into(),
        ..Default::default()
    }));
    let err = strategy.parse(None, Some("https://site/a-p1.html")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
}

#[test]
fn test_fetch_failure_is_execution_error() {
    let strategy = StaticStrategy::new(
        Arc::new(FailingFetcher),
        Arc::new(StubExtractor::returning(sample_record())),
    );
    let err = strategy.parse(None, Some("https://site/a-p1.html")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.to_string().contains("HTTP 503"));
}

#[test]
fn test_unknown_strategy_is_configuration_error() {
    let mut pool = ScraperPool::new(Arc::new(QueryCache::default()));
    pool.register(Arc::new(static_strategy(Some(sample_record()))));

    let err = pool
        .parse("scrapy", None, Some("https://site/a-p1.html"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let record = pool
        .parse("bs4", None, Some("https://site/a-p1.html"))
        .unwrap();
    assert_eq!(record.product_code, "123");
}

#[test]
fn test_direct_url_skips_resolution() {
    let product = "https://brain.com.ua/ukr/phone-p123.html";
    let launcher = StubLauncher::new(&[(product, "<html>product</html>")]);
    let runtime = Arc::new(BrowserRuntime::new(launcher.clone(), quick_options()));
    let flow = PageFlow::new(
        StrategyKind::Automation,
        Some(Arc::new(QueryCache::default())),
        ResolverConfig::default(),
    );
    let strategy = AutomationStrategy::new(
        runtime,
        flow,
        Arc::new(StubExtractor::returning(sample_record())),
        true,
    );

    let record = strategy.parse(None, Some(product)).unwrap();
    assert_eq!(record.source_url, product);
    assert_eq!(launcher.visits(), vec![product.to_string()]);
    strategy.close();
}

#[test]
fn test_cached_query_navigates_once() {
    let product = "https://brain.com.ua/ukr/phone-p123.html";
    let launcher = StubLauncher::new(&[(product, "<html>product</html>")]);
    let cache = Arc::new(QueryCache::default());
    cache.set(StrategyKind::Automation, "iPhone 15", product);

    let runtime = Arc::new(BrowserRuntime::new(launcher.clone(), quick_options()));
    let flow = PageFlow::new(
        StrategyKind::Automation,
        Some(Arc::clone(&cache)),
        ResolverConfig::default(),
    );
    let strategy = AutomationStrategy::new(
        runtime,
        flow,
        Arc::new(StubExtractor::returning(sample_record())),
        true,
    );

    let record = strategy.parse(Some("  iphone 15 "), None).unwrap();
    assert_eq!(record.source_url, product);
    assert_eq!(launcher.visits(), vec![product.to_string()]);
    strategy.close();
}
