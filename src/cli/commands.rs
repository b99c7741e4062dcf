//! CLI commands implementation.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use brainscrape::config::{load_settings, ScrapeSettings};
use brainscrape::error::ScrapeError;
use brainscrape::scrapers::{ScraperPool, StrategyKind};

use super::output::render_record;

const DEFAULT_BENCH_QUERY: &str = "Apple iPhone 15 128GB Black";

#[derive(Parser)]
#[command(name = "brainscrape")]
#[command(about = "Extract product records with static, driver or browser strategies")]
#[command(version)]
pub struct Cli {
    /// TOML settings file (environment variables still override it)
    #[arg(long, global = true, env = "BRAINSCRAPE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one product by search query or product URL
    Parse {
        /// Strategy: static, driver or automation
        #[arg(short, long, default_value = "automation")]
        strategy: String,
        /// Free-text search query
        #[arg(short, long)]
        query: Option<String>,
        /// Product page URL
        #[arg(short, long)]
        url: Option<String>,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Time strategies against the same product
    Bench {
        /// Comma-separated strategies to run
        #[arg(long, value_delimiter = ',', default_value = "static,driver,automation")]
        strategies: Vec<String>,
        /// Timed runs per strategy
        #[arg(long, default_value = "3")]
        runs: usize,
        /// Untimed warm-up runs per strategy
        #[arg(long, default_value = "1")]
        warmup: usize,
        /// Product page URL (required for the static strategy)
        #[arg(long)]
        url: Option<String>,
        /// Search query for the browser-backed strategies
        #[arg(long, default_value = DEFAULT_BENCH_QUERY)]
        query: String,
        /// Clear the query cache before every run
        #[arg(long)]
        cold: bool,
    },

    /// List the strategies available in this build
    Strategies,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Parse {
            strategy,
            query,
            url,
            json,
        } => cmd_parse(settings, strategy, query, url, json).await,
        Commands::Bench {
            strategies,
            runs,
            warmup,
            url,
            query,
            cold,
        } => {
            let plan = BenchPlan {
                strategies,
                runs,
                warmup,
                url,
                query,
                cold,
            };
            cmd_bench(settings, plan).await
        }
        Commands::Strategies => cmd_strategies(settings).await,
    }
}

/// Build the pool off the async runtime; the strategies block.
///
/// The pool must also be used and dropped on a blocking thread, so every
/// command moves it into `spawn_blocking` and never holds it across `.await`.
async fn open_pool(settings: ScrapeSettings) -> anyhow::Result<ScraperPool> {
    let pool = tokio::task::spawn_blocking(move || ScraperPool::from_settings(&settings)).await??;
    pool.warm_up();
    Ok(pool)
}

async fn cmd_parse(
    settings: ScrapeSettings,
    strategy: String,
    query: Option<String>,
    url: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let pool = open_pool(settings).await?;

    let outcome = tokio::task::spawn_blocking(move || {
        let outcome = pool.parse(&strategy, query.as_deref(), url.as_deref());
        pool.close();
        outcome
    })
    .await?;

    match outcome {
        Ok(record) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print!("{}", render_record(&record));
                let missing = record.missing_fields();
                if !missing.is_empty() {
                    eprintln!(
                        "{} Missing fields: {}",
                        style("!").yellow(),
                        missing.join(", ")
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), describe(&e));
            Err(e.into())
        }
    }
}

fn describe(error: &ScrapeError) -> String {
    match error.stage() {
        Some(stage) => format!("{:?} error at stage '{}': {}", error.kind(), stage, error),
        None => format!("{:?} error: {}", error.kind(), error),
    }
}

struct BenchPlan {
    strategies: Vec<String>,
    runs: usize,
    warmup: usize,
    url: Option<String>,
    query: String,
    cold: bool,
}

/// Timings for one strategy, in run order.
#[derive(Debug, Default)]
pub struct BenchResult {
    pub samples: Vec<Duration>,
    pub failures: usize,
}

impl BenchResult {
    /// (min, mean, median, max), or `None` without successful runs.
    pub fn summary(&self) -> Option<(Duration, Duration, Duration, Duration)> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort();
        let total: Duration = sorted.iter().sum();
        let mean = total / sorted.len() as u32;
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2
        } else {
            sorted[mid]
        };
        Some((sorted[0], mean, median, sorted[sorted.len() - 1]))
    }
}

async fn cmd_bench(settings: ScrapeSettings, plan: BenchPlan) -> anyhow::Result<()> {
    let kinds = plan
        .strategies
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<StrategyKind>())
        .collect::<Result<Vec<_>, _>>()?;
    let pool = open_pool(settings).await?;

    let total = (kinds.len() * (plan.runs + plan.warmup)) as u64;
    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let bar = progress.clone();
    let results = tokio::task::spawn_blocking(move || {
        let mut results = Vec::new();
        for kind in kinds {
            results.push((kind, bench_strategy(&pool, kind, &plan, &bar)));
        }
        pool.close();
        results
    })
    .await?;
    progress.finish_and_clear();

    println!("\n{}", style("Benchmark").bold());
    for (kind, result) in results {
        match result.summary() {
            Some((min, mean, median, max)) => println!(
                "  {:<11} min {:>7.2}s  mean {:>7.2}s  median {:>7.2}s  max {:>7.2}s  ({} ok, {} failed)",
                style(kind).cyan(),
                min.as_secs_f64(),
                mean.as_secs_f64(),
                median.as_secs_f64(),
                max.as_secs_f64(),
                result.samples.len(),
                result.failures
            ),
            None => println!(
                "  {:<11} {} ({} failed)",
                style(kind).cyan(),
                style("no successful runs").red(),
                result.failures
            ),
        }
    }
    Ok(())
}

fn bench_strategy(
    pool: &ScraperPool,
    kind: StrategyKind,
    plan: &BenchPlan,
    bar: &ProgressBar,
) -> BenchResult {
    let mut result = BenchResult::default();
    let strategy = match pool.strategy(kind) {
        Ok(strategy) => strategy,
        Err(e) => {
            bar.println(format!("{} {}: {}", style("!").yellow(), kind, e));
            bar.inc((plan.warmup + plan.runs) as u64);
            result.failures = plan.runs;
            return result;
        }
    };

    // The static strategy cannot resolve queries; give it the URL alone.
    let query = kind.resolves_queries().then_some(plan.query.as_str());
    let url = plan.url.as_deref();

    for round in 0..(plan.warmup + plan.runs) {
        let timed = round >= plan.warmup;
        bar.set_message(format!(
            "{} {} {}",
            kind,
            if timed { "run" } else { "warm-up" },
            round + 1
        ));
        if plan.cold {
            pool.cache().clear();
        }

        let started = Instant::now();
        let outcome = strategy.parse(query, url);
        let elapsed = started.elapsed();
        bar.inc(1);

        match outcome {
            Ok(_) if timed => result.samples.push(elapsed),
            Ok(_) => {}
            Err(e) => {
                bar.println(format!("{} {} round {}: {}", style("✗").red(), kind, round + 1, e));
                if timed {
                    result.failures += 1;
                }
            }
        }
    }
    result
}

async fn cmd_strategies(settings: ScrapeSettings) -> anyhow::Result<()> {
    let available = tokio::task::spawn_blocking(move || {
        ScraperPool::from_settings(&settings).map(|pool| pool.available())
    })
    .await??;

    println!("\n{}", style("Strategies").bold());
    for kind in StrategyKind::ALL {
        let mark = if available.contains(&kind) {
            style("✓ available").green()
        } else {
            style("✗ not compiled").red()
        };
        let note = if kind.resolves_queries() {
            "query or url"
        } else {
            "url only"
        };
        println!("  {:<11} {}  {}", kind.as_str(), mark, style(note).dim());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bench_summary_even_count() {
        let result = BenchResult {
            samples: [4, 1, 3, 2].map(Duration::from_secs).to_vec(),
            failures: 0,
        };
        let (min, mean, median, max) = result.summary().unwrap();
        assert_eq!(min, Duration::from_secs(1));
        assert_eq!(mean, Duration::from_millis(2500));
        assert_eq!(median, Duration::from_millis(2500));
        assert_eq!(max, Duration::from_secs(4));
    }

    #[test]
    fn test_bench_summary_empty() {
        assert!(BenchResult::default().summary().is_none());
    }

    #[test]
    fn test_cli_parses_bench_list() {
        let cli = Cli::try_parse_from([
            "brainscrape",
            "bench",
            "--strategies",
            "static,driver",
            "--runs",
            "5",
            "--cold",
        ])
        .unwrap();
        match cli.command {
            Commands::Bench {
                strategies,
                runs,
                warmup,
                query,
                cold,
                ..
            } => {
                assert_eq!(strategies, vec!["static", "driver"]);
                assert_eq!(runs, 5);
                assert_eq!(warmup, 1);
                assert_eq!(query, DEFAULT_BENCH_QUERY);
                assert!(cold);
            }
            _ => panic!("expected bench"),
        }
    }
}
