mod config;
mod digest;
mod error;
mod fetch;
mod parser;
mod record;
mod writer;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::config::Settings;
use crate::digest::DigestCrawler;
use crate::fetch::{CachedFetcher, PageSource};
use crate::writer::EventWriter;

#[derive(Parser)]
#[command(name = "nrc_events", about = "NRC event notification report scraper")]
struct Cli {
    /// Page cache directory (overrides NRC_CACHE_DIR)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// Output directory for event JSON files
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    /// Minimum delay between remote fetches, in milliseconds
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl digests, parse every daily page and write one JSON file per event
    Crawl {
        /// Year to crawl, repeatable (default: configured years)
        #[arg(short, long = "year")]
        years: Vec<i32>,
        /// Max pages to process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// List the daily page URLs of one year's digest
    Digest { year: i32 },
    /// Parse one daily page and print its events as JSON
    Parse { url: String },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(dir) = cli.cache_dir {
        settings.cache_dir = Some(dir);
    }
    if let Some(dir) = cli.output_dir {
        settings.output_dir = dir;
    }
    if let Some(ms) = cli.delay_ms {
        settings.delay_ms = ms;
    }
    info!(?settings, "Settings loaded");

    let mut fetcher = CachedFetcher::new(settings.cache_dir.clone(), settings.delay_ms)?;

    match cli.command {
        Commands::Crawl { years, limit } => {
            if !years.is_empty() {
                settings.years = years;
            }
            if settings.years.is_empty() {
                bail!("No years to crawl. Pass --year or set NRC_YEARS.");
            }
            let stats = crawl(&settings, &mut fetcher, limit).await?;
            println!("Done. {} events on {} pages", stats.events, stats.pages);
        }
        Commands::Digest { year } => {
            let crawler = DigestCrawler::new(&settings, [year]);
            for url in crawler.year_urls(year, &mut fetcher).await? {
                println!("{}", url);
            }
        }
        Commands::Parse { url } => {
            let body = fetcher.fetch(&url).await?;
            let events = parser::process_page(&url, &body, settings.cutover, Utc::now())
                .with_context(|| format!("Failed to parse {}", url))?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nFinished in {}", format_duration(elapsed));
    }
    Ok(())
}

struct CrawlStats {
    pages: usize,
    events: usize,
}

/// Strictly sequential: each page is fetched, parsed and written before the
/// next URL is requested. The first error aborts the run.
async fn crawl<S>(settings: &Settings, source: &mut S, limit: Option<usize>) -> Result<CrawlStats>
where
    S: PageSource + Send,
{
    let writer = EventWriter::new(&settings.output_dir)?;
    let mut crawler = DigestCrawler::new(settings, settings.years.iter().copied());
    let mut stats = CrawlStats { pages: 0, events: 0 };

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} pages {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));

    while limit.map_or(true, |n| stats.pages < n) {
        let Some(url) = crawler.next_url(source).await? else {
            break;
        };
        pb.set_message(url.clone());

        let crawl_time = Utc::now();
        let body = source.fetch(&url).await?;
        let page_date = parser::page_date(&url)?;
        let events = parser::process_page(&url, &body, settings.cutover, crawl_time)
            .with_context(|| format!("Failed to parse {}", url))?;

        for event in &events {
            writer.write(event, page_date)?;
        }
        info!("{}: {} events", url, events.len());

        stats.pages += 1;
        stats.events += events.len();
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Wrote {} events to {}", stats.events, writer.dir().display());
    Ok(stats)
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
