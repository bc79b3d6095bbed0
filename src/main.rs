use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

mod catalog;
mod config;
mod extract;
mod http;
mod models;
mod page;
mod pipeline;
mod scrapers;
mod store;
mod traits;

use config::{Cli, Config};
use http::{Fetcher, HttpClient};
use page::StaticPageLoader;
use pipeline::Pipeline;
use scrapers::baldor::BaldorScraper;
use store::RecordStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_cli(Cli::parse())?;
    init_tracing(&config)?;

    info!("Starting catalog scraper");

    config
        .layout
        .ensure_dirs()
        .with_context(|| format!("creating {}", config.layout.root.display()))?;

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpClient::new()?);
    let scraper = BaldorScraper::new(
        Arc::clone(&fetcher),
        config.layout.clone(),
        config.download_url.clone(),
    );
    let pipeline = Pipeline::new(
        Arc::new(scraper),
        Arc::clone(&fetcher),
        Arc::new(StaticPageLoader::new(Arc::clone(&fetcher))),
        RecordStore::new(config.layout.clone()),
    );

    let urls = pipeline.product_urls(&config.source, config.only_new).await?;
    if urls.is_empty() {
        warn!("No products to scrape");
        return Ok(());
    }

    let summary = pipeline.run(&urls, !config.log_verbose).await;
    println!(
        "Done: {} saved, {} skipped, {} failed.",
        summary.saved, summary.skipped, summary.failed
    );

    Ok(())
}

/// Verbose runs log to stderr; a configured log file receives every line.
fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let file_layer = match &config.log_output {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };
    let stderr_layer = config
        .log_verbose
        .then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}
