use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::catalog::CandidateSource;
use crate::http::Fetcher;
use crate::page::PageLoader;
use crate::store::RecordStore;
use crate::traits::CatalogScraper;

/// What happened to one product URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductOutcome {
    Saved(String),
    /// Existence probe or page load failed; nothing was written
    Skipped,
    /// Extraction or persistence failed; nothing usable was written
    Failed,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Pipeline {
    scraper: Arc<dyn CatalogScraper>,
    fetcher: Arc<dyn Fetcher>,
    pages: Arc<dyn PageLoader>,
    store: Arc<RecordStore>,
}

impl Pipeline {
    pub fn new(
        scraper: Arc<dyn CatalogScraper>,
        fetcher: Arc<dyn Fetcher>,
        pages: Arc<dyn PageLoader>,
        store: RecordStore,
    ) -> Self {
        Self {
            scraper,
            fetcher,
            pages,
            store: Arc::new(store),
        }
    }

    pub async fn product_urls(&self, source: &CandidateSource, only_new: bool) -> Result<Vec<String>> {
        let processed = if only_new {
            self.store.get_existing_product_ids().await?
        } else {
            None
        };

        let urls = self
            .scraper
            .resolve_candidates(source, processed.as_ref())
            .await?;
        info!("Products id({}): {:?}", urls.len(), urls);
        Ok(urls)
    }

    pub async fn run(&self, urls: &[String], show_progress: bool) -> RunSummary {
        let pb = if show_progress {
            ProgressBar::new(urls.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("Scraping: [{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta}) {msg}")
        {
            pb.set_style(style.progress_chars("=> "));
        }

        let mut summary = RunSummary::default();
        for url in urls {
            match self.scrape_product(url).await {
                ProductOutcome::Saved(product_id) => {
                    summary.saved += 1;
                    pb.set_message(product_id);
                }
                ProductOutcome::Skipped => summary.skipped += 1,
                ProductOutcome::Failed => summary.failed += 1,
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            "Scraped {} products ({} saved, {} skipped, {} failed)",
            urls.len(),
            summary.saved,
            summary.skipped,
            summary.failed
        );
        summary
    }

    /// Check, load, extract, close, persist. The page is closed whatever the
    /// extraction result.
    pub async fn scrape_product(&self, url: &str) -> ProductOutcome {
        info!("Scraping: {}", url);

        if let Err(e) = self.fetcher.check(url).await {
            error!("Skipping {}: {}", url, e);
            return ProductOutcome::Skipped;
        }

        let mut page = match self.pages.load(url).await {
            Ok(page) => page,
            Err(e) => {
                error!("Skipping {}: {}", url, e);
                return ProductOutcome::Skipped;
            }
        };

        let extracted = self.scraper.run_extraction(page.as_mut()).await;
        if let Err(e) = page.close().await {
            warn!("Failed to close page {}: {}", url, e);
        }

        let record = match extracted {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to scrape {}: {}", url, e);
                return ProductOutcome::Failed;
            }
        };

        let Some(product_id) = record.product_id.clone() else {
            error!("Failed to scrape {}: no product id", url);
            return ProductOutcome::Failed;
        };

        if self.store.save_record(&record).await {
            info!("{}: Successfully scraped", product_id);
            ProductOutcome::Saved(product_id)
        } else {
            ProductOutcome::Failed
        }
    }
}
