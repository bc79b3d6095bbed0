//! Baldor (ABB) product catalog scraper implementation

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::catalog::{self, CandidateSource, QualifiedTag, ResolveError};
use crate::config::OutputLayout;
use crate::extract::assets::{AssetSink, download_assets};
use crate::extract::bom::extract_bom;
use crate::extract::head::extract_head;
use crate::extract::specs::extract_specs;
use crate::extract::ExtractError;
use crate::http::Fetcher;
use crate::models::ProductRecord;
use crate::page::RenderedPage;
use crate::traits::{CatalogScraper, ScraperConfig, SiteSelectors};

pub const CATALOG_URL: &str =
    "https://www.baldor.com/api/products?include=results&language=en-US&pageSize=20000";
const PRODUCT_URL: &str = "https://www.baldor.com/catalog/";
const PRODUCT_CODE_NAMESPACE: &str =
    "http://schemas.datacontract.org/2004/07/Baldor.ProductData.Service";

/// Selectors for the catalog's product page layout
pub fn site_selectors() -> SiteSelectors {
    SiteSelectors {
        product_id: "div.page-title".to_string(),
        description: "div.product-description".to_string(),
        specs_tab: "li[data-tab='specs']".to_string(),
        spec_label: "span.label".to_string(),
        spec_value: "span.value".to_string(),
        parts_tab: "li[data-tab='parts']".to_string(),
        parts_pane: "div.pane[data-tab='parts']".to_string(),
        drawings_tab: "li[data-tab='drawings']".to_string(),
        cad_container: "div.section.cadfiles".to_string(),
        cad_initializer: "ng-init".to_string(),
        image: "img.product-image".to_string(),
        manual: "a#infoPacket".to_string(),
    }
}

/// Scraper implementation for baldor.com
pub struct BaldorScraper {
    fetcher: Arc<dyn Fetcher>,
    layout: OutputLayout,
    config: ScraperConfig,
}

impl BaldorScraper {
    /// Create a new Baldor scraper writing assets under `layout`
    pub fn new(fetcher: Arc<dyn Fetcher>, layout: OutputLayout, download_url_base: String) -> Self {
        let config = ScraperConfig {
            name: "Baldor".to_string(),
            catalog_url: CATALOG_URL.to_string(),
            product_url_base: PRODUCT_URL.to_string(),
            product_code_tag: QualifiedTag {
                namespace: PRODUCT_CODE_NAMESPACE.to_string(),
                local: "Code".to_string(),
            },
            download_url_base,
            selectors: site_selectors(),
        };

        Self {
            fetcher,
            layout,
            config,
        }
    }
}

#[async_trait]
impl CatalogScraper for BaldorScraper {
    fn config(&self) -> &ScraperConfig {
        &self.config
    }

    async fn resolve_candidates(
        &self,
        source: &CandidateSource,
        processed: Option<&HashSet<String>>,
    ) -> Result<Vec<String>, ResolveError> {
        info!("Getting products id from {}", self.config.name);

        let candidates = match source {
            CandidateSource::Catalog { limit } => {
                let feed = self.fetcher.open_stream(&self.config.catalog_url).await?;
                let codes =
                    catalog::read_catalog_codes(feed, &self.config.product_code_tag).await?;
                info!("Catalog lists {} products", codes.len());

                match limit {
                    Some(limit) => catalog::sample_codes_randomly(&codes, *limit)?,
                    None => codes,
                }
            }
            CandidateSource::Explicit(ids) => ids.iter().cloned().collect(),
        };

        Ok(catalog::remaining_ids(candidates, processed)
            .iter()
            .map(|id| self.product_url(id))
            .collect())
    }

    async fn run_extraction(&self, page: &mut dyn RenderedPage) -> Result<ProductRecord, ExtractError> {
        let selectors = &self.config.selectors;
        let mut record = ProductRecord::default();

        extract_head(page, selectors, &mut record).await?;
        let product_id = record
            .product_id
            .clone()
            .ok_or(ExtractError::MissingProductId)?;

        record.specs = extract_specs(page, selectors, &product_id).await?;
        record.bom = extract_bom(page, selectors, &product_id).await?;

        let sink = AssetSink {
            fetcher: self.fetcher.as_ref(),
            layout: &self.layout,
            download_base: &self.config.download_url_base,
        };
        record.assets = Some(download_assets(page, selectors, &sink, &product_id).await?);

        Ok(record)
    }
}
