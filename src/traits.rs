//! Traits and configuration for catalog-specific scrapers

use std::collections::HashSet;

use async_trait::async_trait;

use crate::catalog::{CandidateSource, QualifiedTag, ResolveError};
use crate::extract::ExtractError;
use crate::models::ProductRecord;
use crate::page::RenderedPage;

/// Configuration for a catalog scraper
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Display name for the catalog
    pub name: String,
    /// Feed listing every product code
    pub catalog_url: String,
    /// Product pages live at `product_url_base` + product code
    pub product_url_base: String,
    /// Feed element holding one product code
    pub product_code_tag: QualifiedTag,
    /// CAD download endpoint; the file key is appended
    pub download_url_base: String,
    /// CSS selectors for extracting data
    pub selectors: SiteSelectors,
}

/// CSS selectors for the regions of a product page
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub product_id: String,
    pub description: String,
    pub specs_tab: String,
    /// Matches every spec label; paired positionally with `spec_value`
    pub spec_label: String,
    pub spec_value: String,
    pub parts_tab: String,
    /// Panel whose markup holds the BOM table
    pub parts_pane: String,
    pub drawings_tab: String,
    pub cad_container: String,
    /// Attribute of `cad_container` holding the CAD manifest
    pub cad_initializer: String,
    /// Image element, read through its `src`
    pub image: String,
    /// Manual link, read through its `href`
    pub manual: String,
}

/// Trait for catalog-specific scrapers
#[async_trait]
pub trait CatalogScraper: Send + Sync {
    /// Get the configuration for this scraper
    fn config(&self) -> &ScraperConfig;

    /// Resolve the product page URLs to visit
    ///
    /// # Arguments
    /// * `source` - Whole catalog (optionally sampled) or an explicit id list
    /// * `processed` - Ids that already have a record and are skipped
    ///
    /// # Returns
    /// * `Result<Vec<String>>` - Product URLs, possibly empty
    async fn resolve_candidates(
        &self,
        source: &CandidateSource,
        processed: Option<&HashSet<String>>,
    ) -> Result<Vec<String>, ResolveError>;

    /// Run every extraction stage against a loaded product page
    ///
    /// # Arguments
    /// * `page` - The product page, freshly loaded for this product
    ///
    /// # Returns
    /// * `Result<ProductRecord>` - The record with a product id, or a hard failure
    async fn run_extraction(&self, page: &mut dyn RenderedPage) -> Result<ProductRecord, ExtractError>;

    /// Build the page URL for a product code
    fn product_url(&self, product_id: &str) -> String {
        format!("{}{}", self.config().product_url_base, product_id)
    }
}
