use super::ExtractError;
use crate::config::is_plain_component;
use crate::models::ProductRecord;
use crate::page::RenderedPage;
use crate::traits::SiteSelectors;

/// Reads the product id and description. The catalog shows no product name.
///
/// The id names the record file and asset directory, so it must be a single
/// plain path component.
pub async fn extract_head(
    page: &dyn RenderedPage,
    selectors: &SiteSelectors,
    record: &mut ProductRecord,
) -> Result<(), ExtractError> {
    let product_id = page
        .element_text(&selectors.product_id)
        .await?
        .filter(|id| !id.is_empty())
        .ok_or(ExtractError::MissingProductId)?;
    if !is_plain_component(&product_id) {
        return Err(ExtractError::UnsafeProductId(product_id));
    }

    record.product_id = Some(product_id);
    record.description = page.element_text(&selectors.description).await?;
    Ok(())
}
