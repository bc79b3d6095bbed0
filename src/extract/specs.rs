use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::page::{PageError, RenderedPage, TabOutcome};
use crate::traits::SiteSelectors;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.*\d*").expect("number pattern is valid"));

/// `"Rated Power"` -> `"rated_power"`
pub fn normalize_label(label: &str) -> String {
    label.replace(' ', "_").to_lowercase()
}

/// Keeps only the numbers, joined with `/`: `"4.5 in (114 mm)"` -> `"4.5/114"`.
pub fn normalize_value(value: &str) -> String {
    NUMBER
        .find_iter(value)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

/// Drops empty entries from each side, then pairs what is left by position.
///
/// When the filtered lists differ in length the surplus entries are dropped,
/// which shifts any later pairs; a warning records the mismatch.
pub fn pair_specs(product_id: &str, labels: &[String], values: &[String]) -> BTreeMap<String, String> {
    let labels: Vec<&String> = labels.iter().filter(|l| !l.is_empty()).collect();
    let values: Vec<&String> = values.iter().filter(|v| !v.is_empty()).collect();

    if labels.len() != values.len() {
        warn!(
            "{}: spec labels ({}) and values ({}) differ in length, pairing by position",
            product_id,
            labels.len(),
            values.len()
        );
    }

    labels
        .into_iter()
        .zip(values)
        .map(|(label, value)| (normalize_label(label), normalize_value(value)))
        .collect()
}

/// Opens the specs tab and reads the label/value lists.
///
/// A missing tab gives `None`; a tab without entries gives an empty map.
pub async fn extract_specs(
    page: &mut dyn RenderedPage,
    selectors: &SiteSelectors,
    product_id: &str,
) -> Result<Option<BTreeMap<String, String>>, PageError> {
    if page.go_to_tab(&selectors.specs_tab).await? == TabOutcome::NotFound {
        warn!("{}: Product without specs tab", product_id);
        return Ok(None);
    }

    let labels = page.element_texts(&selectors.spec_label).await?;
    let values = page.element_texts(&selectors.spec_value).await?;

    if labels.is_empty() && values.is_empty() {
        warn!("{}: Product without specs", product_id);
    }

    Ok(Some(pair_specs(product_id, &labels, &values)))
}
