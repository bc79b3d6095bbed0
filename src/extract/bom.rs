use scraper::{ElementRef, Html, Selector};
use serde_json::{Number, Value};
use thiserror::Error;
use tracing::warn;

use super::ExtractError;
use super::specs::normalize_label;
use crate::models::PartRecord;
use crate::page::{RenderedPage, TabOutcome};
use crate::traits::SiteSelectors;

const QUANTITY: &str = "quantity";

#[derive(Debug, Error)]
pub enum BomError {
    #[error("table has no `quantity` column")]
    MissingQuantityColumn,

    #[error("quantity `{0}` does not start with a number")]
    InvalidQuantity(String),

    #[error("invalid selector `{0}`")]
    Selector(&'static str),
}

/// Reads the first `<table>` in `html` into rows keyed by normalized header.
///
/// Headers come from a leading all-`<th>` row; without one the columns are
/// numbered from `0`. Short rows get `null` for the missing cells.
pub fn parse_table(html: &str) -> Result<Vec<PartRecord>, BomError> {
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;
    let data_cell_sel = selector("td")?;

    let fragment = Html::parse_fragment(html);
    let Some(table) = fragment.select(&table_sel).next() else {
        return Ok(Vec::new());
    };

    let cell_texts = |row: ElementRef<'_>| -> Vec<String> {
        row.select(&cell_sel)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect()
    };

    let mut rows = table.select(&row_sel).peekable();
    let has_header = rows
        .peek()
        .is_some_and(|first| first.select(&data_cell_sel).next().is_none());
    let headers: Vec<String> = if has_header {
        rows.next()
            .map(|row| cell_texts(row).iter().map(|h| normalize_label(h)).collect())
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let mut records = Vec::new();
    for row in rows {
        let cells = cell_texts(row);
        if cells.is_empty() {
            continue;
        }

        let width = headers.len().max(cells.len());
        let mut record = PartRecord::new();
        for i in 0..width {
            let key = headers.get(i).cloned().unwrap_or_else(|| i.to_string());
            let value = cells.get(i).cloned().map_or(Value::Null, Value::String);
            record.insert(key, value);
        }
        records.push(record);
    }

    Ok(records)
}

fn selector(css: &'static str) -> Result<Selector, BomError> {
    Selector::parse(css).map_err(|_| BomError::Selector(css))
}

/// Leading whitespace-delimited token of a "quantity unit" cell as a float:
/// `"12 EA"` -> `12.0`.
pub fn parse_quantity(cell: &str) -> Result<f64, BomError> {
    cell.split_whitespace()
        .next()
        .and_then(|token| token.parse::<f64>().ok())
        .ok_or_else(|| BomError::InvalidQuantity(cell.to_string()))
}

/// Replaces each row's quantity text with its numeric value.
pub fn apply_quantities(rows: &mut [PartRecord]) -> Result<(), BomError> {
    for row in rows.iter_mut() {
        let quantity = match row.get(QUANTITY) {
            Some(Value::String(cell)) => parse_quantity(cell)?,
            Some(_) => return Err(BomError::InvalidQuantity(String::new())),
            None => return Err(BomError::MissingQuantityColumn),
        };
        let number = Number::from_f64(quantity)
            .ok_or_else(|| BomError::InvalidQuantity(quantity.to_string()))?;
        row.insert(QUANTITY.to_string(), Value::Number(number));
    }
    Ok(())
}

/// Opens the parts tab and parses its table.
pub async fn extract_bom(
    page: &mut dyn RenderedPage,
    selectors: &SiteSelectors,
    product_id: &str,
) -> Result<Option<Vec<PartRecord>>, ExtractError> {
    if page.go_to_tab(&selectors.parts_tab).await? == TabOutcome::NotFound {
        warn!("{}: Product without parts tab", product_id);
        return Ok(None);
    }

    let mut rows = match page.find_element(&selectors.parts_pane).await? {
        Some(pane) => parse_table(&pane.outer_html).map_err(ExtractError::Bom)?,
        None => Vec::new(),
    };

    if rows.is_empty() {
        warn!("{}: Product without bom", product_id);
        return Ok(None);
    }

    apply_quantities(&mut rows).map_err(ExtractError::Bom)?;
    Ok(Some(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TABLE: &str = r#"
        <div class="pane" data-tab="parts">
          <table>
            <thead><tr><th>Part Number</th><th>Description</th><th>Quantity</th></tr></thead>
            <tbody>
              <tr><td>WD1000A01</td><td>Conduit box</td><td>1 EA</td></tr>
              <tr><td>HW1001A05</td><td>Screw</td><td>4.5 FT</td></tr>
            </tbody>
          </table>
        </div>"#;

    #[test]
    fn quantity_takes_the_leading_number() {
        assert_eq!(parse_quantity("12 EA").unwrap(), 12.0);
        assert_eq!(parse_quantity("  0.25 LB").unwrap(), 0.25);
    }

    #[test]
    fn quantity_without_leading_number_fails() {
        assert!(matches!(parse_quantity("EA"), Err(BomError::InvalidQuantity(_))));
        assert!(matches!(parse_quantity(""), Err(BomError::InvalidQuantity(_))));
    }

    #[test]
    fn parses_header_and_rows() {
        let rows = parse_table(TABLE).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["part_number"], json!("WD1000A01"));
        assert_eq!(rows[0]["description"], json!("Conduit box"));
        assert_eq!(rows[1]["quantity"], json!("4.5 FT"));
    }

    #[test]
    fn no_table_yields_no_rows() {
        assert!(parse_table("<div>No parts listed</div>").unwrap().is_empty());
    }

    #[test]
    fn headerless_tables_get_numbered_columns() {
        let rows = parse_table("<table><tr><td>a</td><td>b</td></tr></table>").unwrap();
        assert_eq!(rows[0]["0"], json!("a"));
        assert_eq!(rows[0]["1"], json!("b"));
    }

    #[test]
    fn short_rows_are_padded_with_null() {
        let rows =
            parse_table("<table><tr><th>A</th><th>B</th></tr><tr><td>1</td></tr></table>").unwrap();
        assert_eq!(rows[0]["b"], Value::Null);
    }

    #[test]
    fn quantities_become_numbers() {
        let mut rows = parse_table(TABLE).unwrap();
        apply_quantities(&mut rows).unwrap();
        assert_eq!(rows[0]["quantity"], json!(1.0));
        assert_eq!(rows[1]["quantity"], json!(4.5));
    }

    #[test]
    fn table_without_quantity_column_fails() {
        let mut rows =
            parse_table("<table><tr><th>Part</th></tr><tr><td>X</td></tr></table>").unwrap();
        assert!(matches!(
            apply_quantities(&mut rows),
            Err(BomError::MissingQuantityColumn)
        ));
    }
}
