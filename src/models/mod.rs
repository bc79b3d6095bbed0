//! Data models for product records and CAD manifest entries

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One product as persisted to `metadata/<product_id>.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: Option<String>,
    /// The catalog has no product-name element, so this stays null
    pub name: Option<String>,
    pub description: Option<String>,
    pub specs: Option<BTreeMap<String, String>>,
    pub bom: Option<Vec<PartRecord>>,
    pub assets: Option<Assets>,
}

/// A BOM row keyed by normalized column header.
///
/// `quantity` is always a JSON number once the BOM stage has accepted the row.
pub type PartRecord = Map<String, Value>;

/// Downloaded files, stored as paths relative to the output root
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assets {
    pub image: Option<String>,
    pub manual: Option<String>,
    pub cad: Option<BTreeMap<String, String>>,
}

/// One downloadable CAD variant from the drawings tab manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CadDescriptor {
    /// Display name, used as the key in `assets.cad`
    pub name: String,
    /// File name on disk, also the download request parameter
    pub value: String,
    /// Raw source URL, escaped before use
    pub url: String,
}
