//! Per-facet extractors run against a loaded product page.
//!
//! Each stage degrades to `None` when its region of the page is absent and
//! only returns an error for malformed content or driver failures.

pub mod assets;
pub mod bom;
pub mod cad;
pub mod head;
pub mod literal;
pub mod specs;

use thiserror::Error;

use crate::page::PageError;

pub use bom::BomError;
pub use cad::CadError;

/// Failures that abort extraction of the current product.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("page has no product id")]
    MissingProductId,

    #[error("product id `{0}` is not usable as a file name")]
    UnsafeProductId(String),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error("bom: {0}")]
    Bom(#[from] BomError),

    #[error("cad: {0}")]
    Cad(#[from] CadError),

    #[error("failed to create {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
