use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use reqwest::Url;
use tracing::{error, warn};

use super::{ExtractError, cad};
use crate::config::{OutputLayout, is_plain_component};
use crate::http::Fetcher;
use crate::models::Assets;
use crate::page::{RenderedPage, TabOutcome};
use crate::traits::SiteSelectors;

const IMAGE_FILE: &str = "img.jpg";
const MANUAL_FILE: &str = "manual.pdf";

/// What the asset stage needs besides the page.
pub struct AssetSink<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub layout: &'a OutputLayout,
    /// CAD download endpoint; the descriptor's file key is appended
    pub download_base: &'a str,
}

/// Downloads the product image, manual and CAD files into
/// `<assets>/<product_id>/` and records their output-relative paths.
pub async fn download_assets(
    page: &mut dyn RenderedPage,
    selectors: &SiteSelectors,
    sink: &AssetSink<'_>,
    product_id: &str,
) -> Result<Assets, ExtractError> {
    let product_dir = sink.layout.product_assets(product_id);
    tokio::fs::create_dir_all(&product_dir)
        .await
        .map_err(|source| ExtractError::Io {
            path: product_dir.display().to_string(),
            source,
        })?;

    let image = download_linked_file(
        page,
        sink,
        &selectors.image,
        "src",
        &product_dir.join(IMAGE_FILE),
    )
    .await?;
    let manual = download_linked_file(
        page,
        sink,
        &selectors.manual,
        "href",
        &product_dir.join(MANUAL_FILE),
    )
    .await?;
    let cad = download_cad(page, selectors, sink, &product_dir, product_id).await?;

    Ok(Assets { image, manual, cad })
}

async fn download_linked_file(
    page: &dyn RenderedPage,
    sink: &AssetSink<'_>,
    locator: &str,
    attribute: &str,
    dest: &Path,
) -> Result<Option<String>, ExtractError> {
    let Some(element) = page.find_element(locator).await? else {
        return Ok(None);
    };
    let Some(link) = element.attr(attribute).filter(|link| !link.is_empty()) else {
        warn!("{}: `{}` has no {} attribute", page.url(), locator, attribute);
        return Ok(None);
    };

    let url = absolute_url(page.url(), link);
    match sink.fetcher.download(&url, dest).await {
        Ok(_) => Ok(Some(sink.layout.relative(dest))),
        Err(e) => {
            error!("Failed to download file from {}: {}", url, e);
            Ok(None)
        }
    }
}

async fn download_cad(
    page: &mut dyn RenderedPage,
    selectors: &SiteSelectors,
    sink: &AssetSink<'_>,
    product_dir: &Path,
    product_id: &str,
) -> Result<Option<BTreeMap<String, String>>, ExtractError> {
    if page.go_to_tab(&selectors.drawings_tab).await? == TabOutcome::NotFound {
        warn!("{}: Product without drawings tab", product_id);
        return Ok(None);
    }

    let Some(container) = page.find_element(&selectors.cad_container).await? else {
        warn!("{}: Product without cad", product_id);
        return Ok(None);
    };
    let initializer = container
        .attr(&selectors.cad_initializer)
        .ok_or_else(|| cad::CadError::MissingInitializer(selectors.cad_initializer.clone()))?;

    let descriptors = cad::decode_manifest(initializer)?;
    if descriptors.is_empty() {
        warn!("{}: Product without cad", product_id);
        return Ok(None);
    }

    let mut files = BTreeMap::new();
    for descriptor in &descriptors {
        let Some(dest) = file_in(product_dir, &descriptor.value) else {
            warn!(
                "{}: skipping cad `{}` with unusable file name `{}`",
                product_id, descriptor.name, descriptor.value
            );
            continue;
        };

        let url = cad::download_url(sink.download_base, descriptor);
        match sink.fetcher.download(&url, &dest).await {
            Ok(_) => {
                files.insert(descriptor.name.clone(), sink.layout.relative(&dest));
            }
            Err(e) => error!("{}: failed to download cad `{}`: {}", product_id, descriptor.name, e),
        }
    }

    Ok((!files.is_empty()).then_some(files))
}

/// Joins `name` onto `dir` only if it is a single plain path component.
fn file_in(dir: &Path, name: &str) -> Option<PathBuf> {
    is_plain_component(name).then(|| dir.join(name))
}

/// Resolves a possibly relative link against the page it was found on.
pub fn absolute_url(page_url: &str, link: &str) -> String {
    Url::parse(page_url)
        .and_then(|base| base.join(link))
        .map_or_else(|_| link.to_string(), String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_links_resolve_against_the_page() {
        assert_eq!(
            absolute_url("https://www.baldor.com/catalog/M3211T", "/docs/m.pdf"),
            "https://www.baldor.com/docs/m.pdf"
        );
        assert_eq!(
            absolute_url("https://www.baldor.com/catalog/M3211T", "https://cdn.x/img.jpg"),
            "https://cdn.x/img.jpg"
        );
    }

    #[test]
    fn unparseable_page_url_keeps_the_link() {
        assert_eq!(absolute_url("not a url", "/docs/m.pdf"), "/docs/m.pdf");
    }

    #[test]
    fn cad_file_names_must_be_plain() {
        let dir = Path::new("output/assets/M3211T");
        assert_eq!(file_in(dir, "M3211T.stp"), Some(dir.join("M3211T.stp")));
        assert_eq!(file_in(dir, "../escape.stp"), None);
        assert_eq!(file_in(dir, "a/b.stp"), None);
        assert_eq!(file_in(dir, ""), None);
    }
}
