//! Rendered-page capability and its HTML-snapshot implementation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;

use crate::http::{FetchError, Fetcher};

#[derive(Debug, Error)]
pub enum PageError {
    #[error("failed to load {url}: {source}")]
    Load {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("invalid selector `{0}`")]
    InvalidSelector(String),
}

/// Owned copy of one matched element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageElement {
    /// Visible text, whitespace-trimmed
    pub text: String,
    /// Markup of the element including its own tag
    pub outer_html: String,
    pub attributes: HashMap<String, String>,
}

impl PageElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Result of trying to switch to an in-page tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabOutcome {
    Opened,
    NotFound,
}

/// A loaded product page.
///
/// Locators are CSS selectors. Lookups that match nothing return `None` or an
/// empty list; only driver failures are errors.
#[async_trait]
pub trait RenderedPage: Send + Sync {
    fn url(&self) -> &str;

    async fn find_element(&self, locator: &str) -> Result<Option<PageElement>, PageError>;

    async fn find_elements(&self, locator: &str) -> Result<Vec<PageElement>, PageError>;

    async fn click(&mut self, element: &PageElement) -> Result<(), PageError>;

    /// Releases the session. Called exactly once per loaded page.
    async fn close(self: Box<Self>) -> Result<(), PageError>;

    async fn element_text(&self, locator: &str) -> Result<Option<String>, PageError> {
        Ok(self.find_element(locator).await?.map(|el| el.text))
    }

    async fn element_texts(&self, locator: &str) -> Result<Vec<String>, PageError> {
        Ok(self
            .find_elements(locator)
            .await?
            .into_iter()
            .map(|el| el.text)
            .collect())
    }

    async fn go_to_tab(&mut self, locator: &str) -> Result<TabOutcome, PageError> {
        match self.find_element(locator).await? {
            Some(tab) => {
                self.click(&tab).await?;
                Ok(TabOutcome::Opened)
            }
            None => Ok(TabOutcome::NotFound),
        }
    }
}

/// Opens a fresh page session per product URL.
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<Box<dyn RenderedPage>, PageError>;
}

/// Snapshot of a product page's server-rendered HTML.
///
/// All tab panels are present in the markup, so clicking a tab only records
/// which one is active.
pub struct StaticPage {
    url: String,
    html: String,
    active_tab: Option<String>,
}

impl StaticPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            active_tab: None,
        }
    }

    #[cfg(test)]
    pub fn active_tab(&self) -> Option<&str> {
        self.active_tab.as_deref()
    }

    fn select(&self, locator: &str, limit: Option<usize>) -> Result<Vec<PageElement>, PageError> {
        let selector =
            Selector::parse(locator).map_err(|_| PageError::InvalidSelector(locator.to_string()))?;
        let document = Html::parse_document(&self.html);

        let matches = document.select(&selector).map(snapshot);
        Ok(match limit {
            Some(n) => matches.take(n).collect(),
            None => matches.collect(),
        })
    }
}

fn snapshot(el: ElementRef<'_>) -> PageElement {
    PageElement {
        text: el.text().collect::<String>().trim().to_string(),
        outer_html: el.html(),
        attributes: el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

#[async_trait]
impl RenderedPage for StaticPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn find_element(&self, locator: &str) -> Result<Option<PageElement>, PageError> {
        Ok(self.select(locator, Some(1))?.into_iter().next())
    }

    async fn find_elements(&self, locator: &str) -> Result<Vec<PageElement>, PageError> {
        self.select(locator, None)
    }

    async fn click(&mut self, element: &PageElement) -> Result<(), PageError> {
        self.active_tab = element.attr("data-tab").map(str::to_string);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), PageError> {
        debug!("Closed page {} (last tab: {:?})", self.url, self.active_tab);
        Ok(())
    }
}

/// Loads [`StaticPage`]s through the shared [`Fetcher`].
pub struct StaticPageLoader {
    fetcher: Arc<dyn Fetcher>,
}

impl StaticPageLoader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl PageLoader for StaticPageLoader {
    async fn load(&self, url: &str) -> Result<Box<dyn RenderedPage>, PageError> {
        let html = self
            .fetcher
            .fetch_text(url)
            .await
            .map_err(|source| PageError::Load {
                url: url.to_string(),
                source,
            })?;

        Ok(Box::new(StaticPage::new(url, html)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <html><body>
          <div class="page-title"> M3211T </div>
          <ul><li data-tab="specs">Specs</li></ul>
          <span class="label">Rated Power</span>
          <span class="label"></span>
          <a id="infoPacket" href="/docs/m3211t.pdf">Info</a>
        </body></html>
    "#;

    #[tokio::test]
    async fn finds_single_element_text() {
        let page = StaticPage::new("https://example.com/catalog/M3211T", HTML);
        let text = page.element_text("div.page-title").await.unwrap();
        assert_eq!(text.as_deref(), Some("M3211T"));
        assert!(page.element_text("div.missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finds_all_elements_including_empty_text() {
        let page = StaticPage::new("u", HTML);
        let texts = page.element_texts("span.label").await.unwrap();
        assert_eq!(texts, vec!["Rated Power".to_string(), String::new()]);
    }

    #[tokio::test]
    async fn reads_attributes() {
        let page = StaticPage::new("u", HTML);
        let link = page.find_element("a#infoPacket").await.unwrap().unwrap();
        assert_eq!(link.attr("href"), Some("/docs/m3211t.pdf"));
    }

    #[tokio::test]
    async fn go_to_tab_reports_missing_tabs() {
        let mut page = StaticPage::new("u", HTML);
        assert_eq!(
            page.go_to_tab("li[data-tab='parts']").await.unwrap(),
            TabOutcome::NotFound
        );
        assert_eq!(page.active_tab(), None);

        assert_eq!(
            page.go_to_tab("li[data-tab='specs']").await.unwrap(),
            TabOutcome::Opened
        );
        assert_eq!(page.active_tab(), Some("specs"));
    }

    #[tokio::test]
    async fn invalid_selector_is_an_error() {
        let page = StaticPage::new("u", HTML);
        assert!(matches!(
            page.find_element("div[").await,
            Err(PageError::InvalidSelector(_))
        ));
    }
}
