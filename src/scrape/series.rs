use super::{HtmlPage, PageQuery, PageSource};
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

/// Content blocks on the catalog page, one per series.
pub const SERIES_BLOCK_SELECTOR: &str = "article";

static SERIES_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/series/[^/?#]+").expect("valid series link pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesCatalogEntry {
    pub title: String,
    pub playlist_url: Url,
    /// Name of the output subdirectory for this series.
    pub directory_slug: String,
}

/// Lists every series on the catalog page.
#[derive(Debug, Clone)]
pub struct SeriesEnumerator {
    block_selector: String,
}

impl SeriesEnumerator {
    pub fn new() -> Self {
        Self {
            block_selector: SERIES_BLOCK_SELECTOR.to_string(),
        }
    }

    pub fn with_block_selector(mut self, selector: &str) -> Self {
        self.block_selector = selector.to_string();
        self
    }

    pub async fn enumerate(
        &self,
        source: &dyn PageSource,
        catalog_url: &Url,
    ) -> Result<Vec<SeriesCatalogEntry>> {
        let html = source.fetch_page(catalog_url).await?;
        let entries = self.entries_in(catalog_url, &html)?;
        debug!(url = %catalog_url, count = entries.len(), "enumerated series");
        Ok(entries)
    }

    /// Catalog entries in document order. An empty catalog is not an error.
    pub fn entries_in(&self, catalog_url: &Url, html: &str) -> Result<Vec<SeriesCatalogEntry>> {
        let page = HtmlPage::parse(html);

        let mut entries = Vec::new();
        for anchor in page.block_links(&self.block_selector, &SERIES_LINK) {
            if anchor.text.is_empty() {
                debug!(href = %anchor.href, "skipping series link without a title");
                continue;
            }

            let playlist_url = catalog_url.join(&anchor.href).map_err(|source| Error::InvalidUrl {
                url: anchor.href.clone(),
                source,
            })?;

            entries.push(SeriesCatalogEntry {
                directory_slug: slug_for(&anchor.href, &anchor.text),
                title: anchor.text,
                playlist_url,
            });
        }

        make_slugs_unique(&mut entries);
        Ok(entries)
    }
}

impl Default for SeriesEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Last path segment of the link, or the lowercased, hyphenated title when the
/// link has no usable segment. Never a relative path component.
pub fn slug_for(href: &str, title: &str) -> String {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .filter(|segment| is_directory_name(segment))
        .map(str::to_string)
        .unwrap_or_else(|| {
            let slug = title.to_lowercase().replace([' ', '/', '\\'], "-");
            if is_directory_name(&slug) {
                slug
            } else {
                "series".to_string()
            }
        })
}

fn is_directory_name(name: &str) -> bool {
    !matches!(name, "" | "." | "..")
}

/// Suffix repeated slugs with `-2`, `-3`, ... so no two series share a
/// directory.
fn make_slugs_unique(entries: &mut [SeriesCatalogEntry]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for entry in entries.iter_mut() {
        let count = seen.entry(entry.directory_slug.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            let unique = format!("{}-{}", entry.directory_slug, count);
            warn!(
                title = %entry.title,
                slug = %entry.directory_slug,
                renamed = %unique,
                "series directory slug collides with an earlier series"
            );
            entry.directory_slug = unique;
        }
    }
}
