use super::{HtmlPage, PageQuery, PageSource, canonical_link};
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Elements that wrap exactly one episode on a playlist page.
pub const EPISODE_BLOCK_SELECTOR: &str =
    "[data-episode-id], article.episode, li.episode, div.episode";

/// Where episode links live when the page has no per-episode containers.
pub const CONTENT_REGION_SELECTOR: &str = "main";

const EPISODE_LINK_PATTERN: &str = r"/episodes/[^/?#]+/?(?:[?#].*)?$";

/// Turns a playlist page into its ordered list of episode URLs.
#[derive(Debug, Clone)]
pub struct PlaylistExpander {
    block_selector: String,
    region_selector: String,
    episode_link: Regex,
}

impl PlaylistExpander {
    pub fn new() -> Self {
        Self {
            block_selector: EPISODE_BLOCK_SELECTOR.to_string(),
            region_selector: CONTENT_REGION_SELECTOR.to_string(),
            episode_link: Regex::new(EPISODE_LINK_PATTERN).expect("valid episode link pattern"),
        }
    }

    pub fn with_selectors(mut self, block: &str, region: &str) -> Self {
        self.block_selector = block.to_string();
        self.region_selector = region.to_string();
        self
    }

    pub async fn expand(&self, source: &dyn PageSource, playlist_url: &Url) -> Result<Vec<Url>> {
        let html = source.fetch_page(playlist_url).await?;
        let episodes = self.episodes_in(playlist_url, &html)?;
        debug!(url = %playlist_url, count = episodes.len(), "expanded playlist");
        Ok(episodes)
    }

    /// Episode URLs in document order, without query strings, duplicates
    /// dropped.
    pub fn episodes_in(&self, playlist_url: &Url, html: &str) -> Result<Vec<Url>> {
        let page = HtmlPage::parse(html);

        let mut anchors = page.block_links(&self.block_selector, &self.episode_link);
        if anchors.is_empty() {
            debug!(url = %playlist_url, "no episode containers, scanning content links");
            anchors = page.region_links(&self.region_selector, &self.episode_link);
        }

        let mut seen = HashSet::new();
        let episodes: Vec<Url> = anchors
            .iter()
            .filter_map(|anchor| canonical_link(playlist_url, &anchor.href))
            .filter(|url| seen.insert(url.to_string()))
            .collect();

        if episodes.is_empty() {
            return Err(Error::NoEpisodesFound {
                url: playlist_url.to_string(),
            });
        }
        Ok(episodes)
    }
}

impl Default for PlaylistExpander {
    fn default() -> Self {
        Self::new()
    }
}
