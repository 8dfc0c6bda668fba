pub mod html;
pub mod playlist;
pub mod redirect;
pub mod resource;
pub mod series;

use crate::error::Result;
use async_trait::async_trait;
use url::Url;

pub use html::{Anchor, HtmlPage, PageQuery};
pub use playlist::PlaylistExpander;
pub use redirect::RedirectResolver;
pub use resource::{ResourceDescriptor, ResourceLocator};
pub use series::{SeriesCatalogEntry, SeriesEnumerator};

/// Anything that can hand back the HTML of a page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &Url) -> Result<String>;
}

/// Resolve `href` against `base` and drop its query string and fragment.
pub(crate) fn canonical_link(base: &Url, href: &str) -> Option<Url> {
    let mut url = base.join(href).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url)
}
