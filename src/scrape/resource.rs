use super::{HtmlPage, PageQuery, PageSource};
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

pub const UNKNOWN_TITLE: &str = "Unknown Title";

static DOWNLOAD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/download").expect("valid download link pattern"));

static MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][a-z]{2,8})\.? (\d{1,2}), (\d{4})\b").expect("valid date pattern")
});

/// What the episode page says about one downloadable video.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub title: String,
    /// Link that redirects to the actual file.
    pub indirect_url: Url,
    pub source_page_url: Url,
    pub created_at: Option<DateTime<Utc>>,
}

/// Turns an episode page into a [`ResourceDescriptor`].
#[derive(Debug, Default, Clone)]
pub struct ResourceLocator;

impl ResourceLocator {
    pub fn new() -> Self {
        Self
    }

    pub async fn locate(
        &self,
        source: &dyn PageSource,
        page_url: &Url,
    ) -> Result<ResourceDescriptor> {
        let html = source.fetch_page(page_url).await?;
        let descriptor = self.describe(page_url, &html)?;
        debug!(
            url = %page_url,
            title = %descriptor.title,
            created_at = ?descriptor.created_at,
            "located resource"
        );
        Ok(descriptor)
    }

    /// Extract the descriptor from an already fetched page.
    pub fn describe(&self, page_url: &Url, html: &str) -> Result<ResourceDescriptor> {
        let page = HtmlPage::parse(html);

        let title = page
            .extract_title()
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        let href = page
            .extract_primary_link(&DOWNLOAD_LINK)
            .ok_or_else(|| Error::NoDownloadLinkFound {
                url: page_url.to_string(),
            })?;
        let indirect_url = page_url.join(&href).map_err(|source| Error::InvalidUrl {
            url: href.clone(),
            source,
        })?;

        let created_at = page
            .extract_date()
            .and_then(|text| parse_human_date(&text))
            .or_else(|| upload_date(&page.extract_structured_metadata()));

        Ok(ResourceDescriptor {
            title,
            indirect_url,
            source_page_url: page_url.clone(),
            created_at,
        })
    }
}

/// Find a `Month Day, Year` date anywhere in `text`.
pub fn parse_human_date(text: &str) -> Option<DateTime<Utc>> {
    MONTH_DAY_YEAR.captures_iter(text).find_map(|caps| {
        let candidate = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
        ["%B %d %Y", "%b %d %Y"]
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(&candidate, format).ok())
            .and_then(start_of_day)
    })
}

/// First parsable `uploadDate` in the JSON-LD blocks, searched depth-first.
pub fn upload_date(blocks: &[serde_json::Value]) -> Option<DateTime<Utc>> {
    blocks.iter().find_map(find_upload_date)
}

fn find_upload_date(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::Object(map) => map
            .get("uploadDate")
            .and_then(|v| v.as_str())
            .and_then(parse_iso_date)
            .or_else(|| map.values().find_map(find_upload_date)),
        serde_json::Value::Array(items) => items.iter().find_map(find_upload_date),
        _ => None,
    }
}

fn parse_iso_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(start_of_day)
        })
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}
