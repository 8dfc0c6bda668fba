use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// A hyperlink as it appears in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
}

/// Read-only queries the locators need from a fetched page.
///
/// Keeps resource, playlist and series discovery independent of the HTML
/// library doing the parsing.
pub trait PageQuery {
    /// Text of the primary heading.
    fn extract_title(&self) -> Option<String>;

    /// Target of the first hyperlink whose `href` matches `pattern`.
    fn extract_primary_link(&self, pattern: &Regex) -> Option<String>;

    /// Text of the block immediately following the primary heading, where the
    /// human-readable publication date lives.
    fn extract_date(&self) -> Option<String>;

    /// Every JSON-LD metadata block that parses as JSON.
    fn extract_structured_metadata(&self) -> Vec<serde_json::Value>;

    /// For each element matching `block`, its first hyperlink matching `pattern`.
    fn block_links(&self, block: &str, pattern: &Regex) -> Vec<Anchor>;

    /// All hyperlinks matching `pattern` inside the first element matching
    /// `region`, or inside the whole document when no such element exists.
    fn region_links(&self, region: &str, pattern: &Regex) -> Vec<Anchor>;
}

/// [`PageQuery`] backed by the `scraper` HTML parser.
pub struct HtmlPage {
    document: Html,
}

impl HtmlPage {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// `content` of `<meta name="{name}">`.
    pub fn meta_content(&self, name: &str) -> Option<String> {
        let selector = Selector::parse("meta[name][content]").ok()?;
        self.document
            .select(&selector)
            .find(|meta| meta.value().attr("name") == Some(name))
            .and_then(|meta| meta.value().attr("content"))
            .map(str::to_string)
    }

    /// Text of the first element matching `css`, if it has any.
    pub fn first_text(&self, css: &str) -> Option<String> {
        self.select_first(css)
            .map(element_text)
            .filter(|text| !text.is_empty())
    }

    fn select_first(&self, css: &str) -> Option<ElementRef<'_>> {
        let selector = Selector::parse(css).ok()?;
        self.document.select(&selector).next()
    }

    fn matching_anchors<'a>(
        scope: ElementRef<'a>,
        pattern: &'a Regex,
    ) -> impl Iterator<Item = Anchor> + 'a {
        let links = Selector::parse("a[href]").ok();
        links
            .into_iter()
            .flat_map(move |selector| scope.select(&selector).collect::<Vec<_>>())
            .filter_map(move |element| {
                let href = element.value().attr("href")?.trim();
                pattern.is_match(href).then(|| Anchor {
                    href: href.to_string(),
                    text: element_text(element),
                })
            })
    }
}

impl PageQuery for HtmlPage {
    fn extract_title(&self) -> Option<String> {
        self.select_first("h1")
            .map(element_text)
            .filter(|title| !title.is_empty())
    }

    fn extract_primary_link(&self, pattern: &Regex) -> Option<String> {
        Self::matching_anchors(self.document.root_element(), pattern)
            .next()
            .map(|anchor| anchor.href)
    }

    fn extract_date(&self) -> Option<String> {
        let heading = self.select_first("h1")?;
        heading
            .next_siblings()
            .find_map(ElementRef::wrap)
            .map(element_text)
            .filter(|text| !text.is_empty())
    }

    fn extract_structured_metadata(&self) -> Vec<serde_json::Value> {
        let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
            return Vec::new();
        };

        self.document
            .select(&selector)
            .filter_map(|script| {
                let raw = script.text().collect::<String>();
                serde_json::from_str(raw.trim()).ok()
            })
            .collect()
    }

    fn block_links(&self, block: &str, pattern: &Regex) -> Vec<Anchor> {
        let Ok(selector) = Selector::parse(block) else {
            return Vec::new();
        };

        self.document
            .select(&selector)
            .filter_map(|element| Self::matching_anchors(element, pattern).next())
            .collect()
    }

    fn region_links(&self, region: &str, pattern: &Regex) -> Vec<Anchor> {
        let scope = self
            .select_first(region)
            .unwrap_or_else(|| self.document.root_element());
        Self::matching_anchors(scope, pattern).collect()
    }
}

/// Visible text of an element with whitespace collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
