//! Core domain types shared by discovery, submission, and the pipeline.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PageUrl
// ---------------------------------------------------------------------------

/// An opaque page address taken from a sitemap `<loc>` element.
///
/// The string is kept exactly as published (after trimming surrounding
/// whitespace); it is not parsed or normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageUrl(String);

impl PageUrl {
    /// Wrap a raw `<loc>` value.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PageUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PageUrl {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PageUrl {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for PageUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// UrlList
// ---------------------------------------------------------------------------

/// Ordered URLs collected across all configured sitemaps.
///
/// Per-sitemap batches are appended in configuration order. Duplicates are
/// kept: a page listed by two sitemaps is submitted twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlList(Vec<PageUrl>);

impl UrlList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sitemap's URLs, preserving their order.
    pub fn append(&mut self, batch: Vec<PageUrl>) {
        self.0.extend(batch);
    }

    /// Number of URLs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, PageUrl> {
        self.0.iter()
    }
}

impl From<Vec<PageUrl>> for UrlList {
    fn from(urls: Vec<PageUrl>) -> Self {
        Self(urls)
    }
}

impl IntoIterator for UrlList {
    type Item = PageUrl;
    type IntoIter = std::vec::IntoIter<PageUrl>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a UrlList {
    type Item = &'a PageUrl;
    type IntoIter = std::slice::Iter<'a, PageUrl>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// SitemapErrorPolicy
// ---------------------------------------------------------------------------

/// What to do when a configured sitemap cannot be fetched or parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SitemapErrorPolicy {
    /// Stop the whole run on the first failing sitemap.
    #[default]
    Abort,
    /// Log the failure and continue with the remaining sitemaps.
    Skip,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_list_concatenates_and_keeps_duplicates() {
        let mut list = UrlList::new();
        list.append(vec!["https://a.com/1".into(), "https://a.com/2".into()]);
        list.append(vec!["https://a.com/1".into()]);

        let urls: Vec<&str> = list.iter().map(PageUrl::as_str).collect();
        assert_eq!(urls, ["https://a.com/1", "https://a.com/2", "https://a.com/1"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn page_url_displays_raw_value() {
        let url = PageUrl::new("https://a.com/x?y=1&z=2");
        assert_eq!(url.to_string(), "https://a.com/x?y=1&z=2");
    }

    #[test]
    fn policy_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            on_error: SitemapErrorPolicy,
        }

        let w: Wrapper = toml::from_str(r#"on_error = "skip""#).expect("parse");
        assert_eq!(w.on_error, SitemapErrorPolicy::Skip);
        assert_eq!(SitemapErrorPolicy::default(), SitemapErrorPolicy::Abort);
    }
}
