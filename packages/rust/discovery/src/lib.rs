//! Sitemap discovery: fetch sitemaps.org documents and list their page URLs.
//!
//! Each configured sitemap is fetched once per run, parsed as a whole, and
//! reduced to the ordered `url/loc` values. Sitemap indexes are not followed.

mod parser;

use std::time::Duration;

use reqwest::Client;
use sitearchiver_shared::{PageUrl, Result, SiteArchiverError};
use tracing::{debug, info, instrument};
use url::Url;

pub use parser::{SITEMAP_NAMESPACE, SitemapDocument, UrlEntry};

/// Maximum number of redirects to follow when fetching a sitemap.
const MAX_REDIRECTS: usize = 5;

/// Default timeout in seconds for fetching a sitemap.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Largest sitemap the protocol allows (50 MiB uncompressed).
const MAX_RESPONSE_SIZE: u64 = 50 * 1024 * 1024;

/// User-Agent string for discovery requests.
const USER_AGENT: &str = concat!("sitearchiver/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Discovery options
// ---------------------------------------------------------------------------

/// Configuration for sitemap fetching.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl From<&sitearchiver_shared::AppConfig> for DiscoveryOptions {
    fn from(config: &sitearchiver_shared::AppConfig) -> Self {
        Self {
            timeout_secs: config.sitemaps.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// SitemapFetcher
// ---------------------------------------------------------------------------

/// Fetches and parses sitemap documents.
#[derive(Debug, Clone)]
pub struct SitemapFetcher {
    client: Client,
}

impl SitemapFetcher {
    /// Build a fetcher with its own HTTP client.
    pub fn new(opts: &DiscoveryOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| {
                SiteArchiverError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client })
    }

    /// Fetch a sitemap and parse it.
    ///
    /// A non-success status becomes [`SiteArchiverError::Fetch`] with the
    /// status and body; a malformed body becomes [`SiteArchiverError::Parse`].
    #[instrument(skip_all, fields(sitemap = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<SitemapDocument> {
        info!(%url, "fetching sitemap");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| SiteArchiverError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SiteArchiverError::fetch(url.as_str(), status.as_u16(), body));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(SiteArchiverError::validation(format!(
                    "{url}: sitemap too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SiteArchiverError::Network(format!("{url}: failed to read body: {e}")))?;
        debug!(bytes = body.len(), "sitemap downloaded");

        info!(%url, "parsing sitemap XML");
        SitemapDocument::parse(body.to_vec())
    }

    /// Fetch a sitemap and return its page URLs in document order.
    ///
    /// Every call goes back to the network.
    pub async fn fetch_urls(&self, url: &Url) -> Result<Vec<PageUrl>> {
        let document = self.fetch(url).await?;
        let urls = document.extract_urls();
        info!(%url, count = urls.len(), "sitemap urls extracted");
        Ok(urls)
    }
}
