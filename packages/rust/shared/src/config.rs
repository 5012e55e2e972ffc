//! Application configuration for sitearchiver.
//!
//! User config lives at `~/.sitearchiver/sitearchiver.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteArchiverError};
use crate::types::SitemapErrorPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitearchiver.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitearchiver";

// ---------------------------------------------------------------------------
// Config structs (matching sitearchiver.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sitemaps to discover pages from.
    #[serde(default)]
    pub sitemaps: SitemapsConfig,

    /// Save Page Now settings.
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// `[sitemaps]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapsConfig {
    /// Sitemap URLs, fetched in this order.
    #[serde(default = "default_sitemap_urls")]
    pub urls: Vec<String>,

    /// Behaviour when one sitemap fails to fetch or parse.
    #[serde(default)]
    pub on_error: SitemapErrorPolicy,

    /// Request timeout for each sitemap fetch, in seconds.
    #[serde(default = "default_sitemap_timeout")]
    pub timeout_secs: u64,
}

impl Default for SitemapsConfig {
    fn default() -> Self {
        Self {
            urls: default_sitemap_urls(),
            on_error: SitemapErrorPolicy::default(),
            timeout_secs: default_sitemap_timeout(),
        }
    }
}

fn default_sitemap_urls() -> Vec<String> {
    vec!["https://amarahospital.com/page-sitemap.xml".into()]
}
fn default_sitemap_timeout() -> u64 {
    30
}

/// `[archive]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Save Page Now endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the S3-style access key (never store the key itself).
    #[serde(default = "default_access_key_env")]
    pub access_key_env: String,

    /// Name of the env var holding the S3-style secret key.
    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,

    /// Minimum seconds between two submissions.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Request timeout for each submission, in seconds.
    #[serde(default = "default_archive_timeout")]
    pub timeout_secs: u64,

    /// Ask the service to delay public availability of the snapshot.
    #[serde(default = "default_true")]
    pub delay_wb_availability: bool,

    /// Skip capturing when the page has never been archived before.
    #[serde(default = "default_true")]
    pub skip_first_archive: bool,

    /// Freshness window: do not capture again if a snapshot this recent exists.
    #[serde(default = "default_if_not_archived_within")]
    pub if_not_archived_within: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            access_key_env: default_access_key_env(),
            secret_key_env: default_secret_key_env(),
            interval_secs: default_interval(),
            timeout_secs: default_archive_timeout(),
            delay_wb_availability: true,
            skip_first_archive: true,
            if_not_archived_within: default_if_not_archived_within(),
        }
    }
}

fn default_endpoint() -> String {
    "https://web.archive.org/save".into()
}
fn default_access_key_env() -> String {
    "s3_access_key".into()
}
fn default_secret_key_env() -> String {
    "s3_secret_key".into()
}
// 12 captures/minute quota => 5s minimum; 10s leaves headroom.
fn default_interval() -> u64 {
    10
}
fn default_archive_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_if_not_archived_within() -> String {
    "15h".into()
}

// ---------------------------------------------------------------------------
// Submit config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime submission configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct SubmitConfig {
    /// Save Page Now endpoint.
    pub endpoint: String,
    /// Spacing between submissions.
    pub interval: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    /// `delay_wb_availability` form flag.
    pub delay_wb_availability: bool,
    /// `skip_first_archive` form flag.
    pub skip_first_archive: bool,
    /// `if_not_archived_within` form value.
    pub if_not_archived_within: String,
}

impl From<&AppConfig> for SubmitConfig {
    fn from(config: &AppConfig) -> Self {
        let archive = &config.archive;
        Self {
            endpoint: archive.endpoint.clone(),
            interval: Duration::from_secs(archive.interval_secs),
            timeout: Duration::from_secs(archive.timeout_secs),
            delay_wb_availability: archive.delay_wb_availability,
            skip_first_archive: archive.skip_first_archive,
            if_not_archived_within: archive.if_not_archived_within.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// S3-style key pair for the Save Page Now API, read once at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    /// Build credentials from explicit values.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Read both keys from the env vars named in `[archive]`.
    ///
    /// A missing variable yields an empty key. Requests are still sent and
    /// the service is left to reject them.
    pub fn from_env(config: &ArchiveConfig) -> Self {
        Self {
            access_key: std::env::var(&config.access_key_env).unwrap_or_default(),
            secret_key: std::env::var(&config.secret_key_env).unwrap_or_default(),
        }
    }

    /// Whether both keys are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }

    /// Value of the `Authorization` header (`LOW <access>:<secret>`).
    pub fn authorization(&self) -> String {
        format!("LOW {}:{}", self.access_key, self.secret_key)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitearchiver/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SiteArchiverError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitearchiver/sitearchiver.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SiteArchiverError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SiteArchiverError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SiteArchiverError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SiteArchiverError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteArchiverError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Parse and validate the configured sitemap list.
pub fn sitemap_urls(config: &AppConfig) -> Result<Vec<url::Url>> {
    if config.sitemaps.urls.is_empty() {
        return Err(SiteArchiverError::config("no sitemaps configured"));
    }

    config
        .sitemaps
        .urls
        .iter()
        .map(|raw| {
            url::Url::parse(raw).map_err(|e| {
                SiteArchiverError::config(format!("invalid sitemap URL '{raw}': {e}"))
            })
        })
        .collect()
}
