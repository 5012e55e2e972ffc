//! Shared types, error model, and configuration for sitearchiver.
//!
//! This crate is the foundation depended on by all other sitearchiver crates.
//! It provides:
//! - [`SiteArchiverError`] — the unified error type
//! - Domain types ([`PageUrl`], [`UrlList`], [`SitemapErrorPolicy`])
//! - Configuration ([`AppConfig`], [`SubmitConfig`], [`Credentials`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ArchiveConfig, Credentials, SitemapsConfig, SubmitConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, sitemap_urls,
};
pub use error::{Result, SiteArchiverError};
pub use types::{PageUrl, SitemapErrorPolicy, UrlList};
