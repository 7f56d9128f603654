//! File-backed crawl source.
//!
//! The crawler runs outside this process and drops one JSON snapshot per
//! host into a directory: `<dir>/<host>.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

use crate::domain::CrawlSnapshot;

use super::CrawlSource;

/// Reads crawler output from `<dir>/<host>.json`
pub struct FileCrawlSource {
    dir: PathBuf,
}

impl FileCrawlSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot path for a site
    pub fn snapshot_path(&self, site_url: &str) -> Result<PathBuf> {
        let host = site_host(site_url)?;
        Ok(self.dir.join(format!("{}.json", host)))
    }
}

#[async_trait]
impl CrawlSource for FileCrawlSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self, site_url: &str) -> Result<CrawlSnapshot> {
        let path = self.snapshot_path(site_url)?;

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read crawl snapshot: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse crawl snapshot: {}", path.display()))
    }
}

/// Host of a site URL, without a leading `www.`
pub fn site_host(site_url: &str) -> Result<String> {
    let parsed = url::Url::parse(site_url)
        .with_context(|| format!("Invalid site URL: {}", site_url))?;
    let host = parsed
        .host_str()
        .with_context(|| format!("Site URL has no host: {}", site_url))?;

    Ok(host.trim_start_matches("www.").to_lowercase())
}
