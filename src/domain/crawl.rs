//! Crawl data consumed from the crawler.
//!
//! The pipeline only reads these records; crawling itself happens elsewhere.

use serde::{Deserialize, Serialize};

/// A crawled page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub url: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub meta_description: Option<String>,

    #[serde(default)]
    pub h1: Option<String>,

    /// Extracted body text
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub outbound_links: Vec<String>,

    #[serde(default)]
    pub word_count: u32,

    /// HTTP status the crawler saw (200 when not reported)
    #[serde(default = "default_status_code")]
    pub status_code: u16,
}

fn default_status_code() -> u16 {
    200
}

/// A redirect sequence observed while crawling (first hop to final URL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectChain {
    pub hops: Vec<String>,
}

impl RedirectChain {
    /// Number of redirects followed
    pub fn redirect_count(&self) -> usize {
        self.hops.len().saturating_sub(1)
    }
}

/// Everything the crawler returns for one site
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSnapshot {
    pub pages: Vec<PageRecord>,

    #[serde(default)]
    pub has_robots_txt: bool,

    #[serde(default)]
    pub has_sitemap: bool,

    #[serde(default)]
    pub redirect_chains: Vec<RedirectChain>,
}

impl CrawlSnapshot {
    pub fn page(&self, url: &str) -> Option<&PageRecord> {
        self.pages.iter().find(|p| p.url == url)
    }
}
