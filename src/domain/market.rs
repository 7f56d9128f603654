//! Data returned by the keyword-intelligence and generative-AI services.

use serde::{Deserialize, Serialize};

/// Search metrics for one keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordDatum {
    pub keyword: String,

    #[serde(default)]
    pub search_volume: u64,

    /// 0-100, higher is harder
    #[serde(default)]
    pub difficulty: u8,

    #[serde(default)]
    pub cpc: f64,
}

/// One organic result on a search results page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerpResult {
    pub position: u32,
    pub url: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub domain: String,
}

/// A keyword a domain currently ranks for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedKeyword {
    pub keyword: String,
    pub position: u32,
    pub url: String,

    #[serde(default)]
    pub search_volume: u64,
}

/// Options for a ranked-keyword query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedKeywordOptions {
    pub locale: String,
    pub limit: u32,

    /// Only return rankings at or above this position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_position: Option<u32>,
}

/// A domain competing in the same search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    pub domain: String,

    #[serde(default)]
    pub common_keywords: u32,

    #[serde(default)]
    pub average_position: f64,
}

/// What a searcher wants from a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchIntent {
    Informational,
    Navigational,
    Commercial,
    Transactional,
    Unknown,
}

impl Default for SearchIntent {
    fn default() -> Self {
        Self::Unknown
    }
}

/// A topical group of keywords produced by the AI service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordCluster {
    pub topic: String,
    pub keywords: Vec<String>,
}

/// Input for a content brief
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefRequest {
    pub keyword: String,
    pub topic: String,
    pub intent: SearchIntent,

    /// Titles currently ranking for the keyword
    #[serde(default)]
    pub serp_titles: Vec<String>,

    #[serde(default)]
    pub competitor_domains: Vec<String>,
}

/// AI-written outline for a new or improved page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBrief {
    pub keyword: String,
    pub title: String,

    #[serde(default)]
    pub outline: Vec<String>,

    #[serde(default)]
    pub target_word_count: u32,
}
