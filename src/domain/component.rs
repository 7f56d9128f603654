//! Identifiers for the analysis steps of an audit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One named analysis step of an audit.
///
/// The set is closed: adding a step means adding a variant here and
/// registering an implementation for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKey {
    /// Fetch pages and site metadata from the crawler
    Crawl,

    /// On-page and site-level technical findings
    TechnicalIssues,

    /// Keywords the site already ranks for
    CurrentRankings,

    /// Domains competing for the same keywords
    CompetitorAnalysis,

    /// New keywords worth targeting
    KeywordOpportunities,

    /// Existing rankings that are close to page one
    QuickWins,

    /// AI-written content briefs for the best opportunities
    Briefs,
}

impl ComponentKey {
    /// Every key, in pipeline order
    pub const ALL: [ComponentKey; 7] = [
        ComponentKey::Crawl,
        ComponentKey::TechnicalIssues,
        ComponentKey::CurrentRankings,
        ComponentKey::CompetitorAnalysis,
        ComponentKey::KeywordOpportunities,
        ComponentKey::QuickWins,
        ComponentKey::Briefs,
    ];

    /// Wire name, as used in persisted state and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::TechnicalIssues => "technicalIssues",
            Self::CurrentRankings => "currentRankings",
            Self::CompetitorAnalysis => "competitorAnalysis",
            Self::KeywordOpportunities => "keywordOpportunities",
            Self::QuickWins => "quickWins",
            Self::Briefs => "briefs",
        }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKey {
    type Err = UnknownComponent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownComponent(s.to_string()))
    }
}

/// Returned when parsing a name that is not a component key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown component: {0}")]
pub struct UnknownComponent(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_serde() {
        for key in ComponentKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            "quickwins".parse::<ComponentKey>().unwrap(),
            ComponentKey::QuickWins
        );
        assert!("sitemap".parse::<ComponentKey>().is_err());
    }
}
