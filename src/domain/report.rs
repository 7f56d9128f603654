//! Outputs of the analysis components.
//!
//! [`ComponentOutput`] is the type-erased result stored in pipeline state.
//! Each variant belongs to exactly one [`ComponentKey`].

use serde::{Deserialize, Serialize};

use super::component::ComponentKey;
use super::crawl::CrawlSnapshot;
use super::market::{Competitor, ContentBrief, RankedKeyword, SearchIntent};

/// Result payload of one component, tagged by component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "component", content = "data", rename_all = "camelCase")]
pub enum ComponentOutput {
    Crawl(CrawlSnapshot),
    TechnicalIssues(TechnicalReport),
    CurrentRankings(Vec<RankedKeyword>),
    CompetitorAnalysis(Vec<Competitor>),
    KeywordOpportunities(Vec<KeywordOpportunity>),
    QuickWins(Vec<QuickWin>),
    Briefs(Vec<ContentBrief>),
}

impl ComponentOutput {
    /// The component that produces this kind of output
    pub fn key(&self) -> ComponentKey {
        match self {
            Self::Crawl(_) => ComponentKey::Crawl,
            Self::TechnicalIssues(_) => ComponentKey::TechnicalIssues,
            Self::CurrentRankings(_) => ComponentKey::CurrentRankings,
            Self::CompetitorAnalysis(_) => ComponentKey::CompetitorAnalysis,
            Self::KeywordOpportunities(_) => ComponentKey::KeywordOpportunities,
            Self::QuickWins(_) => ComponentKey::QuickWins,
            Self::Briefs(_) => ComponentKey::Briefs,
        }
    }

    /// Short human summary for logs and the status command
    pub fn summary(&self) -> String {
        match self {
            Self::Crawl(s) => format!("{} pages", s.pages.len()),
            Self::TechnicalIssues(r) => format!("{} issues", r.issues.len()),
            Self::CurrentRankings(r) => format!("{} ranked keywords", r.len()),
            Self::CompetitorAnalysis(c) => format!("{} competitors", c.len()),
            Self::KeywordOpportunities(o) => format!("{} opportunities", o.len()),
            Self::QuickWins(w) => format!("{} quick wins", w.len()),
            Self::Briefs(b) => format!("{} briefs", b.len()),
        }
    }
}

/// How urgent a technical finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Kind of technical finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingTitle,
    DuplicateTitle,
    MissingMetaDescription,
    MissingH1,
    ThinContent,
    BrokenPage,
    RedirectChain,
    MissingRobotsTxt,
    MissingSitemap,
}

/// One technical finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalIssue {
    pub kind: IssueKind,
    pub severity: Severity,

    /// Affected page, absent for site-level findings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub detail: String,
}

/// Output of the technical-issues component
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalReport {
    pub pages_analyzed: usize,
    pub issues: Vec<TechnicalIssue>,
}

impl TechnicalReport {
    /// Whether any page-level issue points at `url`
    pub fn has_issues_for(&self, url: &str) -> bool {
        self.issues.iter().any(|i| i.url.as_deref() == Some(url))
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// A keyword the site does not rank for yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordOpportunity {
    pub keyword: String,
    pub topic: String,
    pub intent: SearchIntent,
    pub search_volume: u64,
    pub difficulty: u8,
    pub score: f64,
}

/// An existing ranking close enough to page one to be worth pushing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickWin {
    pub keyword: String,
    pub url: String,
    pub position: u32,
    pub search_volume: u64,

    /// Ranking page has technical issues that can be fixed first
    pub has_technical_issues: bool,

    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_key_matches_tag() {
        let output = ComponentOutput::QuickWins(Vec::new());
        let json = serde_json::to_value(&output).unwrap();

        assert_eq!(json["component"], output.key().as_str());
        assert_eq!(output.summary(), "0 quick wins");
    }

    #[test]
    fn test_issue_lookup_by_url() {
        let report = TechnicalReport {
            pages_analyzed: 2,
            issues: vec![TechnicalIssue {
                kind: IssueKind::MissingH1,
                severity: Severity::Medium,
                url: Some("https://example.com/a".to_string()),
                detail: "Page has no H1".to_string(),
            }],
        };

        assert!(report.has_issues_for("https://example.com/a"));
        assert!(!report.has_issues_for("https://example.com/b"));
        assert_eq!(report.count_by_severity(Severity::Medium), 1);
    }
}
