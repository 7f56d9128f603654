//! Technical issues: on-page and site-level checks over the crawl snapshot.
//!
//! Pure analysis; no external calls.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{
    ComponentKey, ComponentOutput, ComponentResult, CrawlSnapshot, IssueKind, PipelineState,
    Severity, TechnicalIssue, TechnicalReport,
};

use super::{AuditContext, Component};

pub struct TechnicalIssuesComponent;

#[async_trait]
impl Component for TechnicalIssuesComponent {
    fn key(&self) -> ComponentKey {
        ComponentKey::TechnicalIssues
    }

    fn dependencies(&self) -> &'static [ComponentKey] {
        &[ComponentKey::Crawl]
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> ComponentResult<ComponentOutput> {
        let snapshot = ctx.require(ComponentKey::Crawl, PipelineState::crawl_snapshot)?;
        Ok(ComponentOutput::TechnicalIssues(analyze(
            snapshot,
            ctx.settings.thin_content_words,
        )))
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Run every check over a snapshot
pub fn analyze(snapshot: &CrawlSnapshot, thin_content_words: u32) -> TechnicalReport {
    let mut issues = Vec::new();
    let page_issue = |kind, severity, url: &str, detail: String| TechnicalIssue {
        kind,
        severity,
        url: Some(url.to_string()),
        detail,
    };

    let mut titles: HashMap<String, usize> = HashMap::new();
    for page in &snapshot.pages {
        if page.status_code == 200 {
            if let Some(title) = page.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                *titles.entry(title.to_lowercase()).or_default() += 1;
            }
        }
    }

    for page in &snapshot.pages {
        if page.status_code != 200 {
            let severity = if page.status_code >= 400 {
                Severity::High
            } else {
                Severity::Medium
            };
            issues.push(page_issue(
                IssueKind::BrokenPage,
                severity,
                &page.url,
                format!("Page returned HTTP {}", page.status_code),
            ));
            continue;
        }

        if is_blank(&page.title) {
            issues.push(page_issue(
                IssueKind::MissingTitle,
                Severity::High,
                &page.url,
                "Page has no title".to_string(),
            ));
        } else if let Some(title) = page.title.as_deref() {
            let count = titles.get(&title.trim().to_lowercase()).copied().unwrap_or(0);
            if count > 1 {
                issues.push(page_issue(
                    IssueKind::DuplicateTitle,
                    Severity::Medium,
                    &page.url,
                    format!("Title '{}' is used by {} pages", title.trim(), count),
                ));
            }
        }

        if is_blank(&page.meta_description) {
            issues.push(page_issue(
                IssueKind::MissingMetaDescription,
                Severity::Medium,
                &page.url,
                "Page has no meta description".to_string(),
            ));
        }

        if is_blank(&page.h1) {
            issues.push(page_issue(
                IssueKind::MissingH1,
                Severity::Medium,
                &page.url,
                "Page has no H1".to_string(),
            ));
        }

        if page.word_count < thin_content_words {
            issues.push(page_issue(
                IssueKind::ThinContent,
                Severity::Low,
                &page.url,
                format!(
                    "Page has {} words (minimum {})",
                    page.word_count, thin_content_words
                ),
            ));
        }
    }

    for chain in &snapshot.redirect_chains {
        if chain.redirect_count() > 1 {
            if let Some(first) = chain.hops.first() {
                issues.push(page_issue(
                    IssueKind::RedirectChain,
                    Severity::Medium,
                    first,
                    format!("{} redirects: {}", chain.redirect_count(), chain.hops.join(" -> ")),
                ));
            }
        }
    }

    if !snapshot.has_robots_txt {
        issues.push(TechnicalIssue {
            kind: IssueKind::MissingRobotsTxt,
            severity: Severity::Low,
            url: None,
            detail: "Site has no robots.txt".to_string(),
        });
    }

    if !snapshot.has_sitemap {
        issues.push(TechnicalIssue {
            kind: IssueKind::MissingSitemap,
            severity: Severity::Medium,
            url: None,
            detail: "Site has no XML sitemap".to_string(),
        });
    }

    TechnicalReport {
        pages_analyzed: snapshot.pages.len(),
        issues,
    }
}
