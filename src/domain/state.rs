//! Persisted per-audit pipeline state.
//!
//! A [`PipelineState`] is read and written as one unit. It is created when
//! the audit is created and superseded after every component transition.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::component::ComponentKey;
use super::crawl::CrawlSnapshot;
use super::market::{Competitor, RankedKeyword};
use super::progress::{ComponentProgress, ComponentStatus, TransitionError};
use super::report::{ComponentOutput, KeywordOpportunity, TechnicalReport};

/// External API usage accumulated over the audit's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUsage {
    /// Requests sent to the keyword-intelligence service (every attempt)
    pub keyword_requests: u64,

    /// Requests sent to the AI service (every attempt)
    pub ai_requests: u64,

    pub cache_hits: u64,
    pub cache_misses: u64,

    /// Calls rejected by an open breaker
    pub short_circuits: u64,

    /// Calls that ended in an error after retries
    pub failed_calls: u64,
}

impl ApiUsage {
    pub fn absorb(&mut self, other: &ApiUsage) {
        self.keyword_requests += other.keyword_requests;
        self.ai_requests += other.ai_requests;
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
        self.short_circuits += other.short_circuits;
        self.failed_calls += other.failed_calls;
    }

    pub fn total_requests(&self) -> u64 {
        self.keyword_requests + self.ai_requests
    }
}

/// Overall status of an audit, derived from component progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    /// Only running components remain. The worker may have died, so the
    /// audit stays scheduled until the run finishes or goes stale.
    Analyzing,

    /// Some components are pending or failed; another pass is needed
    Retrying,

    /// Every component completed
    Completed,

    /// A critical component failed
    Failed,
}

impl AuditStatus {
    /// Whether the job queue should schedule another pass
    pub fn needs_another_pass(&self) -> bool {
        matches!(self, Self::Retrying | Self::Analyzing)
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Analyzing => "ANALYZING",
            Self::Retrying => "RETRYING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// The single persisted record for one audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub audit_id: Uuid,

    /// Site being audited
    pub site_url: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Progress of every tracked component
    pub progress: BTreeMap<ComponentKey, ComponentProgress>,

    /// Results of completed components
    #[serde(default)]
    pub results: BTreeMap<ComponentKey, ComponentOutput>,

    /// Number of passes that re-ran a failed or stale component
    #[serde(default)]
    pub retry_count: u32,

    #[serde(default)]
    pub usage: ApiUsage,
}

impl PipelineState {
    /// Empty state with every given component pending
    pub fn new(
        audit_id: Uuid,
        site_url: impl Into<String>,
        components: impl IntoIterator<Item = ComponentKey>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            audit_id,
            site_url: site_url.into(),
            created_at: now,
            updated_at: now,
            progress: components
                .into_iter()
                .map(|key| (key, ComponentProgress::Pending))
                .collect(),
            results: BTreeMap::new(),
            retry_count: 0,
            usage: ApiUsage::default(),
        }
    }

    /// Progress of a component; untracked components read as pending
    pub fn progress_of(&self, key: ComponentKey) -> &ComponentProgress {
        static PENDING: ComponentProgress = ComponentProgress::Pending;
        self.progress.get(&key).unwrap_or(&PENDING)
    }

    pub fn status_of(&self, key: ComponentKey) -> ComponentStatus {
        self.progress_of(key).status()
    }

    /// Keys of all completed components
    pub fn completed(&self) -> HashSet<ComponentKey> {
        self.progress
            .iter()
            .filter(|(_, p)| p.is_completed())
            .map(|(k, _)| *k)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        !self.progress.is_empty() && self.progress.values().all(|p| p.is_completed())
    }

    /// Mark a component `running` at `now`
    pub fn mark_running(
        &mut self,
        key: ComponentKey,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let next = self.progress_of(key).start(now)?;
        self.progress.insert(key, next);
        self.updated_at = now;
        Ok(())
    }

    /// Mark a running component `completed` and store its result
    pub fn mark_completed(
        &mut self,
        key: ComponentKey,
        output: ComponentOutput,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let next = self.progress_of(key).complete(now)?;
        self.progress.insert(key, next);
        self.results.insert(key, output);
        self.updated_at = now;
        Ok(())
    }

    /// Mark a running component `failed`
    pub fn mark_failed(
        &mut self,
        key: ComponentKey,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let next = self.progress_of(key).fail(error)?;
        self.progress.insert(key, next);
        self.updated_at = now;
        Ok(())
    }

    /// Derive the overall status.
    ///
    /// A failed critical component wins over everything else; pending or
    /// failed work wins over work that is merely in flight.
    pub fn overall_status(&self, critical: &[ComponentKey]) -> AuditStatus {
        if critical
            .iter()
            .any(|key| self.status_of(*key) == ComponentStatus::Failed)
        {
            return AuditStatus::Failed;
        }

        if self.is_complete() {
            return AuditStatus::Completed;
        }

        let outstanding = self.progress.values().any(|p| {
            matches!(
                p.status(),
                ComponentStatus::Pending | ComponentStatus::Failed
            )
        });

        if outstanding {
            AuditStatus::Retrying
        } else {
            AuditStatus::Analyzing
        }
    }

    // ------------------------------------------------------------------
    // Typed access to stored results
    // ------------------------------------------------------------------

    pub fn crawl_snapshot(&self) -> Option<&CrawlSnapshot> {
        match self.results.get(&ComponentKey::Crawl) {
            Some(ComponentOutput::Crawl(snapshot)) => Some(snapshot),
            _ => None,
        }
    }

    pub fn technical_report(&self) -> Option<&TechnicalReport> {
        match self.results.get(&ComponentKey::TechnicalIssues) {
            Some(ComponentOutput::TechnicalIssues(report)) => Some(report),
            _ => None,
        }
    }

    pub fn current_rankings(&self) -> Option<&[RankedKeyword]> {
        match self.results.get(&ComponentKey::CurrentRankings) {
            Some(ComponentOutput::CurrentRankings(rankings)) => Some(rankings),
            _ => None,
        }
    }

    pub fn competitors(&self) -> Option<&[Competitor]> {
        match self.results.get(&ComponentKey::CompetitorAnalysis) {
            Some(ComponentOutput::CompetitorAnalysis(competitors)) => Some(competitors),
            _ => None,
        }
    }

    pub fn keyword_opportunities(&self) -> Option<&[KeywordOpportunity]> {
        match self.results.get(&ComponentKey::KeywordOpportunities) {
            Some(ComponentOutput::KeywordOpportunities(opportunities)) => Some(opportunities),
            _ => None,
        }
    }
}
