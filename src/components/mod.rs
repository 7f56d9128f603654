//! Analysis components.
//!
//! Each component is one step of an audit. It reads earlier results from
//! the pipeline state, talks to external services through the guarded
//! adapters, and returns a [`ComponentOutput`]. Components must be
//! idempotent: the runner re-executes them after failures and when a run
//! goes stale.

mod briefs;
mod competitors;
mod crawl;
mod opportunities;
mod quick_wins;
mod rankings;
mod technical;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::{AiService, CrawlSource, KeywordService, UsageMeter};
use crate::core::{ComponentRegistry, RegistryError};
use crate::domain::{ComponentError, ComponentKey, ComponentOutput, ComponentResult, PipelineState};

pub use briefs::BriefsComponent;
pub use competitors::CompetitorAnalysisComponent;
pub use crawl::CrawlComponent;
pub use opportunities::KeywordOpportunitiesComponent;
pub use quick_wins::QuickWinsComponent;
pub use rankings::CurrentRankingsComponent;
pub use technical::TechnicalIssuesComponent;

/// One analysis step
#[async_trait]
pub trait Component: Send + Sync {
    fn key(&self) -> ComponentKey;

    /// Components whose results this one reads
    fn dependencies(&self) -> &'static [ComponentKey];

    async fn run(&self, ctx: &AuditContext<'_>) -> ComponentResult<ComponentOutput>;
}

/// External services shared by all components
pub struct Services {
    pub crawler: Arc<dyn CrawlSource>,
    pub keywords: KeywordService,
    pub ai: AiService,
}

/// Tunables for the analysis components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Locale sent with every keyword query
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Concurrent AI calls per component
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum seed keywords taken from crawled pages
    #[serde(default = "default_max_seeds")]
    pub max_seeds: usize,

    #[serde(default = "default_max_opportunities")]
    pub max_opportunities: usize,

    /// Opportunities that get a content brief
    #[serde(default = "default_max_briefs")]
    pub max_briefs: usize,

    /// Pages below this word count are thin
    #[serde(default = "default_thin_content_words")]
    pub thin_content_words: u32,

    #[serde(default = "default_quick_win_min_position")]
    pub quick_win_min_position: u32,

    #[serde(default = "default_quick_win_max_position")]
    pub quick_win_max_position: u32,

    /// Maximum ranked keywords requested for the audited domain
    #[serde(default = "default_rankings_limit")]
    pub rankings_limit: u32,

    #[serde(default = "default_max_competitors")]
    pub max_competitors: usize,
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_concurrency() -> usize {
    5
}

fn default_max_seeds() -> usize {
    50
}

fn default_max_opportunities() -> usize {
    25
}

fn default_max_briefs() -> usize {
    5
}

fn default_thin_content_words() -> u32 {
    300
}

fn default_quick_win_min_position() -> u32 {
    4
}

fn default_quick_win_max_position() -> u32 {
    20
}

fn default_rankings_limit() -> u32 {
    1000
}

fn default_max_competitors() -> usize {
    10
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            concurrency: default_concurrency(),
            max_seeds: default_max_seeds(),
            max_opportunities: default_max_opportunities(),
            max_briefs: default_max_briefs(),
            thin_content_words: default_thin_content_words(),
            quick_win_min_position: default_quick_win_min_position(),
            quick_win_max_position: default_quick_win_max_position(),
            rankings_limit: default_rankings_limit(),
            max_competitors: default_max_competitors(),
        }
    }
}

/// Everything a component sees while it runs
pub struct AuditContext<'a> {
    pub audit_id: Uuid,
    pub site_url: &'a str,

    /// Host of `site_url`, without `www.`
    pub domain: &'a str,

    /// State as of the moment the component was started
    pub state: &'a PipelineState,

    pub services: &'a Services,

    /// Collects API usage for this component run
    pub meter: &'a UsageMeter,

    pub settings: &'a AnalysisSettings,
}

impl AuditContext<'_> {
    /// Result of a dependency, or a retriable error naming what is missing
    pub fn require<'s, T: ?Sized>(
        &'s self,
        key: ComponentKey,
        get: impl FnOnce(&'s PipelineState) -> Option<&'s T>,
    ) -> ComponentResult<&'s T> {
        get(self.state)
            .ok_or_else(|| ComponentError::retriable(format!("Missing result of '{}'", key)))
    }
}

/// The standard set of components, in registration order
pub fn default_components() -> Vec<Arc<dyn Component>> {
    vec![
        Arc::new(CrawlComponent),
        Arc::new(TechnicalIssuesComponent),
        Arc::new(CurrentRankingsComponent),
        Arc::new(CompetitorAnalysisComponent),
        Arc::new(KeywordOpportunitiesComponent),
        Arc::new(QuickWinsComponent),
        Arc::new(BriefsComponent),
    ]
}

/// Validated registry of [`default_components`]
pub fn default_registry() -> Result<ComponentRegistry, RegistryError> {
    ComponentRegistry::build(default_components())
}
