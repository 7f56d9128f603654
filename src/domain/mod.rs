//! Domain types for the audit pipeline.
//!
//! This module contains the core data structures:
//! - Component keys and per-component progress
//! - Pipeline state (the persisted per-audit record)
//! - Result types for external calls and component runs
//! - Crawl, keyword and AI payloads, and component outputs

pub mod component;
pub mod crawl;
pub mod events;
pub mod market;
pub mod progress;
pub mod report;
pub mod results;
pub mod state;

// Re-export commonly used types
pub use component::{ComponentKey, UnknownComponent};
pub use crawl::{CrawlSnapshot, PageRecord, RedirectChain};
pub use events::TransitionEvent;
pub use market::{
    BriefRequest, Competitor, ContentBrief, KeywordCluster, KeywordDatum, RankedKeyword,
    RankedKeywordOptions, SearchIntent, SerpResult,
};
pub use progress::{ComponentProgress, ComponentStatus, TransitionError};
pub use report::{
    ComponentOutput, IssueKind, KeywordOpportunity, QuickWin, Severity, TechnicalIssue,
    TechnicalReport,
};
pub use results::{
    ApiError, ApiResult, CallFailure, ComponentError, ComponentResult, ErrorKind,
};
pub use state::{ApiUsage, AuditStatus, PipelineState};
