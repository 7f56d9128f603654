//! siteaudit - resilient SEO-audit pipeline
//!
//! Runs the analysis components of an SEO audit against unreliable
//! external services, one pass at a time, so that a job queue can drive an
//! audit to completion across restarts and partial failures.
//!
//! # Architecture
//!
//! The system is built around a persisted pipeline state:
//! - Every component transition is saved before the next one starts
//! - A pass re-runs whatever is pending, failed, or stuck running
//! - Completed components are never re-executed
//!
//! # Modules
//!
//! - `adapters`: External services (crawler, keyword intelligence, AI)
//! - `components`: The analysis steps of an audit
//! - `core`: Orchestration logic (Registry, StateStore, PipelineRunner)
//! - `domain`: Data structures (PipelineState, ComponentProgress, results)
//! - `resilience`: Circuit breaker, response cache, bounded concurrency
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create an audit
//! siteaudit create https://example.com
//!
//! # Run passes until the audit settles
//! siteaudit step <audit-id> --until-done
//!
//! # Check audit status
//! siteaudit status <audit-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod components;
pub mod config;
pub mod core;
pub mod domain;
pub mod resilience;

// Re-export main types at crate root for convenience
pub use components::{default_registry, AnalysisSettings, AuditContext, Component, Services};
pub use crate::core::{ComponentRegistry, PipelineRunner, PipelineSettings, StateStore};
pub use domain::{AuditStatus, ComponentKey, ComponentProgress, ComponentStatus, PipelineState};
