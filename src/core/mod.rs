//! Core orchestration logic.
//!
//! This module contains:
//! - Registry: components and their dependency graph
//! - StateStore: persisted per-audit pipeline state
//! - Orchestrator: the pass-at-a-time pipeline runner

pub mod orchestrator;
pub mod registry;
pub mod state_store;

pub use orchestrator::{components_to_run, PipelineRunner, PipelineSettings};
pub use registry::{ComponentRegistry, DependencyGraph, RegistryError};
pub use state_store::{FileStateStore, MemoryStateStore, StateStore, StateStoreError};
