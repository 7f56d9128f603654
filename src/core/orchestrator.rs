//! Pipeline runner.
//!
//! Drives one audit forward one pass at a time. A pass loads the state,
//! picks the components that need work (pending, failed, or stuck running),
//! runs them in dependency order and persists after every transition. The
//! job queue calls [`PipelineRunner::run_pipeline_step`] again while the
//! returned status asks for another pass.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::crawler::site_host;
use crate::adapters::UsageMeter;
use crate::components::{AnalysisSettings, AuditContext, Services};
use crate::domain::{
    AuditStatus, ComponentKey, ComponentStatus, PipelineState, TransitionEvent,
};
use crate::resilience::Clock;

use super::registry::ComponentRegistry;
use super::state_store::StateStore;

/// Runner tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// A running component older than this is considered abandoned
    #[serde(default = "default_stale_threshold_secs")]
    pub stale_threshold_secs: u64,

    /// Components whose failure fails the whole audit
    #[serde(default = "default_critical_components")]
    pub critical_components: Vec<ComponentKey>,

    #[serde(default)]
    pub analysis: AnalysisSettings,
}

fn default_stale_threshold_secs() -> u64 {
    600
}

fn default_critical_components() -> Vec<ComponentKey> {
    vec![ComponentKey::Crawl]
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stale_threshold_secs: default_stale_threshold_secs(),
            critical_components: default_critical_components(),
            analysis: AnalysisSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }
}

/// Components of `state` that the next pass should execute, in key order
pub fn components_to_run(
    state: &PipelineState,
    now: DateTime<Utc>,
    stale_threshold: Duration,
) -> Vec<ComponentKey> {
    state
        .progress
        .iter()
        .filter(|(_, progress)| progress.needs_execution(now, stale_threshold))
        .map(|(key, _)| *key)
        .collect()
}

/// Executes audit passes against a state store
pub struct PipelineRunner {
    registry: ComponentRegistry,
    store: Arc<dyn StateStore>,
    services: Services,
    clock: Arc<dyn Clock>,
    settings: PipelineSettings,
}

impl PipelineRunner {
    pub fn new(
        registry: ComponentRegistry,
        store: Arc<dyn StateStore>,
        services: Services,
        clock: Arc<dyn Clock>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            store,
            services,
            clock,
            settings,
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Create a new audit with every registered component pending
    #[instrument(skip(self))]
    pub async fn create_audit(&self, site_url: &str) -> Result<PipelineState> {
        site_host(site_url)?;

        let state = PipelineState::new(
            Uuid::new_v4(),
            site_url,
            self.registry.keys().iter().copied(),
            self.clock.now(),
        );
        self.store
            .create(&state)
            .await
            .context("Failed to create audit state")?;

        info!(audit_id = %state.audit_id, "Audit created");
        Ok(state)
    }

    /// Read-only access for reporting
    pub async fn load_state(&self, audit_id: Uuid) -> Result<PipelineState> {
        self.store
            .load(audit_id)
            .await
            .with_context(|| format!("Failed to load audit {}", audit_id))
    }

    pub async fn transitions(&self, audit_id: Uuid) -> Result<Vec<TransitionEvent>> {
        self.store
            .transitions(audit_id)
            .await
            .with_context(|| format!("Failed to read transitions of audit {}", audit_id))
    }

    /// Components the next pass would execute
    pub fn components_to_run(&self, state: &PipelineState) -> Vec<ComponentKey> {
        components_to_run(state, self.clock.now(), self.settings.stale_threshold())
    }

    pub fn overall_status(&self, state: &PipelineState) -> AuditStatus {
        state.overall_status(&self.settings.critical_components)
    }

    /// Run one pass over an audit and report its overall status.
    ///
    /// Errors are reserved for infrastructure failures (state cannot be
    /// loaded or saved). Component failures are recorded in the state.
    #[instrument(skip(self), fields(%audit_id))]
    pub async fn run_pipeline_step(&self, audit_id: Uuid) -> Result<AuditStatus> {
        let mut state = self.load_state(audit_id).await?;
        let now = self.clock.now();
        let threshold = self.settings.stale_threshold();

        let to_run = components_to_run(&state, now, threshold);
        if to_run.is_empty() {
            let status = self.overall_status(&state);
            debug!(%status, "Nothing to run");
            return Ok(status);
        }

        let mut retrying = false;
        for key in &to_run {
            match state.status_of(*key) {
                ComponentStatus::Failed => retrying = true,
                ComponentStatus::Running => {
                    retrying = true;
                    warn!(
                        component = %key,
                        started_at = ?state.progress_of(*key).started_at(),
                        "Component went stale, re-running"
                    );
                }
                _ => {}
            }
        }
        if retrying {
            state.retry_count += 1;
        }

        let order = self.registry.order(&to_run);
        info!(components = ?order, retry_count = state.retry_count, "Starting pass");

        let domain = site_host(&state.site_url)?;
        let mut executed = 0;
        for key in order {
            if !self.registry.graph().is_ready(key, &state.completed()) {
                debug!(component = %key, "Dependencies not completed, skipping");
                continue;
            }
            self.execute_component(&mut state, key, &domain).await?;
            executed += 1;
        }

        // Keep the retry count even when every candidate was blocked
        if executed == 0 && retrying {
            self.store
                .save(&state)
                .await
                .context("Failed to save pipeline state")?;
        }

        let status = self.overall_status(&state);
        info!(%status, "Pass finished");
        Ok(status)
    }

    /// Run one component and persist each transition
    async fn execute_component(
        &self,
        state: &mut PipelineState,
        key: ComponentKey,
        domain: &str,
    ) -> Result<()> {
        let Some(component) = self.registry.get(key).cloned() else {
            warn!(component = %key, "No implementation registered, skipping");
            return Ok(());
        };

        let from = state.status_of(key);
        state.mark_running(key, self.clock.now())?;
        self.persist(
            state,
            TransitionEvent::new(
                state.audit_id,
                key,
                from,
                ComponentStatus::Running,
                self.clock.now(),
                format!("{} started", key),
            ),
        )
        .await?;

        let started = Instant::now();
        let meter = UsageMeter::new();
        let result = {
            let ctx = AuditContext {
                audit_id: state.audit_id,
                site_url: &state.site_url,
                domain,
                state: &*state,
                services: &self.services,
                meter: &meter,
                settings: &self.settings.analysis,
            };
            component.run(&ctx).await
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        state.usage.absorb(&meter.take());

        let now = self.clock.now();
        let event = match result {
            Ok(output) => {
                let summary = output.summary();
                info!(component = %key, duration_ms, %summary, "Component completed");
                state.mark_completed(key, output, now)?;
                TransitionEvent::new(
                    state.audit_id,
                    key,
                    ComponentStatus::Running,
                    ComponentStatus::Completed,
                    now,
                    summary,
                )
            }
            Err(err) => {
                if err.retriable {
                    warn!(component = %key, duration_ms, error = %err, "Component failed");
                } else {
                    error!(component = %key, duration_ms, error = %err, "Component failed permanently");
                }
                state.mark_failed(key, err.message.clone(), now)?;
                TransitionEvent::new(
                    state.audit_id,
                    key,
                    ComponentStatus::Running,
                    ComponentStatus::Failed,
                    now,
                    format!("{} failed", key),
                )
                .with_error(err.message)
            }
        };

        self.persist(state, event.with_duration(duration_ms)).await
    }

    async fn persist(&self, state: &PipelineState, event: TransitionEvent) -> Result<()> {
        self.store
            .save(state)
            .await
            .context("Failed to save pipeline state")?;

        // The log is diagnostic; state is already durable
        if let Err(e) = self.store.append_transition(&event).await {
            warn!(error = %e, "Failed to append transition");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ComponentProgress;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn test_components_to_run_reclassifies_stale() {
        let mut state = PipelineState::new(Uuid::new_v4(), "https://example.com", ComponentKey::ALL, at(0));
        state.progress.insert(
            ComponentKey::Crawl,
            ComponentProgress::Completed {
                started_at: at(0),
                completed_at: at(1),
            },
        );
        state.progress.insert(
            ComponentKey::TechnicalIssues,
            ComponentProgress::Running { started_at: at(0) },
        );
        state.progress.insert(
            ComponentKey::CurrentRankings,
            ComponentProgress::Running { started_at: at(5) },
        );
        state.progress.insert(
            ComponentKey::CompetitorAnalysis,
            ComponentProgress::Failed {
                started_at: Some(at(1)),
                error: "boom".to_string(),
            },
        );

        let to_run = components_to_run(&state, at(15), Duration::from_secs(600));

        assert!(to_run.contains(&ComponentKey::TechnicalIssues));
        assert!(!to_run.contains(&ComponentKey::CurrentRankings));
        assert!(to_run.contains(&ComponentKey::CompetitorAnalysis));
        assert!(!to_run.contains(&ComponentKey::Crawl));
        assert!(to_run.contains(&ComponentKey::Briefs));
    }

    #[test]
    fn test_settings_defaults() {
        let settings: PipelineSettings = serde_yaml::from_str("stale_threshold_secs: 60").unwrap();
        assert_eq!(settings.stale_threshold(), Duration::from_secs(60));
        assert_eq!(settings.critical_components, vec![ComponentKey::Crawl]);
        assert_eq!(settings.analysis.max_briefs, 5);
    }
}
