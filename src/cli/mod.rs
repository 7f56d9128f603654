//! Command-line interface for siteaudit.
//!
//! Provides commands for creating audits, running pipeline passes,
//! inspecting audit state, and showing the component graph and config.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::adapters::{
    AiService, FileCrawlSource, HttpAiApi, HttpJsonClient, HttpKeywordApi, KeywordService,
};
use crate::components::{default_registry, Services};
use crate::config::{self, ResolvedConfig};
use crate::core::{FileStateStore, PipelineRunner, StateStore};
use crate::domain::AuditStatus;
use crate::resilience::{CircuitBreaker, Clock, ResponseCache, SystemClock};

/// siteaudit - resilient SEO-audit pipeline
#[derive(Parser, Debug)]
#[command(name = "siteaudit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new audit for a site
    Create {
        /// Site URL (e.g. https://example.com)
        site_url: String,
    },

    /// Run a pipeline pass for an audit
    Step {
        /// Audit ID (UUID)
        audit_id: String,

        /// Keep running passes while the audit asks for another one
        #[arg(long)]
        until_done: bool,

        /// Upper bound on passes with --until-done
        #[arg(long, default_value = "10")]
        max_passes: u32,
    },

    /// Show the state of an audit
    Status {
        /// Audit ID (UUID)
        audit_id: String,

        /// Print the full state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which components the next pass would run
    Pending {
        /// Audit ID (UUID)
        audit_id: String,
    },

    /// List known audits
    List,

    /// Show the component dependency graph
    Graph,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Create { site_url } => create_audit(&site_url).await,
            Commands::Step {
                audit_id,
                until_done,
                max_passes,
            } => run_step(&audit_id, until_done, max_passes).await,
            Commands::Status { audit_id, json } => show_status(&audit_id, json).await,
            Commands::Pending { audit_id } => show_pending(&audit_id).await,
            Commands::List => list_audits().await,
            Commands::Graph => show_graph(),
            Commands::Config => show_config(),
        }
    }
}

/// Wire a runner from configuration: file store, file crawler, HTTP services
pub fn build_runner(cfg: &ResolvedConfig) -> Result<PipelineRunner> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = default_registry().context("Invalid component registry")?;

    let breaker = |name: &str| {
        Arc::new(CircuitBreaker::new(
            name,
            cfg.retry.clone(),
            cfg.breaker.clone(),
            clock.clone(),
        ))
    };

    let keywords_http = HttpJsonClient::new(
        cfg.keywords_url.clone(),
        cfg.keywords_api_key.clone(),
        cfg.request_timeout(),
    )?;
    let ai_http = HttpJsonClient::new(
        cfg.ai_url.clone(),
        cfg.ai_api_key.clone(),
        cfg.request_timeout(),
    )?;

    let services = Services {
        crawler: Arc::new(FileCrawlSource::new(cfg.crawl_dir.clone())),
        keywords: KeywordService::new(
            Arc::new(HttpKeywordApi::new(keywords_http)),
            breaker("keywords"),
            Arc::new(ResponseCache::new("keywords", cfg.cache.clone(), clock.clone())),
            cfg.pipeline.analysis.locale.clone(),
        ),
        ai: AiService::new(Arc::new(HttpAiApi::new(ai_http)), breaker("ai")),
    };

    let store = Arc::new(FileStateStore::new(cfg.audits_dir()));
    Ok(PipelineRunner::new(
        registry,
        store,
        services,
        clock,
        cfg.pipeline.clone(),
    ))
}

fn parse_audit_id(audit_id: &str) -> Result<Uuid> {
    Uuid::parse_str(audit_id).with_context(|| format!("Invalid audit ID: {}", audit_id))
}

fn runner() -> Result<PipelineRunner> {
    build_runner(config::config()?)
}

/// Create an audit and print its ID
async fn create_audit(site_url: &str) -> Result<()> {
    let state = runner()?.create_audit(site_url).await?;

    println!("Audit created: {}", state.audit_id);
    println!("Site: {}", state.site_url);
    println!("Components: {}", state.progress.len());
    Ok(())
}

/// Run one pass (or several with --until-done)
async fn run_step(audit_id: &str, until_done: bool, max_passes: u32) -> Result<()> {
    let audit_id = parse_audit_id(audit_id)?;
    let runner = runner()?;

    let mut passes = 0;
    loop {
        let status = runner.run_pipeline_step(audit_id).await?;
        passes += 1;
        println!("Pass {}: {}", passes, status);

        if !until_done || !status.needs_another_pass() || passes >= max_passes {
            break;
        }

        // Another worker may still own the running component
        if status == AuditStatus::Analyzing {
            let wait = runner.settings().stale_threshold();
            println!("Waiting {}s for running components", wait.as_secs());
            tokio::time::sleep(wait).await;
        }
    }

    let state = runner.load_state(audit_id).await?;
    println!(
        "Retries: {}  API requests: {}  cache hits: {}",
        state.retry_count,
        state.usage.total_requests(),
        state.usage.cache_hits
    );
    Ok(())
}

/// Show the status of an audit
async fn show_status(audit_id: &str, json: bool) -> Result<()> {
    let audit_id = parse_audit_id(audit_id)?;
    let runner = runner()?;
    let state = runner.load_state(audit_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    println!("Audit ID: {}", state.audit_id);
    println!("Site: {}", state.site_url);
    println!("Status: {}", runner.overall_status(&state));
    println!("Created: {}", state.created_at);
    println!("Updated: {}", state.updated_at);
    println!("Retries: {}", state.retry_count);
    println!("\nComponents:");
    for (key, progress) in &state.progress {
        let detail = match (progress.error(), state.results.get(key)) {
            (Some(error), _) => error.to_string(),
            (None, Some(output)) => output.summary(),
            (None, None) => String::new(),
        };
        println!("  {:<22} {:<10} {}", key.as_str(), progress.status(), detail);
    }

    let usage = &state.usage;
    println!("\nAPI usage:");
    println!("  Keyword requests: {}", usage.keyword_requests);
    println!("  AI requests:      {}", usage.ai_requests);
    println!("  Cache hits/miss:  {}/{}", usage.cache_hits, usage.cache_misses);
    println!("  Short circuits:   {}", usage.short_circuits);
    println!("  Failed calls:     {}", usage.failed_calls);

    let transitions = runner.transitions(audit_id).await?;
    println!("\nTransitions: {}", transitions.len());
    for event in transitions.iter().rev().take(5).rev() {
        println!(
            "  {} {:<22} {} -> {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.component.as_str(),
            event.from,
            event.to
        );
    }

    Ok(())
}

/// Show the components the next pass would execute
async fn show_pending(audit_id: &str) -> Result<()> {
    let audit_id = parse_audit_id(audit_id)?;
    let runner = runner()?;
    let state = runner.load_state(audit_id).await?;

    let pending = runner.components_to_run(&state);
    if pending.is_empty() {
        println!("Nothing to run");
        return Ok(());
    }

    let completed = state.completed();
    for key in runner.registry().order(&pending) {
        let ready = runner.registry().graph().is_ready(key, &completed);
        println!(
            "  {:<22} {:<10} {}",
            key.as_str(),
            state.status_of(key),
            if ready { "ready" } else { "blocked" }
        );
    }
    Ok(())
}

/// List audits in the state directory
async fn list_audits() -> Result<()> {
    let cfg = config::config()?;
    let store = FileStateStore::new(cfg.audits_dir());
    let audits = store.list_audits().await?;

    if audits.is_empty() {
        println!("No audits found");
        return Ok(());
    }

    println!("{:<38} {:<12} {}", "AUDIT ID", "STATUS", "SITE");
    println!("{}", "-".repeat(75));

    for audit_id in audits {
        match store.load(audit_id).await {
            Ok(state) => println!(
                "{:<38} {:<12} {}",
                audit_id,
                state.overall_status(&cfg.pipeline.critical_components),
                state.site_url
            ),
            Err(e) => println!("{:<38} {:<12} {}", audit_id, "unreadable", e),
        }
    }
    Ok(())
}

/// Print each component with its dependencies and dependents
fn show_graph() -> Result<()> {
    let registry = default_registry()?;
    let graph = registry.graph();

    for key in registry.order(registry.keys()) {
        let join = |keys: Vec<&str>| {
            if keys.is_empty() {
                "-".to_string()
            } else {
                keys.join(", ")
            }
        };
        let deps = join(graph.dependencies(key).iter().map(|k| k.as_str()).collect());
        let dependents = join(graph.dependents(key).iter().map(|k| k.as_str()).collect());
        println!("{:<22} needs: {:<40} feeds: {}", key.as_str(), deps, dependents);
    }
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("siteaudit configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:    {}", cfg.home.display());
    println!("  Audits:  {}", cfg.audits_dir().display());
    println!("  Crawls:  {}", cfg.crawl_dir.display());
    println!();
    println!("Services:");
    println!(
        "  Keywords: {} (key {})",
        cfg.keywords_url,
        if cfg.keywords_api_key.is_some() { "set" } else { "unset" }
    );
    println!(
        "  AI:       {} (key {})",
        cfg.ai_url,
        if cfg.ai_api_key.is_some() { "set" } else { "unset" }
    );
    println!();
    println!("Settings:");
    println!("{}", serde_yaml::to_string(&serde_json::json!({
        "retry": cfg.retry,
        "breaker": cfg.breaker,
        "cache": cfg.cache,
        "pipeline": cfg.pipeline,
    }))?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_step_flags() {
        let cli = Cli::parse_from([
            "siteaudit",
            "step",
            "8f1d2c3e-0000-4000-8000-000000000000",
            "--until-done",
        ]);
        match cli.command {
            Commands::Step {
                until_done,
                max_passes,
                ..
            } => {
                assert!(until_done);
                assert_eq!(max_passes, 10);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_audit_id() {
        assert!(parse_audit_id("not-a-uuid").is_err());
    }
}
