//! Content briefs for the best keyword opportunities.
//!
//! One AI brief per opportunity, fanned out with bounded concurrency. A
//! failed brief is logged and skipped; the step only fails when every
//! brief failed.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::{
    ApiError, BriefRequest, ComponentError, ComponentKey, ComponentOutput, ComponentResult,
    ContentBrief, ErrorKind, KeywordOpportunity, PipelineState,
};
use crate::resilience::{partition_outcomes, run_bounded_streaming};

use super::{AuditContext, Component};

/// Competitor domains passed to each brief
const MAX_COMPETITOR_DOMAINS: usize = 5;

pub struct BriefsComponent;

#[async_trait]
impl Component for BriefsComponent {
    fn key(&self) -> ComponentKey {
        ComponentKey::Briefs
    }

    fn dependencies(&self) -> &'static [ComponentKey] {
        &[ComponentKey::KeywordOpportunities, ComponentKey::CompetitorAnalysis]
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> ComponentResult<ComponentOutput> {
        let opportunities = ctx.require(
            ComponentKey::KeywordOpportunities,
            PipelineState::keyword_opportunities,
        )?;
        let competitors = ctx.require(ComponentKey::CompetitorAnalysis, PipelineState::competitors)?;

        let targets: Vec<&KeywordOpportunity> =
            opportunities.iter().take(ctx.settings.max_briefs).collect();
        if targets.is_empty() {
            return Ok(ComponentOutput::Briefs(Vec::new()));
        }

        let competitor_domains: Vec<String> = competitors
            .iter()
            .take(MAX_COMPETITOR_DOMAINS)
            .map(|c| c.domain.clone())
            .collect();
        let competitor_domains = &competitor_domains;

        let outcomes = run_bounded_streaming(
            targets,
            ctx.settings.concurrency,
            |opportunity| async move { write_brief(ctx, opportunity, competitor_domains).await },
            |outcome, done, total| {
                debug!(audit_id = %ctx.audit_id, ok = outcome.is_ok(), done, total, "Brief finished");
            },
        )
        .await;

        let (briefs, failures) = partition_outcomes(outcomes);
        if briefs.is_empty() {
            return Err(all_failed(failures.into_iter().map(|(_, e)| e).collect()));
        }
        if !failures.is_empty() {
            warn!(
                audit_id = %ctx.audit_id,
                failed = failures.len(),
                succeeded = briefs.len(),
                "Some content briefs failed"
            );
        }

        Ok(ComponentOutput::Briefs(
            briefs.into_iter().map(|(_, brief)| brief).collect(),
        ))
    }
}

async fn write_brief(
    ctx: &AuditContext<'_>,
    opportunity: &KeywordOpportunity,
    competitor_domains: &[String],
) -> Result<ContentBrief, ApiError> {
    // Briefs are still useful without SERP context
    let serp_titles = match ctx
        .services
        .keywords
        .serp_results(ctx.meter, &opportunity.keyword)
        .await
    {
        Ok(results) => results
            .into_iter()
            .map(|r| r.title)
            .filter(|t| !t.is_empty())
            .collect(),
        Err(e) => {
            debug!(keyword = %opportunity.keyword, error = %e, "SERP lookup failed");
            Vec::new()
        }
    };

    let request = BriefRequest {
        keyword: opportunity.keyword.clone(),
        topic: opportunity.topic.clone(),
        intent: opportunity.intent,
        serp_titles,
        competitor_domains: competitor_domains.to_vec(),
    };
    ctx.services.ai.generate_brief(ctx.meter, &request).await
}

fn all_failed(errors: Vec<ApiError>) -> ComponentError {
    let retriable = !errors.iter().any(|e| e.kind == ErrorKind::AuthError);
    let message = match errors.first() {
        Some(first) => format!("All {} content briefs failed; first error: {}", errors.len(), first),
        None => "All content briefs failed".to_string(),
    };
    ComponentError { message, retriable }
}
