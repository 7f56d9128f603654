//! Keyword opportunities: keywords the site talks about but does not rank for.
//!
//! Seeds come from page titles and H1s. Seeds the site already ranks for in
//! the top 10 are dropped, the rest get search metrics in one batch, then
//! intent and topic from the AI service. AI failures degrade the output
//! (unknown intent, one topic per keyword) instead of failing the step.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::{
    ComponentKey, ComponentOutput, ComponentResult, CrawlSnapshot, KeywordDatum,
    KeywordOpportunity, PipelineState, RankedKeyword, SearchIntent,
};
use crate::resilience::run_bounded;

use super::{AuditContext, Component};

/// Rankings at or above this position count as already won
const TOP_POSITION: u32 = 10;

pub struct KeywordOpportunitiesComponent;

#[async_trait]
impl Component for KeywordOpportunitiesComponent {
    fn key(&self) -> ComponentKey {
        ComponentKey::KeywordOpportunities
    }

    fn dependencies(&self) -> &'static [ComponentKey] {
        &[ComponentKey::Crawl, ComponentKey::CurrentRankings]
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> ComponentResult<ComponentOutput> {
        let snapshot = ctx.require(ComponentKey::Crawl, PipelineState::crawl_snapshot)?;
        let rankings = ctx.require(ComponentKey::CurrentRankings, PipelineState::current_rankings)?;

        let seeds = seed_keywords(snapshot, rankings, ctx.settings.max_seeds);
        if seeds.is_empty() {
            debug!(audit_id = %ctx.audit_id, "No seed keywords");
            return Ok(ComponentOutput::KeywordOpportunities(Vec::new()));
        }

        let data: Vec<KeywordDatum> = ctx
            .services
            .keywords
            .keyword_data(ctx.meter, &seeds)
            .await?
            .into_iter()
            .filter(|d| d.search_volume > 0)
            .collect();
        if data.is_empty() {
            debug!(audit_id = %ctx.audit_id, seeds = seeds.len(), "No seed keyword has search volume");
            return Ok(ComponentOutput::KeywordOpportunities(Vec::new()));
        }
        let keywords: Vec<String> = data.iter().map(|d| d.keyword.clone()).collect();

        let intents = classify_intents(ctx, &keywords).await;
        let topics = assign_topics(ctx, &keywords).await;

        let mut opportunities: Vec<KeywordOpportunity> = data
            .into_iter()
            .zip(intents)
            .map(|(datum, intent)| {
                let topic = topics
                    .get(&datum.keyword)
                    .cloned()
                    .unwrap_or_else(|| datum.keyword.clone());
                KeywordOpportunity {
                    score: opportunity_score(datum.search_volume, datum.difficulty),
                    keyword: datum.keyword,
                    topic,
                    intent,
                    search_volume: datum.search_volume,
                    difficulty: datum.difficulty,
                }
            })
            .collect();

        opportunities.sort_by(|a, b| b.score.total_cmp(&a.score));
        opportunities.truncate(ctx.settings.max_opportunities);

        Ok(ComponentOutput::KeywordOpportunities(opportunities))
    }
}

/// Volume discounted by difficulty
pub fn opportunity_score(search_volume: u64, difficulty: u8) -> f64 {
    let ease = 100u8.saturating_sub(difficulty) as f64 / 100.0;
    search_volume as f64 * ease
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Distinct title/H1 phrases not already ranked in the top 10
pub fn seed_keywords(
    snapshot: &CrawlSnapshot,
    rankings: &[RankedKeyword],
    max_seeds: usize,
) -> Vec<String> {
    let ranked: HashSet<String> = rankings
        .iter()
        .filter(|r| r.position <= TOP_POSITION)
        .map(|r| normalize(&r.keyword))
        .collect();

    let mut seen = HashSet::new();
    snapshot
        .pages
        .iter()
        .filter(|p| p.status_code == 200)
        .flat_map(|p| [p.title.as_deref(), p.h1.as_deref()])
        .flatten()
        .map(normalize)
        .filter(|s| s.len() > 2 && !ranked.contains(s))
        .filter(|s| seen.insert(s.clone()))
        .take(max_seeds)
        .collect()
}

/// Intent per keyword, in input order; failures read as unknown
async fn classify_intents(ctx: &AuditContext<'_>, keywords: &[String]) -> Vec<SearchIntent> {
    let ai = &ctx.services.ai;
    let outcomes = run_bounded(keywords.to_vec(), ctx.settings.concurrency, |keyword| async move {
        ai.classify_intent(ctx.meter, &keyword).await
    })
    .await;

    let mut intents = vec![SearchIntent::Unknown; keywords.len()];
    let mut failed = 0;
    for outcome in outcomes {
        match outcome.result {
            Ok(intent) => intents[outcome.index] = intent,
            Err(_) => failed += 1,
        }
    }
    if failed > 0 {
        warn!(audit_id = %ctx.audit_id, failed, "Intent classification failed for some keywords");
    }
    intents
}

/// Keyword to topic; every keyword is its own topic when clustering fails
async fn assign_topics(ctx: &AuditContext<'_>, keywords: &[String]) -> HashMap<String, String> {
    match ctx.services.ai.cluster_keywords(ctx.meter, keywords).await {
        Ok(clusters) => clusters
            .into_iter()
            .flat_map(|cluster| {
                let topic = cluster.topic;
                cluster
                    .keywords
                    .into_iter()
                    .map(move |keyword| (keyword, topic.clone()))
            })
            .collect(),
        Err(e) => {
            warn!(audit_id = %ctx.audit_id, error = %e, "Keyword clustering failed");
            keywords.iter().map(|k| (k.clone(), k.clone())).collect()
        }
    }
}
