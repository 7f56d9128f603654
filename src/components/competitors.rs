//! Competitor analysis: domains fighting for the same search results.

use async_trait::async_trait;

use crate::domain::{ComponentKey, ComponentOutput, ComponentResult};

use super::{AuditContext, Component};

pub struct CompetitorAnalysisComponent;

#[async_trait]
impl Component for CompetitorAnalysisComponent {
    fn key(&self) -> ComponentKey {
        ComponentKey::CompetitorAnalysis
    }

    fn dependencies(&self) -> &'static [ComponentKey] {
        &[ComponentKey::Crawl]
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> ComponentResult<ComponentOutput> {
        let mut competitors = ctx
            .services
            .keywords
            .discover_competitors(ctx.meter, ctx.domain)
            .await?;

        // The provider sometimes lists the audited domain itself
        competitors.retain(|c| {
            let domain = c.domain.trim_start_matches("www.");
            !domain.eq_ignore_ascii_case(ctx.domain)
        });
        competitors.sort_by(|a, b| b.common_keywords.cmp(&a.common_keywords));
        competitors.truncate(ctx.settings.max_competitors);

        Ok(ComponentOutput::CompetitorAnalysis(competitors))
    }
}
