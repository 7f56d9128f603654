//! Current rankings: keywords the audited domain already ranks for.

use async_trait::async_trait;

use crate::domain::{ComponentKey, ComponentOutput, ComponentResult};

use super::{AuditContext, Component};

pub struct CurrentRankingsComponent;

#[async_trait]
impl Component for CurrentRankingsComponent {
    fn key(&self) -> ComponentKey {
        ComponentKey::CurrentRankings
    }

    fn dependencies(&self) -> &'static [ComponentKey] {
        &[ComponentKey::Crawl]
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> ComponentResult<ComponentOutput> {
        let mut rankings = ctx
            .services
            .keywords
            .domain_ranked_keywords(ctx.meter, ctx.domain, ctx.settings.rankings_limit)
            .await?;

        rankings.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| b.search_volume.cmp(&a.search_volume))
        });
        Ok(ComponentOutput::CurrentRankings(rankings))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapters::UsageMeter;
    use crate::components::testing::{context, services, state_with, FakeKeywords};
    use crate::components::AnalysisSettings;
    use crate::domain::{CrawlSnapshot, RankedKeyword};

    fn ranked(keyword: &str, position: u32) -> RankedKeyword {
        RankedKeyword {
            keyword: keyword.to_string(),
            position,
            url: "https://example.com/".to_string(),
            search_volume: 100,
        }
    }

    #[tokio::test]
    async fn test_rankings_sorted_by_position() {
        let keywords = Arc::new(FakeKeywords {
            rankings: vec![ranked("b", 12), ranked("a", 3)],
            ..Default::default()
        });
        let services = services(CrawlSnapshot::default(), keywords, Arc::default());
        let state = state_with(vec![ComponentOutput::Crawl(CrawlSnapshot::default())]);
        let meter = UsageMeter::new();
        let settings = AnalysisSettings::default();

        let output = CurrentRankingsComponent
            .run(&context(&state, &services, &meter, &settings))
            .await
            .unwrap();

        match output {
            ComponentOutput::CurrentRankings(rankings) => {
                assert_eq!(rankings[0].keyword, "a");
                assert_eq!(rankings[1].keyword, "b");
            }
            other => panic!("unexpected output: {:?}", other),
        }
        assert_eq!(meter.snapshot().keyword_requests, 1);
    }
}
