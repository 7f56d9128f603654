//! Quick wins: existing rankings just off the top of page one.

use async_trait::async_trait;

use crate::domain::{
    ComponentKey, ComponentOutput, ComponentResult, PipelineState, QuickWin, RankedKeyword,
    TechnicalReport,
};

use super::{AuditContext, Component};

/// Score multiplier when the ranking page has fixable technical issues
const TECHNICAL_BOOST: f64 = 1.25;

pub struct QuickWinsComponent;

#[async_trait]
impl Component for QuickWinsComponent {
    fn key(&self) -> ComponentKey {
        ComponentKey::QuickWins
    }

    fn dependencies(&self) -> &'static [ComponentKey] {
        &[ComponentKey::CurrentRankings, ComponentKey::TechnicalIssues]
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> ComponentResult<ComponentOutput> {
        let rankings = ctx.require(ComponentKey::CurrentRankings, PipelineState::current_rankings)?;
        let report = ctx.require(ComponentKey::TechnicalIssues, PipelineState::technical_report)?;

        let positions = ctx.settings.quick_win_min_position..=ctx.settings.quick_win_max_position;
        Ok(ComponentOutput::QuickWins(find_quick_wins(
            rankings, report, positions,
        )))
    }
}

/// Rankings inside `positions`, best score first
pub fn find_quick_wins(
    rankings: &[RankedKeyword],
    report: &TechnicalReport,
    positions: std::ops::RangeInclusive<u32>,
) -> Vec<QuickWin> {
    let mut wins: Vec<QuickWin> = rankings
        .iter()
        .filter(|r| positions.contains(&r.position))
        .map(|r| {
            let has_technical_issues = report.has_issues_for(&r.url);
            let mut score = r.search_volume as f64 / r.position.max(1) as f64;
            if has_technical_issues {
                score *= TECHNICAL_BOOST;
            }
            QuickWin {
                keyword: r.keyword.clone(),
                url: r.url.clone(),
                position: r.position,
                search_volume: r.search_volume,
                has_technical_issues,
                score,
            }
        })
        .collect();

    wins.sort_by(|a, b| b.score.total_cmp(&a.score));
    wins
}
