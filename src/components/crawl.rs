//! Crawl: pull the site snapshot from the crawler.

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{ComponentError, ComponentKey, ComponentOutput, ComponentResult};

use super::{AuditContext, Component};

pub struct CrawlComponent;

#[async_trait]
impl Component for CrawlComponent {
    fn key(&self) -> ComponentKey {
        ComponentKey::Crawl
    }

    fn dependencies(&self) -> &'static [ComponentKey] {
        &[]
    }

    async fn run(&self, ctx: &AuditContext<'_>) -> ComponentResult<ComponentOutput> {
        let crawler = &ctx.services.crawler;
        let snapshot = crawler.fetch(ctx.site_url).await.map_err(|e| {
            ComponentError::retriable(format!("{:#}", e)).context(format!("crawler '{}'", crawler.name()))
        })?;

        debug!(
            audit_id = %ctx.audit_id,
            pages = snapshot.pages.len(),
            "Crawl snapshot loaded"
        );
        Ok(ComponentOutput::Crawl(snapshot))
    }
}
