//! Generative-AI adapter.
//!
//! Prompt in, structured JSON out. Calls go through the AI dependency's
//! breaker; nothing is cached since generations are not reproducible.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::{
    ApiResult, BriefRequest, CallFailure, ContentBrief, KeywordCluster, SearchIntent,
};
use crate::resilience::CircuitBreaker;

use super::http::HttpJsonClient;
use super::usage::{Dependency, UsageMeter};
use super::AiApi;

/// Intent classification reply
#[derive(Debug, serde::Deserialize)]
struct IntentReply {
    intent: SearchIntent,
}

/// AI provider over HTTP
pub struct HttpAiApi {
    http: HttpJsonClient,
}

impl HttpAiApi {
    pub fn new(http: HttpJsonClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AiApi for HttpAiApi {
    fn name(&self) -> &str {
        "ai"
    }

    async fn cluster_keywords(&self, keywords: &[String]) -> Result<Vec<KeywordCluster>, CallFailure> {
        self.http
            .post(
                "ai/cluster",
                &json!({
                    "prompt": "Group these search keywords into topical clusters.",
                    "keywords": keywords,
                }),
            )
            .await
    }

    async fn classify_intent(&self, keyword: &str) -> Result<SearchIntent, CallFailure> {
        let reply: IntentReply = self
            .http
            .post(
                "ai/intent",
                &json!({
                    "prompt": "Classify the search intent of this keyword.",
                    "keyword": keyword,
                }),
            )
            .await?;
        Ok(reply.intent)
    }

    async fn generate_brief(&self, request: &BriefRequest) -> Result<ContentBrief, CallFailure> {
        self.http
            .post(
                "ai/brief",
                &json!({
                    "prompt": "Write a content brief for a page targeting this keyword.",
                    "request": request,
                }),
            )
            .await
    }
}

/// Guarded access to the AI service
pub struct AiService {
    api: Arc<dyn AiApi>,
    breaker: Arc<CircuitBreaker>,
}

impl AiService {
    pub fn new(api: Arc<dyn AiApi>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { api, breaker }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn cluster_keywords(
        &self,
        meter: &UsageMeter,
        keywords: &[String],
    ) -> ApiResult<Vec<KeywordCluster>> {
        meter.guarded(Dependency::Ai, &self.breaker, || self.api.cluster_keywords(keywords)).await
    }

    pub async fn classify_intent(&self, meter: &UsageMeter, keyword: &str) -> ApiResult<SearchIntent> {
        meter.guarded(Dependency::Ai, &self.breaker, || self.api.classify_intent(keyword)).await
    }

    pub async fn generate_brief(
        &self,
        meter: &UsageMeter,
        request: &BriefRequest,
    ) -> ApiResult<ContentBrief> {
        meter.guarded(Dependency::Ai, &self.breaker, || self.api.generate_brief(request)).await
    }
}
