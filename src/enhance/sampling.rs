//! A [`KnowledgeEnhancer`] that asks the sampling subsystem for a rewrite.

use std::sync::Arc;

use async_trait::async_trait;

use super::{EnhanceError, EnhancementRequest, EnhancementResponse, KnowledgeEnhancer};
use crate::ai::repair::parse_with_repair;
use crate::ai::sampling::{sample_with_rerank, Message, RerankOptions, SamplingClient, SamplingRequest};
use crate::ai::{CancellationToken, ExecutionContext};
use crate::config::AiConfig;

const SYSTEM_PROMPT: &str = "You rewrite container artifacts to fix reported problems without changing what they do. \
Reply with a single JSON object and nothing else.";

pub struct SamplingEnhancer {
    ctx: ExecutionContext,
    max_tokens: u32,
    temperature: f32,
    repair_attempts: usize,
    model: Option<String>,
}

impl SamplingEnhancer {
    pub fn new(client: Arc<dyn SamplingClient>) -> Self {
        Self {
            ctx: ExecutionContext::new(client),
            max_tokens: 4096,
            temperature: 0.2,
            repair_attempts: 1,
            model: None,
        }
    }

    pub fn from_config(client: Arc<dyn SamplingClient>, config: &AiConfig) -> Self {
        Self {
            ctx: ExecutionContext::new(client),
            max_tokens: config.max_tokens.max(4096),
            temperature: config.temperature,
            repair_attempts: config.repair_attempts,
            model: Some(config.model.clone()),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.ctx.cancel = cancel;
        self
    }

    fn request(&self, request: &EnhancementRequest) -> SamplingRequest {
        SamplingRequest {
            messages: vec![Message::user(enhancement_prompt(request))],
            system: Some(SYSTEM_PROMPT.to_string()),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            model: self.model.clone(),
        }
    }
}

fn enhancement_prompt(request: &EnhancementRequest) -> String {
    let issues = request
        .issues
        .iter()
        .map(|i| {
            format!(
                "- [{}] ({}) {}",
                match i.severity {
                    super::IssueSeverity::Error => "error",
                    super::IssueSeverity::Warning => "warning",
                },
                i.category,
                i.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Rewrite the following {context} to fix these issues. Goal: {goal}.\n\n\
Issues:\n{issues}\n\n\
Respond with JSON: {{\"enhancedContent\": \"...\", \"knowledgeApplied\": [\"...\"], \
\"confidence\": 0.0-1.0, \"suggestions\": [\"...\"], \"analysis\": \"...\"}}\n\n\
Content:\n```\n{content}\n```",
        context = request.context,
        goal = request.target_improvement,
        issues = issues,
        content = request.content,
    )
}

/// Scores rewrite candidates by whether they look like the requested object.
fn rewrite_score(text: &str) -> f64 {
    let mut score = 0.0;
    if text.contains("\"enhancedContent\"") {
        score += 60.0;
    }
    if text.contains("\"knowledgeApplied\"") {
        score += 20.0;
    }
    if text.contains("\"confidence\"") {
        score += 20.0;
    }
    score
}

#[async_trait]
impl KnowledgeEnhancer for SamplingEnhancer {
    async fn enhance(&self, request: EnhancementRequest) -> Result<EnhancementResponse, EnhanceError> {
        let outcome = sample_with_rerank(
            &self.ctx,
            || self.request(&request),
            rewrite_score,
            &RerankOptions::default(),
        )
        .await?;

        let mut response: EnhancementResponse = parse_with_repair(&outcome.text, self.repair_attempts)?;
        if response.enhanced_content.trim().is_empty() {
            return Err(EnhanceError::Empty);
        }
        response.confidence = response.confidence.clamp(0.0, 1.0);
        Ok(response)
    }
}
