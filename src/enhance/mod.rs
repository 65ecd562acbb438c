//! Knowledge-assisted rewrites of low-scoring content.
//!
//! [`maybe_enhance`] never fails: any enhancer error or panic is logged and
//! reported as "no enhancement available".

pub mod sampling;

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sampling::SamplingEnhancer;

use crate::ai::AiError;
use crate::types::{Severity, ValidationReport};

/// Default score at or above which no enhancement is attempted.
pub const DEFAULT_THRESHOLD: u8 = 90;

#[derive(Error, Debug)]
pub enum EnhanceError {
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error("enhancer returned no content")]
    Empty,
    #[error("enhancement rejected: {0}")]
    Rejected(String),
}

/// Severity of an issue handed to the enhancer. Info findings are sent as warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

impl From<Severity> for IssueSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => IssueSeverity::Error,
            Severity::Warning | Severity::Info => IssueSeverity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementIssue {
    pub message: String,
    pub severity: IssueSeverity,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementRequest {
    pub content: String,
    /// What the content is, e.g. "dockerfile".
    pub context: String,
    pub issues: Vec<EnhancementIssue>,
    pub target_improvement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementResponse {
    pub enhanced_content: String,
    #[serde(default)]
    pub knowledge_applied: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub analysis: Option<String>,
}

/// What the caller gets back from a successful enhancement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementOutcome {
    pub enhanced_content: String,
    pub knowledge_applied: Vec<String>,
    pub confidence: f64,
    pub suggestions: Vec<String>,
}

impl From<EnhancementResponse> for EnhancementOutcome {
    fn from(response: EnhancementResponse) -> Self {
        Self {
            enhanced_content: response.enhanced_content,
            knowledge_applied: response.knowledge_applied,
            confidence: response.confidence,
            suggestions: response.suggestions,
        }
    }
}

/// The knowledge/enhancement engine.
#[async_trait]
pub trait KnowledgeEnhancer: Send + Sync {
    async fn enhance(&self, request: EnhancementRequest) -> Result<EnhancementResponse, EnhanceError>;
}

/// Category from the rule-id prefix: `no-root-user` becomes `no`, `schema-Service-invalid` becomes `schema`.
pub fn category_from_rule_id(rule_id: &str) -> String {
    let prefix = rule_id.split('-').next().unwrap_or_default();
    if prefix.is_empty() {
        "general".to_string()
    } else {
        prefix.to_string()
    }
}

/// Build an enhancement request from the failing results of a report.
pub fn build_request(report: &ValidationReport, content: &str, context: &str, threshold: u8) -> EnhancementRequest {
    let issues = report
        .failures()
        .map(|r| EnhancementIssue {
            message: r.display_message(),
            severity: r.severity().into(),
            category: category_from_rule_id(&r.rule_id),
        })
        .collect();

    EnhancementRequest {
        content: content.to_string(),
        context: context.to_string(),
        issues,
        target_improvement: format!(
            "raise the validation score from {} to at least {}",
            report.score, threshold
        ),
    }
}

/// Ask the enhancer for a rewrite when the report scores below `threshold`.
pub async fn maybe_enhance(
    report: &ValidationReport,
    content: &str,
    context: &str,
    threshold: u8,
    enhancer: &dyn KnowledgeEnhancer,
) -> Option<EnhancementOutcome> {
    if report.score >= threshold {
        tracing::debug!(score = report.score, threshold, "score meets threshold, skipping enhancement");
        return None;
    }

    let request = build_request(report, content, context, threshold);
    let issues = request.issues.len();

    match AssertUnwindSafe(enhancer.enhance(request)).catch_unwind().await {
        Ok(Ok(response)) => {
            tracing::debug!(issues, confidence = response.confidence, "enhancement produced");
            Some(response.into())
        }
        Ok(Err(e)) => {
            tracing::warn!("enhancement failed, continuing without it: {}", e);
            None
        }
        Err(_) => {
            tracing::warn!("enhancer panicked, continuing without enhancement");
            None
        }
    }
}
