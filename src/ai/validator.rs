//! AI-augmented validation.
//!
//! Prompts the sampling subsystem for a structured critique and maps it onto
//! the same result and report shapes as the deterministic validators.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use super::prompt::validation_request;
use super::repair::{extract_json, parse_with_repair};
use super::sampling::{sample_with_rerank, RerankOptions};
use super::{AiError, ContentType, ExecutionContext, Focus};
use crate::config::AiConfig;
use crate::score::{grade_for, SeverityCounts, DOCKERFILE_GRADES};
use crate::types::{now_timestamp, Severity, ValidationReport, ValidationResult};

/// Options for [`validate_with_ai`].
#[derive(Debug, Clone, PartialEq)]
pub struct AiValidationOptions {
    pub content_type: ContentType,
    pub focus: Focus,
    /// Drop issues whose own confidence is below this.
    pub confidence: Option<f64>,
    /// Keep at most this many issues, after confidence filtering.
    pub max_issues: Option<usize>,
    pub rerank: RerankOptions,
    pub repair_attempts: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub model: Option<String>,
}

impl Default for AiValidationOptions {
    fn default() -> Self {
        Self {
            content_type: ContentType::General,
            focus: Focus::All,
            confidence: None,
            max_issues: None,
            rerank: RerankOptions::default(),
            repair_attempts: 1,
            max_tokens: 2048,
            temperature: 0.2,
            model: None,
        }
    }
}

impl AiValidationOptions {
    pub fn from_config(config: &AiConfig, content_type: ContentType) -> Self {
        Self {
            content_type,
            focus: config.focus,
            rerank: RerankOptions {
                max_candidates: config.max_candidates,
                early_stop_score: None,
            },
            repair_attempts: config.repair_attempts,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            model: Some(config.model.clone()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub processing_time_ms: u64,
    /// Heuristic rerank score / 100. Independent of the report score.
    pub confidence: f64,
    pub candidates_evaluated: usize,
}

/// A report produced by AI review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiValidationResult {
    #[serde(flatten)]
    pub report: ValidationReport,
    pub ai_metadata: AiMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// The reply shape requested from the model.
#[derive(Debug, Deserialize)]
struct Critique {
    #[serde(default)]
    #[allow(dead_code)]
    passed: Option<bool>,
    results: Vec<CritiqueIssue>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CritiqueIssue {
    #[serde(default, alias = "id", alias = "rule_id")]
    rule_id: Option<String>,
    #[serde(default, alias = "is_valid", alias = "passed")]
    is_valid: Option<bool>,
    #[serde(default, alias = "description")]
    message: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "line")]
    location: Option<serde_json::Value>,
    #[serde(default, alias = "fix", alias = "suggestion", alias = "fix_suggestion")]
    fix_suggestion: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Heuristic quality score in `[0, 100]` for a raw candidate.
///
/// Rewards well-formed JSON carrying the requested keys. It does not parse
/// against the critique shape.
pub fn heuristic_score(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let json = extract_json(text);
    let mut score = 0.0;
    if serde_json::from_str::<serde_json::Value>(json)
        .map(|v| v.is_object())
        .unwrap_or(false)
    {
        score += 40.0;
    }
    for key in ["\"results\"", "\"passed\"", "\"summary\""] {
        if json.contains(key) {
            score += 15.0;
        }
    }
    if json.contains("\"severity\"") {
        score += 15.0;
    }
    score
}

fn render_location(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(format!("line {}", n)),
        _ => None,
    }
}

fn issue_to_result(issue: CritiqueIssue, position: usize) -> ValidationResult {
    let severity = issue
        .severity
        .as_deref()
        .and_then(Severity::parse)
        .unwrap_or(Severity::Warning);

    let rule_id = issue
        .rule_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "ai-{}-{}",
                issue.category.as_deref().unwrap_or("general"),
                position + 1
            )
        });

    let mut result = if issue.is_valid.unwrap_or(false) {
        let mut r = ValidationResult::pass(rule_id.clone(), severity);
        r.message = issue.message;
        r
    } else {
        let message = issue
            .message
            .unwrap_or_else(|| format!("{} reported by AI review", rule_id));
        ValidationResult::fail(rule_id, severity, message)
    };

    result.confidence = issue.confidence;
    result.metadata.category = issue.category;
    result.metadata.location = issue.location.and_then(render_location);
    result.metadata.ai_enhanced = Some(true);
    if let Some(fix) = issue.fix_suggestion {
        result.suggestions.push(fix.clone());
        result.metadata.fix_suggestion = Some(fix);
    }
    result
}

/// Build a report from AI results. Score is the share of valid results.
fn ai_report(results: Vec<ValidationResult>) -> ValidationReport {
    let total = results.len();
    let failed = results.iter().filter(|r| !r.is_valid).count();
    let counts = SeverityCounts::from_results(&results);
    let score = (100.0 * (1.0 - failed as f64 / total.max(1) as f64)).round() as u8;

    ValidationReport {
        results,
        score,
        grade: grade_for(score, &DOCKERFILE_GRADES),
        passed: total - failed,
        failed,
        errors: counts.errors,
        warnings: counts.warnings,
        info: counts.info,
        timestamp: now_timestamp(),
    }
}

fn map_critique(critique: Critique, options: &AiValidationOptions) -> (ValidationReport, Option<String>) {
    let mut issues: Vec<CritiqueIssue> = critique
        .results
        .into_iter()
        .filter(|issue| match (options.confidence, issue.confidence) {
            (Some(min), Some(c)) => c >= min,
            _ => true,
        })
        .collect();
    if let Some(max) = options.max_issues {
        issues.truncate(max);
    }

    let results = issues
        .into_iter()
        .enumerate()
        .map(|(i, issue)| issue_to_result(issue, i))
        .collect();
    (ai_report(results), critique.summary)
}

/// Review content with the sampling subsystem.
///
/// Transport and parse failures are returned as errors. No partial report is produced.
pub async fn validate_with_ai(
    content: &str,
    options: &AiValidationOptions,
    ctx: &ExecutionContext,
) -> Result<AiValidationResult, AiError> {
    let span = tracing::info_span!(
        "ai_validate",
        content_type = %options.content_type,
        focus = %options.focus
    );

    async {
        let started = Instant::now();
        let build = || {
            validation_request(
                content,
                options.content_type,
                options.focus,
                options.max_tokens,
                options.temperature,
                options.model.clone(),
            )
        };

        let outcome = sample_with_rerank(ctx, build, heuristic_score, &options.rerank).await?;
        let critique: Critique = parse_with_repair(&outcome.text, options.repair_attempts)?;
        let (report, summary) = map_critique(critique, options);

        tracing::info!(
            score = report.score,
            issues = report.failed,
            heuristic = outcome.score,
            "AI review finished"
        );

        Ok(AiValidationResult {
            report,
            ai_metadata: AiMetadata {
                model: outcome.model,
                processing_time_ms: started.elapsed().as_millis() as u64,
                confidence: outcome.score / 100.0,
                candidates_evaluated: outcome.candidates_evaluated,
            },
            summary,
        })
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Grade;

    fn critique(json: &str) -> Critique {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_heuristic_score() {
        assert_eq!(heuristic_score(""), 0.0);
        assert_eq!(heuristic_score("no json here"), 0.0);
        assert_eq!(heuristic_score("{}"), 40.0);
        let full = r#"{"passed": false, "results": [{"severity": "error"}], "summary": "x"}"#;
        assert_eq!(heuristic_score(full), 100.0);
    }

    #[test]
    fn test_issue_mapping() {
        let c = critique(
            r#"{"passed": false, "results": [
                {"ruleId": "root-user", "isValid": false, "message": "runs as root", "severity": "error",
                 "category": "security", "location": "line 1", "fixSuggestion": "add USER", "confidence": 0.9},
                {"message": "odd", "severity": "CRITICAL", "line": 7},
                {"id": "pinned", "passed": true, "severity": "info", "category": "best-practice"}
            ], "summary": "needs work"}"#,
        );
        let (report, summary) = map_critique(c, &AiValidationOptions::default());

        assert_eq!(summary.as_deref(), Some("needs work"));
        assert_eq!(report.results.len(), 3);

        let first = &report.results[0];
        assert_eq!(first.rule_id, "root-user");
        assert_eq!(first.severity(), Severity::Error);
        assert_eq!(first.errors, vec!["runs as root".to_string()]);
        assert_eq!(first.metadata.fix_suggestion.as_deref(), Some("add USER"));
        assert_eq!(first.metadata.ai_enhanced, Some(true));
        assert_eq!(first.confidence, Some(0.9));

        let second = &report.results[1];
        assert_eq!(second.rule_id, "ai-general-2");
        assert_eq!(second.severity(), Severity::Warning);
        assert_eq!(second.metadata.location.as_deref(), Some("line 7"));

        let third = &report.results[2];
        assert_eq!(third.rule_id, "pinned");
        assert!(third.is_valid);

        // 2 of 3 invalid
        assert_eq!(report.score, 33);
        assert_eq!(report.grade, Grade::F);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 2);
        assert_eq!((report.errors, report.warnings, report.info), (1, 1, 0));
    }

    #[test]
    fn test_confidence_filter_and_max_issues() {
        let c = critique(
            r#"{"results": [
                {"message": "a", "confidence": 0.2},
                {"message": "b", "confidence": 0.8},
                {"message": "c"},
                {"message": "d", "confidence": 0.95}
            ]}"#,
        );
        let options = AiValidationOptions {
            confidence: Some(0.5),
            max_issues: Some(2),
            ..AiValidationOptions::default()
        };
        let (report, _) = map_critique(c, &options);
        let messages: Vec<_> = report.results.iter().map(|r| r.display_message()).collect();
        assert_eq!(messages, vec!["b", "c"]);
    }

    #[test]
    fn test_empty_results_score_full() {
        let (report, _) = map_critique(critique(r#"{"passed": true, "results": []}"#), &AiValidationOptions::default());
        assert_eq!(report.score, 100);
        assert_eq!(report.grade, Grade::A);
    }

    #[test]
    fn test_result_serializes_flattened() {
        let (report, _) = map_critique(critique(r#"{"results": []}"#), &AiValidationOptions::default());
        let result = AiValidationResult {
            report,
            ai_metadata: AiMetadata {
                model: Some("m".to_string()),
                processing_time_ms: 5,
                confidence: 0.7,
                candidates_evaluated: 1,
            },
            summary: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["score"], 100);
        assert_eq!(json["aiMetadata"]["processingTimeMs"], 5);
        assert_eq!(json["aiMetadata"]["candidatesEvaluated"], 1);
    }
}
