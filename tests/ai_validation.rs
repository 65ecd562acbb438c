//! AI-augmented validation and enhancement with in-process fake clients.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use containercheck::ai::{
    validate_with_ai, AiError, AiValidationOptions, CancellationToken, ContentType, ExecutionContext, Focus,
    RerankOptions, SamplingClient, SamplingRequest, SamplingResponse,
};
use containercheck::dockerfile::{DockerfileOptions, DockerfileValidator};
use containercheck::enhance::{
    maybe_enhance, EnhanceError, EnhancementRequest, EnhancementResponse, KnowledgeEnhancer, SamplingEnhancer,
};
use containercheck::{Grade, Severity};

const CRITIQUE: &str = r#"Here is my review:
```json
{
  "passed": false,
  "results": [
    {"ruleId": "pin-base-image", "isValid": false, "message": "Base image uses latest", "severity": "warning", "category": "security", "location": "line 1", "fixSuggestion": "Pin a version", "confidence": 0.9},
    {"isValid": false, "message": "No healthcheck", "severity": "critical", "category": "best-practice", "confidence": 0.4},
    {"ruleId": "non-root", "isValid": true, "message": "Runs as non-root", "severity": "info", "confidence": 0.95},
    {"ruleId": "small-image", "isValid": true, "severity": "info"}
  ],
  "summary": "Mostly fine."
}
```"#;

/// Replies with scripted texts in order, or fails with a fixed upstream message.
struct FakeClient {
    replies: Mutex<Vec<Result<String, String>>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeClient {
    fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .rev()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SamplingClient for FakeClient {
    async fn create_message(&self, request: SamplingRequest) -> Result<SamplingResponse, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push(request.messages[0].content.clone());
        match self.replies.lock().unwrap().pop() {
            Some(Ok(text)) => Ok(SamplingResponse {
                text,
                model: Some("fake-model".to_string()),
                usage: None,
            }),
            Some(Err(message)) => Err(AiError::Sampling(message)),
            None => Err(AiError::Sampling("no more replies".to_string())),
        }
    }
}

fn dockerfile_options() -> AiValidationOptions {
    AiValidationOptions {
        content_type: ContentType::Dockerfile,
        focus: Focus::Security,
        ..AiValidationOptions::default()
    }
}

#[tokio::test]
async fn test_critique_maps_to_report() {
    let client = FakeClient::new(vec![Ok(CRITIQUE)]);
    let ctx = ExecutionContext::new(client.clone());

    let result = validate_with_ai("FROM node:latest", &dockerfile_options(), &ctx)
        .await
        .unwrap();
    let report = &result.report;

    assert_eq!(report.results.len(), 4);
    assert_eq!(report.failed, 2);
    // round(100 * (1 - 2/4))
    assert_eq!(report.score, 50);
    assert_eq!(report.grade, Grade::F);

    let pinned = report.result("pin-base-image").unwrap();
    assert_eq!(pinned.metadata.location.as_deref(), Some("line 1"));
    assert_eq!(pinned.metadata.category.as_deref(), Some("security"));
    assert_eq!(pinned.metadata.fix_suggestion.as_deref(), Some("Pin a version"));
    assert_eq!(pinned.metadata.ai_enhanced, Some(true));

    let generated = report.result("ai-best-practice-2").unwrap();
    assert_eq!(generated.metadata.severity, Severity::Warning);

    assert_eq!(result.summary.as_deref(), Some("Mostly fine."));
    assert_eq!(result.ai_metadata.model.as_deref(), Some("fake-model"));
    assert_eq!(result.ai_metadata.candidates_evaluated, 1);
    assert!(result.ai_metadata.confidence > 0.9);

    let prompts = client.prompts.lock().unwrap();
    assert!(prompts[0].contains("Dockerfile"));
    assert!(prompts[0].contains("FROM node:latest"));
}

#[tokio::test]
async fn test_confidence_filter_and_issue_cap() {
    let client = FakeClient::new(vec![Ok(CRITIQUE)]);
    let ctx = ExecutionContext::new(client);
    let options = AiValidationOptions {
        confidence: Some(0.5),
        max_issues: Some(2),
        ..dockerfile_options()
    };

    let result = validate_with_ai("FROM node:latest", &options, &ctx).await.unwrap();
    let ids: Vec<&str> = result.report.results.iter().map(|r| r.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["pin-base-image", "non-root"]);
}

#[tokio::test]
async fn test_rerank_picks_best_candidate() {
    let client = FakeClient::new(vec![Ok("not json at all"), Ok(CRITIQUE), Ok("{\"results\": []}")]);
    let ctx = ExecutionContext::new(client.clone());
    let options = AiValidationOptions {
        rerank: RerankOptions {
            max_candidates: 3,
            early_stop_score: None,
        },
        ..dockerfile_options()
    };

    let result = validate_with_ai("FROM x", &options, &ctx).await.unwrap();
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.ai_metadata.candidates_evaluated, 3);
    assert_eq!(result.report.results.len(), 4);
}

#[tokio::test]
async fn test_malformed_output_is_an_error() {
    let client = FakeClient::new(vec![Ok("I am unable to review this file.")]);
    let ctx = ExecutionContext::new(client);

    let err = validate_with_ai("FROM x", &dockerfile_options(), &ctx).await.unwrap_err();
    assert!(matches!(err, AiError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_cancelled_context_issues_no_call() {
    let client = FakeClient::new(vec![Ok(CRITIQUE)]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = ExecutionContext::with_cancel(client.clone(), cancel);

    let err = validate_with_ai("FROM x", &dockerfile_options(), &ctx).await.unwrap_err();
    assert!(matches!(err, AiError::Cancelled));
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

struct FixedEnhancer;

#[async_trait]
impl KnowledgeEnhancer for FixedEnhancer {
    async fn enhance(&self, request: EnhancementRequest) -> Result<EnhancementResponse, EnhanceError> {
        assert!(request.issues.iter().any(|i| i.message.starts_with("No Root User")));
        Ok(EnhancementResponse {
            enhanced_content: format!("{}\nUSER app", request.content),
            knowledge_applied: vec!["drop root".to_string()],
            confidence: 0.7,
            suggestions: vec![],
            analysis: None,
        })
    }
}

#[tokio::test]
async fn test_ai_failure_does_not_affect_deterministic_path() {
    let content = "FROM ubuntu:22.04\nRUN apt-get update\n";
    let report = DockerfileValidator::new().validate(
        content,
        &DockerfileOptions {
            enable_external_linter: false,
        },
    );
    let before = report.clone();

    let client = FakeClient::new(vec![Err("upstream overloaded (529)")]);
    let ctx = ExecutionContext::new(client);
    let err = validate_with_ai(content, &dockerfile_options(), &ctx).await.unwrap_err();
    assert!(err.to_string().contains("upstream overloaded (529)"));

    let outcome = maybe_enhance(&report, content, "dockerfile", 90, &FixedEnhancer)
        .await
        .expect("enhancement should still run");
    assert!(outcome.enhanced_content.ends_with("USER app"));
    assert_eq!(report, before);
}

#[tokio::test]
async fn test_sampling_enhancer_failure_is_swallowed() {
    let report = DockerfileValidator::new().evaluate("FROM ubuntu\n");
    let client = FakeClient::new(vec![Err("connection reset")]);
    let enhancer = SamplingEnhancer::new(client.clone());

    assert!(maybe_enhance(&report, "FROM ubuntu\n", "dockerfile", 90, &enhancer)
        .await
        .is_none());
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}
