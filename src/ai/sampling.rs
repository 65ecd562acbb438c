//! Sampling call contract and the sample-with-rerank primitive.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AiError, ExecutionContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One request to the sampling subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Overrides the client's default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingResponse {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<Usage>,
}

/// The `createMessage` capability of the sampling subsystem.
///
/// Implementations own retries and timeouts. Callers issue attempts one at a time.
#[async_trait]
pub trait SamplingClient: Send + Sync {
    async fn create_message(&self, request: SamplingRequest) -> Result<SamplingResponse, AiError>;
}

/// Candidate count and early-stop policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankOptions {
    pub max_candidates: usize,
    /// Stop sampling once a candidate scores at least this much.
    pub early_stop_score: Option<f64>,
}

impl Default for RerankOptions {
    fn default() -> Self {
        Self {
            max_candidates: 1,
            early_stop_score: None,
        }
    }
}

/// The winning candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    pub text: String,
    /// Heuristic score in `[0, 100]`.
    pub score: f64,
    pub model: Option<String>,
    pub usage: Option<Usage>,
    pub candidates_evaluated: usize,
}

/// Sample up to `max_candidates` responses sequentially and keep the best-scoring one.
///
/// Ties keep the earlier candidate. A transport failure or cancellation aborts
/// the whole call; nothing is retried here.
pub async fn sample_with_rerank<B, S>(
    ctx: &ExecutionContext,
    build: B,
    score: S,
    opts: &RerankOptions,
) -> Result<SampleOutcome, AiError>
where
    B: Fn() -> SamplingRequest,
    S: Fn(&str) -> f64,
{
    let attempts = opts.max_candidates.max(1);
    let mut best: Option<SampleOutcome> = None;

    for attempt in 0..attempts {
        if ctx.cancel.is_cancelled() {
            return Err(AiError::Cancelled);
        }

        let request = build();
        let response = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(AiError::Cancelled),
            response = ctx.client.create_message(request) => response?,
        };

        let candidate_score = score(&response.text).clamp(0.0, 100.0);
        tracing::debug!(attempt, score = candidate_score, "scored sampling candidate");

        let evaluated = attempt + 1;
        let better = best.as_ref().map_or(true, |b| candidate_score > b.score);
        if better {
            best = Some(SampleOutcome {
                text: response.text,
                score: candidate_score,
                model: response.model,
                usage: response.usage,
                candidates_evaluated: evaluated,
            });
        }
        if let Some(b) = best.as_mut() {
            b.candidates_evaluated = evaluated;
        }

        if opts.early_stop_score.map_or(false, |stop| candidate_score >= stop) {
            break;
        }
    }

    best.ok_or_else(|| AiError::Sampling("no candidates sampled".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Scripted {
        replies: Mutex<Vec<Result<String, String>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
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
            })
        }
    }

    #[async_trait]
    impl SamplingClient for Scripted {
        async fn create_message(&self, _request: SamplingRequest) -> Result<SamplingResponse, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.replies.lock().unwrap().pop().unwrap_or(Ok(String::new()));
            match reply {
                Ok(text) => Ok(SamplingResponse {
                    text,
                    model: Some("fake".to_string()),
                    usage: None,
                }),
                Err(e) => Err(AiError::Sampling(e)),
            }
        }
    }

    fn request() -> SamplingRequest {
        SamplingRequest {
            messages: vec![Message::user("hi")],
            system: None,
            max_tokens: 10,
            temperature: 0.0,
            model: None,
        }
    }

    fn by_length(text: &str) -> f64 {
        text.len() as f64
    }

    #[tokio::test]
    async fn test_single_attempt_by_default() {
        let client = Scripted::new(vec![Ok("first"), Ok("second, longer")]);
        let ctx = ExecutionContext::new(client.clone());
        let outcome = sample_with_rerank(&ctx, request, by_length, &RerankOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.text, "first");
        assert_eq!(outcome.candidates_evaluated, 1);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_best_candidate_wins_ties_keep_first() {
        let client = Scripted::new(vec![Ok("aaaa"), Ok("bbbbbbbb"), Ok("cccccccc")]);
        let ctx = ExecutionContext::new(client);
        let opts = RerankOptions {
            max_candidates: 3,
            early_stop_score: None,
        };
        let outcome = sample_with_rerank(&ctx, request, by_length, &opts).await.unwrap();

        assert_eq!(outcome.text, "bbbbbbbb");
        assert_eq!(outcome.score, 8.0);
        assert_eq!(outcome.candidates_evaluated, 3);
    }

    #[tokio::test]
    async fn test_early_stop() {
        let client = Scripted::new(vec![Ok("good enough"), Ok("never asked")]);
        let ctx = ExecutionContext::new(client.clone());
        let opts = RerankOptions {
            max_candidates: 2,
            early_stop_score: Some(5.0),
        };
        let outcome = sample_with_rerank(&ctx, request, by_length, &opts).await.unwrap();

        assert_eq!(outcome.text, "good enough");
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let client = Scripted::new(vec![Err("upstream down"), Ok("unused")]);
        let ctx = ExecutionContext::new(client.clone());
        let opts = RerankOptions {
            max_candidates: 2,
            early_stop_score: None,
        };
        let err = sample_with_rerank(&ctx, request, by_length, &opts).await.unwrap_err();

        assert!(err.to_string().contains("upstream down"));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let client = Scripted::new(vec![Ok("unused")]);
        let ctx = ExecutionContext::new(client.clone());
        ctx.cancel.cancel();

        let err = sample_with_rerank(&ctx, request, by_length, &RerankOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Cancelled));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }
}
