//! AI-augmented validation over an external sampling subsystem.
//!
//! Everything here is best effort. Failures are returned as [`AiError`] and
//! never touch the deterministic reports produced elsewhere.

pub mod cancel;
pub mod prompt;
pub mod repair;
pub mod sampling;
pub mod transport;
pub mod validator;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cancel::CancellationToken;
pub use sampling::{
    sample_with_rerank, Message, RerankOptions, Role, SampleOutcome, SamplingClient, SamplingRequest,
    SamplingResponse, Usage,
};
pub use transport::HttpSamplingClient;
pub use validator::{heuristic_score, validate_with_ai, AiMetadata, AiValidationOptions, AiValidationResult};

/// Errors from the AI-augmented path.
#[derive(Error, Debug)]
pub enum AiError {
    /// The sampling subsystem reported a failure. The upstream message is kept verbatim.
    #[error("sampling failed: {0}")]
    Sampling(String),
    #[error("cancelled")]
    Cancelled,
    #[error("malformed model response after {attempts} attempt(s): {message}")]
    MalformedResponse { attempts: usize, message: String },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sampling endpoint returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by sampling endpoint")]
    RateLimited,
    #[error("missing API key: set {0}")]
    MissingApiKey(String),
}

/// What kind of content is being reviewed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Dockerfile,
    Kubernetes,
    Security,
    #[default]
    General,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Dockerfile => "dockerfile",
            ContentType::Kubernetes => "kubernetes",
            ContentType::Security => "security",
            ContentType::General => "general",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dockerfile" => Ok(ContentType::Dockerfile),
            "kubernetes" | "k8s" => Ok(ContentType::Kubernetes),
            "security" => Ok(ContentType::Security),
            "general" => Ok(ContentType::General),
            other => Err(format!("unknown content type: {}", other)),
        }
    }
}

/// What the review should concentrate on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Focus {
    Security,
    Performance,
    BestPractices,
    #[default]
    All,
}

impl Focus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Focus::Security => "security",
            Focus::Performance => "performance",
            Focus::BestPractices => "best-practices",
            Focus::All => "all",
        }
    }
}

impl std::fmt::Display for Focus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Focus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "security" => Ok(Focus::Security),
            "performance" => Ok(Focus::Performance),
            "best-practices" | "best_practices" => Ok(Focus::BestPractices),
            "all" => Ok(Focus::All),
            other => Err(format!("unknown focus: {}", other)),
        }
    }
}

/// Capabilities handed to an AI call by its host.
///
/// Logging goes through the ambient `tracing` dispatcher.
#[derive(Clone)]
pub struct ExecutionContext {
    pub client: Arc<dyn SamplingClient>,
    pub cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(client: Arc<dyn SamplingClient>) -> Self {
        Self {
            client,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(client: Arc<dyn SamplingClient>, cancel: CancellationToken) -> Self {
        Self { client, cancel }
    }
}
