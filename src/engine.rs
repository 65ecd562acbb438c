//! The validation engine.
//!
//! An [`Engine`] is built once by the host from a [`Config`] and owns every
//! validator, including the manifest schema registry. Nothing here is global.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ai::{validate_with_ai, AiError, AiValidationOptions, AiValidationResult, ContentType, ExecutionContext};
use crate::config::Config;
use crate::dockerfile::{DockerfileOptions, DockerfileValidator, HadolintLinter};
use crate::enhance::{maybe_enhance, EnhancementOutcome, KnowledgeEnhancer};
use crate::manifest::ManifestValidator;
use crate::types::ValidationReport;

lazy_static! {
    static ref DOCKERFILE_NAME: Regex =
        Regex::new(r"(?i)^((docker|container)file(\.[\w.-]+)?|[\w.-]+\.(dockerfile|containerfile))$").unwrap();
    static ref FIRST_DOCKER_KEYWORD: Regex = Regex::new(r"(?i)^\s*(FROM|ARG)\s+\S").unwrap();
    static ref API_VERSION_LINE: Regex = Regex::new(r"(?m)^apiVersion\s*:").unwrap();
    static ref KIND_LINE: Regex = Regex::new(r"(?m)^kind\s*:").unwrap();
}

/// What a file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Dockerfile,
    Kubernetes,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Dockerfile => "dockerfile",
            ArtifactKind::Kubernetes => "kubernetes",
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            ArtifactKind::Dockerfile => ContentType::Dockerfile,
            ArtifactKind::Kubernetes => ContentType::Kubernetes,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dockerfile" | "docker" => Ok(ArtifactKind::Dockerfile),
            "kubernetes" | "k8s" | "manifest" => Ok(ArtifactKind::Kubernetes),
            other => Err(format!("unknown kind {:?}, expected 'dockerfile' or 'kubernetes'", other)),
        }
    }
}

/// Host-constructed validation context.
#[derive(Debug)]
pub struct Engine {
    config: Config,
    dockerfile: DockerfileValidator,
    manifest: ManifestValidator,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let dockerfile = if config.enable_external_linter {
            DockerfileValidator::with_linter(Arc::new(HadolintLinter::from_config(&config.linter)))
        } else {
            DockerfileValidator::new()
        };
        let manifest = ManifestValidator::new(config.allow_unknown_resources);

        Self {
            config,
            dockerfile,
            manifest,
        }
    }

    /// Replace the Dockerfile validator, e.g. to plug in a different linter.
    pub fn with_dockerfile_validator(mut self, validator: DockerfileValidator) -> Self {
        self.dockerfile = validator;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn manifest_validator(&self) -> &ManifestValidator {
        &self.manifest
    }

    /// Run the deterministic validator for `kind`.
    pub fn validate(&self, kind: ArtifactKind, content: &str) -> ValidationReport {
        let report = match kind {
            ArtifactKind::Dockerfile => {
                let options = DockerfileOptions {
                    enable_external_linter: self.config.enable_external_linter,
                };
                self.dockerfile.validate(content, &options)
            }
            ArtifactKind::Kubernetes => self.manifest.evaluate(content),
        };
        tracing::debug!(kind = %kind, score = report.score, failed = report.failed, "validated");
        report
    }

    /// AI review of `content`. The deterministic report is not involved.
    pub async fn review(
        &self,
        kind: ArtifactKind,
        content: &str,
        ctx: &ExecutionContext,
    ) -> Result<AiValidationResult, AiError> {
        let options = AiValidationOptions::from_config(&self.config.ai, kind.content_type());
        validate_with_ai(content, &options, ctx).await
    }

    /// Request a rewrite when `report` scores below the configured threshold.
    pub async fn enhance(
        &self,
        kind: ArtifactKind,
        report: &ValidationReport,
        content: &str,
        enhancer: &dyn KnowledgeEnhancer,
    ) -> Option<EnhancementOutcome> {
        maybe_enhance(
            report,
            content,
            kind.as_str(),
            self.config.enhancement.threshold,
            enhancer,
        )
        .await
    }

    /// Classify a file by name, falling back to its content.
    pub fn detect_kind(path: &Path, content: &str) -> Option<ArtifactKind> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if DOCKERFILE_NAME.is_match(name) {
            return Some(ArtifactKind::Dockerfile);
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
            return looks_like_manifest(content).then_some(ArtifactKind::Kubernetes);
        }
        if !ext.is_empty() {
            return None;
        }

        let first = content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('#'))?;
        if FIRST_DOCKER_KEYWORD.is_match(first) {
            Some(ArtifactKind::Dockerfile)
        } else if looks_like_manifest(content) {
            Some(ArtifactKind::Kubernetes)
        } else {
            None
        }
    }
}

fn looks_like_manifest(content: &str) -> bool {
    API_VERSION_LINE.is_match(content) && KIND_LINE.is_match(content)
}
