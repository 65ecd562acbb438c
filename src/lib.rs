//! Containercheck - validation and scoring for container artifacts.
//!
//! Dockerfiles are checked against a static rule catalog (optionally merged
//! with an external linter's findings) and Kubernetes manifests against
//! structural schemas. Each produces a scored, graded [`ValidationReport`].
//! Reports from different sources merge pessimistically.
//!
//! # Architecture
//!
//! - `dockerfile`: instruction parser, syntax pre-check, rule catalog, external linter
//! - `manifest`: multi-document YAML parsing, schema registry, structural validation
//! - `score` / `merge`: the two scoring formulas, report building and merging
//! - `ai`: AI review over a pluggable sampling client
//! - `enhance`: rewrite suggestions for low-scoring content
//! - `engine`: the context object a host builds once from [`Config`]
//! - `config`, `report`, `cli`: YAML configuration, output formats, command line
//!
//! The deterministic path never fails: malformed input becomes a single
//! parse-error result with score 0. Only the AI path returns errors.

pub mod ai;
pub mod cli;
pub mod config;
pub mod dockerfile;
pub mod engine;
pub mod enhance;
pub mod manifest;
pub mod merge;
pub mod report;
pub mod score;
pub mod types;

pub use ai::{validate_with_ai, AiError, AiValidationOptions, AiValidationResult, ExecutionContext};
pub use config::Config;
pub use dockerfile::{DockerfileOptions, DockerfileValidator};
pub use engine::{ArtifactKind, Engine};
pub use enhance::{maybe_enhance, EnhancementOutcome, KnowledgeEnhancer};
pub use manifest::ManifestValidator;
pub use merge::{merge, merge_multiple};
pub use score::{build_report, ReportKind};
pub use types::{Grade, RuleCategory, Severity, ValidationReport, ValidationResult};
