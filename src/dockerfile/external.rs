//! Delegation to an external Dockerfile linter.
//!
//! The linter is optional. Any failure to run it or read its output is a
//! `LinterError`, which callers log and ignore.

use std::io::Write;
use std::process::{Command, Stdio};

use serde::Deserialize;
use thiserror::Error;

use crate::config::LinterConfig;
use crate::types::{Severity, ValidationResult};

/// Errors from running an external linter.
#[derive(Error, Debug)]
pub enum LinterError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to talk to linter: {0}")]
    Io(#[from] std::io::Error),
    #[error("linter exited with {status}: {stderr}")]
    Failed { status: i32, stderr: String },
    #[error("unreadable linter output: {0}")]
    Output(#[from] serde_json::Error),
}

/// A secondary syntax linter run before rule evaluation.
pub trait ExternalLinter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Lint the content and return one result per finding.
    fn lint(&self, content: &str) -> Result<Vec<ValidationResult>, LinterError>;
}

/// One finding in hadolint's JSON output.
#[derive(Debug, Deserialize)]
struct HadolintFinding {
    code: String,
    level: String,
    line: usize,
    message: String,
}

/// Runs hadolint (or a compatible command) with the content on stdin.
#[derive(Debug, Clone)]
pub struct HadolintLinter {
    command: String,
    args: Vec<String>,
}

impl HadolintLinter {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &LinterConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }
}

impl Default for HadolintLinter {
    fn default() -> Self {
        Self::from_config(&LinterConfig::default())
    }
}

impl ExternalLinter for HadolintLinter {
    fn name(&self) -> &str {
        &self.command
    }

    fn lint(&self, content: &str) -> Result<Vec<ValidationResult>, LinterError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LinterError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(content.as_bytes())?;
        }
        let output = child.wait_with_output()?;

        // hadolint exits 1 when it has findings, so only empty stdout is a failure.
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            if output.status.success() {
                return Ok(Vec::new());
            }
            return Err(LinterError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_hadolint_output(&stdout)
    }
}

/// Map hadolint's JSON findings to results.
pub fn parse_hadolint_output(json: &str) -> Result<Vec<ValidationResult>, LinterError> {
    let findings: Vec<HadolintFinding> = serde_json::from_str(json)?;
    Ok(findings.into_iter().map(finding_to_result).collect())
}

fn finding_to_result(finding: HadolintFinding) -> ValidationResult {
    let severity = match finding.level.as_str() {
        "error" => Severity::Error,
        "warning" => Severity::Warning,
        _ => Severity::Info,
    };

    let mut result = ValidationResult::fail(
        finding.code.clone(),
        severity,
        format!("{}: {}", finding.code, finding.message),
    )
    .with_category("best-practice")
    .with_location(format!("line {}", finding.line));

    // Linter findings are reported as errors regardless of severity, like catalog rules.
    if severity != Severity::Error {
        result.errors = std::mem::take(&mut result.warnings);
    }
    result
}
