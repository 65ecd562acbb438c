//! Dockerfile validation: pre-check, parse, rule catalog, optional external linter.

pub mod external;
pub mod parser;
pub mod precheck;
pub mod rules;

use std::sync::Arc;

pub use external::{ExternalLinter, HadolintLinter, LinterError};
pub use parser::{parse, Instruction, InstructionArgs, ParseError};
pub use rules::{Rule, RULES};

use crate::merge::merge;
use crate::score::{build_report, terminal_report, ReportKind};
use crate::types::{Severity, ValidationReport, ValidationResult};

/// Rule id of the synthetic result for unparseable input.
pub const PARSE_ERROR_RULE: &str = "parse-error";

/// Per-call options for [`DockerfileValidator::validate`].
#[derive(Debug, Clone, Copy)]
pub struct DockerfileOptions {
    pub enable_external_linter: bool,
}

impl Default for DockerfileOptions {
    fn default() -> Self {
        Self {
            enable_external_linter: true,
        }
    }
}

/// Validates Dockerfile content against the static rule catalog.
#[derive(Clone, Default)]
pub struct DockerfileValidator {
    linter: Option<Arc<dyn ExternalLinter>>,
}

impl DockerfileValidator {
    /// A validator with no external linter.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_linter(linter: Arc<dyn ExternalLinter>) -> Self {
        Self {
            linter: Some(linter),
        }
    }

    pub fn has_linter(&self) -> bool {
        self.linter.is_some()
    }

    /// Evaluate the content with the internal engine only.
    pub fn evaluate(&self, content: &str) -> ValidationReport {
        let issues = precheck::precheck(content);
        for issue in issues.iter().filter(|i| !i.is_syntax_error()) {
            tracing::debug!(line = issue.line, "precheck advisory: {}", issue.message);
        }

        let syntax = precheck::syntax_errors(&issues);
        if !syntax.is_empty() {
            return parse_error_report(syntax);
        }

        let instructions = match parser::parse(content) {
            Ok(instructions) => instructions,
            Err(e) => return parse_error_report(vec![e.to_string()]),
        };

        build_report(rules::evaluate_all(&instructions), ReportKind::Dockerfile)
    }

    /// Evaluate the content and, when enabled, merge in the external linter's findings.
    ///
    /// Linter failures are logged and the internal report is returned unchanged.
    pub fn validate(&self, content: &str, options: &DockerfileOptions) -> ValidationReport {
        let report = self.evaluate(content);
        if is_parse_error(&report) || !options.enable_external_linter {
            return report;
        }

        let Some(linter) = &self.linter else {
            return report;
        };

        match linter.lint(content) {
            Ok(findings) => {
                tracing::debug!(linter = linter.name(), findings = findings.len(), "external linter finished");
                let external = build_report(findings, ReportKind::Dockerfile);
                merge(&report, &external)
            }
            Err(e) => {
                tracing::warn!(linter = linter.name(), "external linter failed, using internal results: {}", e);
                report
            }
        }
    }
}

impl std::fmt::Debug for DockerfileValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerfileValidator")
            .field("linter", &self.linter.as_ref().map(|l| l.name().to_string()))
            .finish()
    }
}

fn parse_error_report(messages: Vec<String>) -> ValidationReport {
    let mut result = ValidationResult::fail(PARSE_ERROR_RULE, Severity::Error, "")
        .with_message(format!("Dockerfile could not be parsed: {}", messages.join("; ")));
    result.errors = messages;
    terminal_report(result)
}

fn is_parse_error(report: &ValidationReport) -> bool {
    report.results.len() == 1 && report.results[0].rule_id == PARSE_ERROR_RULE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Grade;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeLinter {
        calls: AtomicUsize,
        fail: bool,
    }

    impl ExternalLinter for FakeLinter {
        fn name(&self) -> &str {
            "fake"
        }

        fn lint(&self, _content: &str) -> Result<Vec<ValidationResult>, LinterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LinterError::Failed {
                    status: 2,
                    stderr: "boom".to_string(),
                });
            }
            Ok(vec![ValidationResult::fail("DL3007", Severity::Warning, "latest")
                .with_location("line 1")])
        }
    }

    fn fake(fail: bool) -> Arc<FakeLinter> {
        Arc::new(FakeLinter {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    const GOOD: &str = "FROM node:18-alpine\nWORKDIR /app\nCOPY package*.json ./\nRUN npm ci --only=production\nCOPY . .\nUSER node\nEXPOSE 3000\nHEALTHCHECK CMD curl -f http://localhost:3000/health || exit 1\nCMD [\"node\",\"server.js\"]";

    #[test]
    fn test_empty_is_parse_error() {
        let report = DockerfileValidator::new().evaluate("");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].rule_id, PARSE_ERROR_RULE);
        assert_eq!(report.score, 0);
        assert_eq!(report.grade, Grade::F);
    }

    #[test]
    fn test_unknown_instruction_is_parse_error() {
        let report = DockerfileValidator::new().evaluate("FROM alpine:3.19\nBOGUS thing");
        assert_eq!(report.results[0].rule_id, PARSE_ERROR_RULE);
        assert!(report.results[0].errors[0].contains("invalid instruction"));
    }

    #[test]
    fn test_one_result_per_rule() {
        let report = DockerfileValidator::new().evaluate(GOOD);
        assert_eq!(report.results.len(), RULES.len());
        assert_eq!(report.errors, 0);
        assert_eq!(report.score, 100);
    }

    #[test]
    fn test_linter_findings_merged() {
        let linter = fake(false);
        let validator = DockerfileValidator::with_linter(linter.clone());
        let report = validator.validate(GOOD, &DockerfileOptions::default());

        assert_eq!(linter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.results.len(), RULES.len() + 1);
        assert!(report.result("DL3007").is_some());
        assert_eq!(report.score, 95);
    }

    #[test]
    fn test_linter_disabled() {
        let linter = fake(false);
        let validator = DockerfileValidator::with_linter(linter.clone());
        let options = DockerfileOptions {
            enable_external_linter: false,
        };
        let report = validator.validate(GOOD, &options);

        assert_eq!(linter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.results.len(), RULES.len());
    }

    #[test]
    fn test_linter_failure_falls_back() {
        let validator = DockerfileValidator::with_linter(fake(true));
        let report = validator.validate(GOOD, &DockerfileOptions::default());
        assert_eq!(report.results.len(), RULES.len());
        assert_eq!(report.score, 100);
    }

    #[test]
    fn test_parse_error_skips_linter() {
        let linter = fake(false);
        let validator = DockerfileValidator::with_linter(linter.clone());
        let report = validator.validate("", &DockerfileOptions::default());
        assert_eq!(linter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.results.len(), 1);
    }
}
