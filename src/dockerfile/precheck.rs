//! Lenient syntax pre-check run before rule evaluation.
//!
//! Priority-0 issues are pure syntax errors and stop validation. Higher
//! priorities are advisories: they are logged and validation continues.

use lazy_static::lazy_static;
use regex::Regex;

use super::parser::{logical_lines, split_keyword, KNOWN_INSTRUCTIONS};

/// Priority of syntax errors that short-circuit validation.
pub const SYNTAX_PRIORITY: u8 = 0;

/// Priority of advisory issues.
pub const ADVISORY_PRIORITY: u8 = 1;

lazy_static! {
    static ref APT_INSTALL: Regex = Regex::new(r"\bapt-get\s+install\b").unwrap();
    static ref APT_ASSUME_YES: Regex =
        Regex::new(r"\bapt-get\s+install\b.*(\s-y\b|\s--yes\b|\s--assume-yes\b|\s-\w*y\w*\b)").unwrap();
}

/// One issue found by the pre-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecheckIssue {
    pub line: usize,
    pub message: String,
    pub priority: u8,
}

impl PrecheckIssue {
    fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
            priority: SYNTAX_PRIORITY,
        }
    }

    fn advisory(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
            priority: ADVISORY_PRIORITY,
        }
    }

    pub fn is_syntax_error(&self) -> bool {
        self.priority == SYNTAX_PRIORITY
    }
}

/// Run the pre-check. Never fails: malformed input is reported as issues.
pub fn precheck(content: &str) -> Vec<PrecheckIssue> {
    let mut issues = Vec::new();

    let lines = match logical_lines(content) {
        Ok(lines) => lines,
        Err(e) => {
            issues.push(PrecheckIssue::syntax(0, e.to_string()));
            return issues;
        }
    };

    if lines.is_empty() {
        issues.push(PrecheckIssue::syntax(0, "dockerfile is empty: missing FROM instruction"));
        return issues;
    }

    let mut seen_from = false;
    let mut first_non_arg_checked = false;
    let mut final_stage_cmds = 0;
    let mut final_stage_entrypoints = 0;

    for line in &lines {
        let (keyword, rest) = split_keyword(&line.text);
        let name = keyword.to_ascii_uppercase();

        if !KNOWN_INSTRUCTIONS.contains(name.as_str()) {
            issues.push(PrecheckIssue::syntax(
                line.line_number,
                format!("invalid instruction {:?}", keyword),
            ));
            continue;
        }

        if !first_non_arg_checked && name != "ARG" {
            first_non_arg_checked = true;
            if name != "FROM" {
                issues.push(PrecheckIssue::syntax(
                    line.line_number,
                    format!("misplaced {}: FROM must be the first instruction", name),
                ));
            }
        }

        match name.as_str() {
            "FROM" => {
                seen_from = true;
                final_stage_cmds = 0;
                final_stage_entrypoints = 0;
            }
            "CMD" => final_stage_cmds += 1,
            "ENTRYPOINT" => final_stage_entrypoints += 1,
            "MAINTAINER" => issues.push(PrecheckIssue::advisory(
                line.line_number,
                "MAINTAINER is deprecated, use LABEL maintainer=...",
            )),
            "RUN" => {
                if APT_INSTALL.is_match(rest) && !APT_ASSUME_YES.is_match(rest) {
                    issues.push(PrecheckIssue::advisory(
                        line.line_number,
                        "apt-get install without -y will block on a prompt",
                    ));
                }
            }
            _ => {}
        }
    }

    if !seen_from {
        issues.push(PrecheckIssue::syntax(0, "missing FROM instruction"));
    }
    if final_stage_cmds > 1 {
        issues.push(PrecheckIssue::advisory(
            0,
            "multiple CMD instructions in final stage, only the last one takes effect",
        ));
    }
    if final_stage_entrypoints > 1 {
        issues.push(PrecheckIssue::advisory(
            0,
            "multiple ENTRYPOINT instructions in final stage, only the last one takes effect",
        ));
    }

    issues
}

/// Collect syntax-error messages from a pre-check run.
pub fn syntax_errors(issues: &[PrecheckIssue]) -> Vec<String> {
    issues
        .iter()
        .filter(|i| i.is_syntax_error())
        .map(|i| {
            if i.line > 0 {
                format!("line {}: {}", i.line, i.message)
            } else {
                i.message.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_dockerfile() {
        let issues = precheck("FROM alpine:3.19\nRUN apk add --no-cache curl\nCMD [\"sh\"]");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_empty_is_syntax_error() {
        let issues = precheck("");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_syntax_error());
    }

    #[test]
    fn test_invalid_instruction() {
        let issues = precheck("FROM alpine:3.19\nFOO bar");
        let errors = syntax_errors(&issues);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("invalid instruction"));
        assert!(errors[0].starts_with("line 2"));
    }

    #[test]
    fn test_arg_before_from_allowed() {
        let issues = precheck("ARG VERSION=3.19\nFROM alpine:${VERSION}");
        assert!(syntax_errors(&issues).is_empty());
    }

    #[test]
    fn test_misplaced_from() {
        let issues = precheck("RUN echo hi\nFROM alpine:3.19");
        let errors = syntax_errors(&issues);
        assert!(errors.iter().any(|e| e.contains("misplaced RUN")));
    }

    #[test]
    fn test_missing_from() {
        let issues = precheck("ARG X=1");
        let errors = syntax_errors(&issues);
        assert_eq!(errors, vec!["missing FROM instruction".to_string()]);
    }

    #[test]
    fn test_advisories_are_not_syntax_errors() {
        let content = "FROM debian:12\nMAINTAINER me\nRUN apt-get install curl\nCMD a\nCMD b";
        let issues = precheck(content);
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| !i.is_syntax_error()));
    }

    #[test]
    fn test_apt_with_yes_is_fine() {
        let issues = precheck("FROM debian:12\nRUN apt-get install -y curl");
        assert!(issues.is_empty());
        let issues = precheck("FROM debian:12\nRUN apt-get install -qy curl");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_heredoc_body_is_not_instructions() {
        let content = "# syntax=docker/dockerfile:1\nFROM debian:12\nRUN <<EOF\napt-get update\napt-get install -y curl\nEOF\nUSER app\nWORKDIR /app";
        let issues = precheck(content);
        assert!(syntax_errors(&issues).is_empty(), "{:?}", issues);
        assert!(issues.is_empty());
    }
}
