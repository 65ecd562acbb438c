//! Merging of independently produced validation reports.
//!
//! Results are deduplicated by `(rule id, location, message)`. On collision
//! the more severe result wins and ties keep the result already present.
//! Scores and grades are pessimistic: the lower score and worse grade win.

use std::collections::HashMap;

use crate::score::SeverityCounts;
use crate::types::{now_timestamp, Grade, ValidationReport, ValidationResult};

/// Key used to detect duplicate findings across reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeKey {
    pub rule_id: String,
    pub location: String,
    pub message: String,
}

impl MergeKey {
    pub fn of(result: &ValidationResult) -> Self {
        let rule_id = if result.rule_id.is_empty() {
            "unknown".to_string()
        } else {
            result.rule_id.clone()
        };
        Self {
            rule_id,
            location: result
                .metadata
                .location
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            message: result.display_message(),
        }
    }
}

/// Merge two reports into one deduplicated, pessimistically scored report.
pub fn merge(a: &ValidationReport, b: &ValidationReport) -> ValidationReport {
    let mut results: Vec<ValidationResult> = Vec::with_capacity(a.results.len() + b.results.len());
    let mut index: HashMap<MergeKey, usize> = HashMap::new();

    for result in a.results.iter().chain(b.results.iter()) {
        let key = MergeKey::of(result);
        match index.get(&key) {
            Some(&pos) => {
                if result.severity() > results[pos].severity() {
                    results[pos] = result.clone();
                }
            }
            None => {
                index.insert(key, results.len());
                results.push(result.clone());
            }
        }
    }

    let passed = results.iter().filter(|r| r.is_valid).count();
    let failed = results.len() - passed;
    let counts = SeverityCounts::from_results(&results);

    ValidationReport {
        results,
        score: a.score.min(b.score),
        grade: a.grade.worse(b.grade),
        passed,
        failed,
        errors: counts.errors,
        warnings: counts.warnings,
        info: counts.info,
        timestamp: now_timestamp(),
    }
}

/// A report with no findings: score 100, grade A.
pub fn empty_report() -> ValidationReport {
    ValidationReport {
        results: Vec::new(),
        score: 100,
        grade: Grade::A,
        passed: 0,
        failed: 0,
        errors: 0,
        warnings: 0,
        info: 0,
        timestamp: now_timestamp(),
    }
}

/// Fold `merge` left to right. An empty list yields [`empty_report`].
pub fn merge_multiple(reports: &[ValidationReport]) -> ValidationReport {
    match reports.split_first() {
        None => empty_report(),
        Some((first, rest)) => rest
            .iter()
            .fold(first.clone(), |acc, next| merge(&acc, next)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{build_report, ReportKind};
    use crate::types::Severity;

    fn report(results: Vec<ValidationResult>) -> ValidationReport {
        build_report(results, ReportKind::Dockerfile)
    }

    #[test]
    fn test_merge_key_fallbacks() {
        let r = ValidationResult::fail("", Severity::Warning, "w1");
        let key = MergeKey::of(&r);
        assert_eq!(key.rule_id, "unknown");
        assert_eq!(key.location, "unknown");
        assert_eq!(key.message, "w1");
    }

    #[test]
    fn test_merge_keeps_worse_severity() {
        let mut low = ValidationResult::fail("dup", Severity::Warning, "same");
        low.errors.push("same".to_string());
        low.warnings.clear();
        let mut high = low.clone();
        high.metadata.severity = Severity::Error;

        let a = report(vec![low]);
        let b = report(vec![high]);
        let merged = merge(&a, &b);

        assert_eq!(merged.results.len(), 1);
        assert_eq!(merged.results[0].severity(), Severity::Error);
        assert_eq!(merged.errors, 1);
        assert_eq!(merged.warnings, 0);
    }

    #[test]
    fn test_merge_tie_keeps_incumbent() {
        let first = ValidationResult::fail("dup", Severity::Error, "same").with_suggestion("first");
        let second = ValidationResult::fail("dup", Severity::Error, "same").with_suggestion("second");

        let merged = merge(&report(vec![first]), &report(vec![second]));
        assert_eq!(merged.results.len(), 1);
        assert_eq!(merged.results[0].suggestions, vec!["first".to_string()]);
    }

    #[test]
    fn test_merge_score_and_grade_pessimistic() {
        let clean = report(vec![ValidationResult::pass("ok", Severity::Info)]);
        let dirty = report(vec![ValidationResult::fail("bad", Severity::Error, "x")]);

        let merged = merge(&clean, &dirty);
        assert_eq!(merged.score, 85);
        assert_eq!(merged.grade, Grade::B);
        assert_eq!(merged.passed, 1);
        assert_eq!(merged.failed, 1);
    }

    #[test]
    fn test_merge_multiple_empty() {
        let merged = merge_multiple(&[]);
        assert_eq!(merged.score, 100);
        assert_eq!(merged.grade, Grade::A);
        assert!(merged.results.is_empty());
        assert_eq!(merged.failed, 0);
    }

    #[test]
    fn test_merge_multiple_single_is_identity() {
        let r = report(vec![ValidationResult::fail("bad", Severity::Warning, "x")]);
        let merged = merge_multiple(std::slice::from_ref(&r));
        assert_eq!(merged, r);
    }
}
