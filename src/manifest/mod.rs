//! Kubernetes-style manifest validation against the schema registry.

pub mod kinds;
pub mod parser;
pub mod registry;
pub mod schema;

pub use parser::{parse_documents, Document, ManifestParseError};
pub use registry::{Gvk, SchemaRegistry};
pub use schema::{Schema, Violation};

use crate::score::{build_report, terminal_report, ReportKind};
use crate::types::{RuleCategory, Severity, ValidationReport, ValidationResult};

/// Rule id for inputs that cannot be parsed at all.
pub const SCHEMA_PARSE_ERROR_RULE: &str = "schema-parse-error";
pub const SCHEMA_INVALID_DOC_RULE: &str = "schema-invalid-doc";
pub const SCHEMA_MISSING_GVK_RULE: &str = "schema-missing-gvk";

const COMPLIANCE: &str = RuleCategory::Compliance.as_str();

/// Validates manifests document by document.
#[derive(Debug, Default)]
pub struct ManifestValidator {
    registry: SchemaRegistry,
    allow_unknown_resources: bool,
}

impl ManifestValidator {
    pub fn new(allow_unknown_resources: bool) -> Self {
        Self {
            registry: SchemaRegistry::new(),
            allow_unknown_resources,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn allows_unknown_resources(&self) -> bool {
        self.allow_unknown_resources
    }

    /// Validate a (possibly multi-document) YAML manifest.
    pub fn evaluate(&self, text: &str) -> ValidationReport {
        let documents = match parse_documents(text) {
            Ok(docs) => docs,
            Err(e) => {
                let result = ValidationResult::fail(SCHEMA_PARSE_ERROR_RULE, Severity::Error, e.to_string())
                    .with_category(COMPLIANCE);
                return terminal_report(result);
            }
        };

        let mut results = Vec::new();
        for doc in &documents {
            self.evaluate_document(doc, &mut results);
        }
        build_report(results, ReportKind::Manifest)
    }

    fn evaluate_document(&self, doc: &Document, results: &mut Vec<ValidationResult>) {
        if doc.as_object().is_none() {
            results.push(
                ValidationResult::fail(
                    SCHEMA_INVALID_DOC_RULE,
                    Severity::Error,
                    format!("{} is not a mapping", doc.location()),
                )
                .with_category(COMPLIANCE)
                .with_location(doc.location()),
            );
            return;
        }

        let Some(gvk) = doc.gvk() else {
            results.push(
                ValidationResult::fail(
                    SCHEMA_MISSING_GVK_RULE,
                    Severity::Error,
                    format!("{} is missing apiVersion or kind", doc.location()),
                )
                .with_category(COMPLIANCE)
                .with_location(doc.location())
                .with_suggestion("Add apiVersion and kind fields"),
            );
            return;
        };

        let location = format!("{}/{}", gvk.kind, doc.name().unwrap_or("unnamed"));

        let Some(schema) = self.registry.get(&gvk) else {
            results.push(self.unknown_kind(&gvk, location));
            return;
        };

        let violations = schema::validate(schema, &doc.value);
        tracing::debug!(gvk = %gvk, location = %location, violations = violations.len(), "validated document");

        if !violations.iter().any(Violation::is_error) {
            results.push(
                ValidationResult::pass(format!("schema-{}-valid", gvk.kind), Severity::Info)
                    .with_category(COMPLIANCE)
                    .with_location(location.clone()),
            );
        }

        for violation in violations {
            let rule_id = if violation.is_error() {
                format!("schema-{}-invalid", gvk.kind)
            } else {
                format!("schema-{}-warning", gvk.kind)
            };
            results.push(
                ValidationResult::fail(rule_id, violation.severity, violation.to_string())
                    .with_category(COMPLIANCE)
                    .with_location(location.clone())
                    .with_field(violation.field),
            );
        }
    }

    fn unknown_kind(&self, gvk: &Gvk, location: String) -> ValidationResult {
        let rule_id = format!("schema-unknown-{}", gvk.kind);
        if self.allow_unknown_resources {
            ValidationResult::pass(rule_id, Severity::Info)
                .with_message(format!(
                    "no schema registered for {}, skipped because unknown resources are allowed",
                    gvk
                ))
                .with_category(COMPLIANCE)
                .with_location(location)
        } else {
            ValidationResult::fail(
                rule_id,
                Severity::Warning,
                format!(
                    "{}: cannot validate, possibly an unrecognized or newer resource type",
                    gvk
                ),
            )
            .with_category(COMPLIANCE)
            .with_location(location)
            .with_suggestion("Check the apiVersion and kind, or allow unknown resources")
        }
    }
}
