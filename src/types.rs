//! Core types for validation results and reports.

use serde::{Deserialize, Serialize};

/// Severity levels for findings.
///
/// Ordered so that `Error > Warning > Info`, which is the order used to break
/// ties when two reports disagree about the same finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    /// Parse a severity leniently. Returns None for non-canonical values.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::parse(s).ok_or_else(|| format!("unknown severity: {}", s))
    }
}

/// Rule categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleCategory {
    #[serde(rename = "security")]
    Security,
    #[serde(rename = "performance")]
    Performance,
    #[serde(rename = "best-practice")]
    BestPractice,
    #[serde(rename = "compliance")]
    Compliance,
    #[serde(rename = "optimization")]
    Optimization,
}

impl RuleCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Security => "security",
            RuleCategory::Performance => "performance",
            RuleCategory::BestPractice => "best-practice",
            RuleCategory::Compliance => "compliance",
            RuleCategory::Optimization => "optimization",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "security" => Some(RuleCategory::Security),
            "performance" => Some(RuleCategory::Performance),
            "best-practice" => Some(RuleCategory::BestPractice),
            "compliance" => Some(RuleCategory::Compliance),
            "optimization" => Some(RuleCategory::Optimization),
            _ => None,
        }
    }
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Letter grade. Declared best to worst so `max` yields the worse grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    /// The worse of two grades (`F > D > C > B > A`).
    pub fn worse(self, other: Grade) -> Grade {
        self.max(other)
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata attached to each result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub severity: Severity,
    /// Category name. Kept as a string so AI-produced categories pass through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Path of the violating field, for schema findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_enhanced: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_suggestion: Option<String>,
}

impl ResultMetadata {
    pub fn new(severity: Severity) -> Self {
        Self {
            severity,
            category: None,
            location: None,
            field: None,
            ai_enhanced: None,
            fix_suggestion: None,
        }
    }
}

/// The outcome of one rule evaluation or one schema violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub rule_id: String,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub metadata: ResultMetadata,
}

impl ValidationResult {
    /// A passing result with no findings.
    pub fn pass(rule_id: impl Into<String>, severity: Severity) -> Self {
        Self {
            rule_id: rule_id.into(),
            is_valid: true,
            message: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
            confidence: None,
            metadata: ResultMetadata::new(severity),
        }
    }

    /// A failing result. The message is filed under `errors` or `warnings`
    /// depending on severity; info findings are filed as warnings.
    pub fn fail(rule_id: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut result = Self::pass(rule_id, severity);
        result.is_valid = false;
        match severity {
            Severity::Error => result.errors.push(message),
            Severity::Warning | Severity::Info => result.warnings.push(message),
        }
        result
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.metadata.category = Some(category.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.metadata.location = Some(location.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.metadata.field = Some(field.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.metadata.severity
    }

    /// Best human-readable message: `message`, then joined errors, then joined warnings.
    pub fn display_message(&self) -> String {
        if let Some(msg) = &self.message {
            return msg.clone();
        }
        if !self.errors.is_empty() {
            return self.errors.join("|");
        }
        self.warnings.join("|")
    }
}

/// An aggregated, graded set of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub results: Vec<ValidationResult>,
    pub score: u8,
    pub grade: Grade,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    /// ISO-8601 creation time.
    pub timestamp: String,
}

impl ValidationReport {
    /// Failing results only.
    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| !r.is_valid)
    }

    /// Find the result for a rule id.
    pub fn result(&self, rule_id: &str) -> Option<&ValidationResult> {
        self.results.iter().find(|r| r.rule_id == rule_id)
    }

    /// Check if any failing result has error severity.
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Current time as an ISO-8601 string.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
