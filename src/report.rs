//! Output formatting for containercheck results.
//!
//! Supports three output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: camelCase structured output, readable back by `containercheck merge`
//! - SARIF: Static Analysis Results Interchange Format for IDE/CI integration

use colored::*;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::ai::AiValidationResult;
use crate::dockerfile::rules::find_rule;
use crate::engine::ArtifactKind;
use crate::enhance::EnhancementOutcome;
use crate::merge::merge_multiple;
use crate::types::{Grade, Severity, ValidationReport, ValidationResult};

/// Everything produced for one scanned file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: String,
    pub kind: ArtifactKind,
    pub report: ValidationReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<AiValidationResult>,
    /// Why the AI review is missing, when it was requested and failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancement: Option<EnhancementOutcome>,
}

impl FileReport {
    pub fn new(path: impl Into<String>, kind: ArtifactKind, report: ValidationReport) -> Self {
        Self {
            path: path.into(),
            kind,
            report,
            ai: None,
            ai_error: None,
            enhancement: None,
        }
    }
}

/// The result of one `lint` run: per-file reports plus the merged verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub version: String,
    pub path: String,
    pub min_score: u8,
    pub passed: bool,
    pub files_scanned: usize,
    pub overall: ValidationReport,
    pub files: Vec<FileReport>,
}

impl RunReport {
    /// Merge the deterministic reports of `files` into the overall verdict.
    pub fn new(path: impl Into<String>, min_score: u8, files: Vec<FileReport>) -> Self {
        let reports: Vec<ValidationReport> = files.iter().map(|f| f.report.clone()).collect();
        let overall = merge_multiple(&reports);
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            path: path.into(),
            min_score,
            passed: overall.score >= min_score,
            files_scanned: files.len(),
            overall,
            files,
        }
    }
}

/// Read a report written by `write_json`, or a bare `ValidationReport`.
pub fn load_report(path: &Path) -> anyhow::Result<ValidationReport> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("{} is not valid JSON: {}", path.display(), e))?;

    let report = match value.get("overall") {
        Some(overall) => serde_json::from_value(overall.clone()),
        None => serde_json::from_value(value),
    };
    report.map_err(|e| anyhow::anyhow!("{} is not a validation report: {}", path.display(), e))
}

// =============================================================================
// JSON Format
// =============================================================================

/// Write a run in JSON format.
pub fn write_json(run: &RunReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(run)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// SARIF Format
// =============================================================================

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str = "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const TOOL_NAME: &str = "containercheck";
const INFO_URI: &str = "https://github.com/zen-systems/containercheck";

lazy_static! {
    static ref LINE_LOCATION: Regex = Regex::new(r"^line (\d+)$").unwrap();
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifReport {
    pub version: String,
    #[serde(rename = "$schema")]
    pub schema: String,
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifRun {
    pub tool: SarifTool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifTool {
    pub driver: SarifDriver,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifDriver {
    pub name: String,
    pub version: String,
    #[serde(rename = "informationUri")]
    pub information_uri: String,
    pub rules: Vec<SarifRule>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifRule {
    pub id: String,
    pub name: String,
    #[serde(rename = "shortDescription")]
    pub short_description: SarifMessage,
    #[serde(rename = "defaultConfiguration")]
    pub default_config: SarifRuleConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifRuleConfig {
    pub level: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifResult {
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    pub level: String,
    pub message: SarifMessage,
    pub locations: Vec<SarifLocation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifMessage {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    pub physical_location: SarifPhysicalLocation,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    pub artifact_location: SarifArtifact,
    pub region: SarifRegion,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifArtifact {
    pub uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifRegion {
    #[serde(rename = "startLine")]
    pub start_line: usize,
}

pub fn map_severity_to_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "note",
    }
}

fn make_relative_path(file_path: &str, base_path: &Path) -> String {
    if base_path.to_string_lossy().is_empty() {
        return file_path.to_string();
    }

    let file = Path::new(file_path);

    // Single file scan
    if file == base_path {
        return file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_string());
    }

    file.strip_prefix(base_path)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| file_path.to_string())
}

/// `line <n>` locations map to a region; anything else points at line 1.
fn start_line(result: &ValidationResult) -> usize {
    result
        .metadata
        .location
        .as_deref()
        .and_then(|loc| LINE_LOCATION.captures(loc))
        .and_then(|c| c[1].parse().ok())
        .filter(|&n: &usize| n > 0)
        .unwrap_or(1)
}

fn sarif_rule(rule_id: &str, severity: Severity) -> SarifRule {
    let (name, description) = match find_rule(rule_id) {
        Some(rule) => (rule.name.to_string(), rule.description.to_string()),
        None => (rule_id.to_string(), rule_id.to_string()),
    };
    SarifRule {
        id: rule_id.to_string(),
        name,
        short_description: SarifMessage { text: description },
        default_config: SarifRuleConfig {
            level: map_severity_to_level(severity).to_string(),
        },
    }
}

/// Build a SARIF log holding every failing deterministic and AI result.
pub fn build_sarif(base_path: &Path, run: &RunReport) -> SarifReport {
    let mut rule_ids = BTreeSet::new();
    let mut rules = Vec::new();
    let mut results = Vec::new();

    for file in &run.files {
        let ai_results = file.ai.iter().flat_map(|ai| ai.report.results.iter());
        for r in file.report.results.iter().chain(ai_results).filter(|r| !r.is_valid) {
            if rule_ids.insert(r.rule_id.clone()) {
                rules.push(sarif_rule(&r.rule_id, r.severity()));
            }
            results.push(SarifResult {
                rule_id: r.rule_id.clone(),
                level: map_severity_to_level(r.severity()).to_string(),
                message: SarifMessage {
                    text: r.display_message(),
                },
                locations: vec![SarifLocation {
                    physical_location: SarifPhysicalLocation {
                        artifact_location: SarifArtifact {
                            uri: make_relative_path(&file.path, base_path),
                        },
                        region: SarifRegion {
                            start_line: start_line(r),
                        },
                    },
                }],
            });
        }
    }

    SarifReport {
        version: SARIF_VERSION.to_string(),
        schema: SARIF_SCHEMA.to_string(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: TOOL_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    information_uri: INFO_URI.to_string(),
                    rules,
                },
            },
            results,
        }],
    }
}

/// Write a run in SARIF format.
pub fn write_sarif(base_path: &Path, run: &RunReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&build_sarif(base_path, run))?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write a run in pretty (human-readable) format.
pub fn write_pretty(run: &RunReport, config_path: Option<&Path>) {
    // Header
    println!();
    print!("  ");
    print!("{}", "containercheck".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Scanning: ".dimmed());
    println!("{}", run.path);
    print!("  {}", "Config:   ".dimmed());
    match config_path {
        Some(p) => println!("{}", p.display()),
        None => println!("{}", "(defaults)".dimmed()),
    }
    println!();

    for file in &run.files {
        write_file(file);
    }

    if run.files.len() > 1 {
        write_overall(&run.overall);
        println!();
    }

    write_final_status(run);
    println!();
}

fn write_file(file: &FileReport) {
    let report = &file.report;
    print!("  {}", file.path.blue().bold());
    print!("  {}", format!("[{}]", file.kind).dimmed());
    print!("  Score: ");
    write_colored_score(report.score);
    print!("  Grade: ");
    write_colored_grade(report.grade);
    println!();

    let failures: Vec<&ValidationResult> = report.failures().collect();
    if failures.is_empty() {
        println!("    {}", "no issues found".green());
    } else {
        println!();
        write_failures(&failures);
    }

    if let Some(ai) = &file.ai {
        write_ai(ai);
    }
    if let Some(e) = &file.ai_error {
        println!("    {} {}", "AI review unavailable:".yellow(), e);
    }
    if let Some(enhancement) = &file.enhancement {
        write_enhancement(enhancement);
    }
    println!();
}

fn write_failures(failures: &[&ValidationResult]) {
    let mut sorted = failures.to_vec();
    sorted.sort_by(|a, b| b.severity().cmp(&a.severity()));

    for r in sorted {
        write_severity_tag(r.severity());
        print!("{:<28}", r.rule_id.dimmed());
        if let Some(loc) = &r.metadata.location {
            print!("{}", loc.dimmed());
        }
        if let Some(field) = &r.metadata.field {
            print!(" {}", field.dimmed());
        }
        println!();

        println!("            {}", r.display_message());
        for s in &r.suggestions {
            println!("            {} {}", "fix:".cyan(), s);
        }
        println!();
    }
}

fn write_ai(ai: &AiValidationResult) {
    print!("    {}", "AI review".bold());
    print!("  Score: ");
    write_colored_score(ai.report.score);
    print!("  Grade: ");
    write_colored_grade(ai.report.grade);
    println!(
        "  {}",
        format!("(confidence {:.2})", ai.ai_metadata.confidence).dimmed()
    );
    if let Some(summary) = &ai.summary {
        println!("      {}", summary);
    }
    for r in ai.report.failures() {
        print!("  ");
        write_severity_tag(r.severity());
        println!("{}", r.display_message());
    }
}

fn write_enhancement(enhancement: &EnhancementOutcome) {
    println!(
        "    {} {}",
        "Suggested rewrite".bold(),
        format!("(confidence {:.2})", enhancement.confidence).dimmed()
    );
    for k in &enhancement.knowledge_applied {
        println!("      - {}", k);
    }
    for line in enhancement.enhanced_content.lines() {
        println!("      {}", line.dimmed());
    }
}

fn write_overall(overall: &ValidationReport) {
    println!("  {}", "Overall:".bold());
    println!(
        "    {} passed, {} failed ({} errors, {} warnings, {} info)",
        overall.passed, overall.failed, overall.errors, overall.warnings, overall.info
    );
}

fn write_colored_score(s: u8) {
    match s {
        s if s >= 90 => print!("{}", s.to_string().green().bold()),
        s if s >= 75 => print!("{}", s.to_string().green()),
        s if s >= 60 => print!("{}", s.to_string().yellow()),
        s if s >= 45 => print!("{}", s.to_string().yellow().bold()),
        _ => print!("{}", s.to_string().red()),
    }
}

fn write_colored_grade(grade: Grade) {
    let g = grade.as_str();
    match grade {
        Grade::A => print!("{}", g.green().bold()),
        Grade::B => print!("{}", g.green()),
        Grade::C => print!("{}", g.yellow()),
        Grade::D => print!("{}", g.yellow().bold()),
        Grade::F => print!("{}", g.red()),
    }
}

fn write_severity_tag(severity: Severity) {
    match severity {
        Severity::Error => print!("    {} ", "ERROR".red()),
        Severity::Warning => print!("    {} ", "WARN ".yellow()),
        Severity::Info => print!("    {} ", "INFO ".blue()),
    }
}

fn write_final_status(run: &RunReport) {
    print!("  {}", format!("Minimum score: {}", run.min_score).dimmed());
    print!("  Score: ");
    write_colored_score(run.overall.score);
    print!("  Grade: ");
    write_colored_grade(run.overall.grade);
    print!("  ");

    if run.passed {
        print!("{}", "PASSED".green());
    } else {
        print!("{}", "FAILED".red());
    }
    println!();
}
