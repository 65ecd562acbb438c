//! Command-line interface for containercheck.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::ai::{ExecutionContext, Focus, HttpSamplingClient, SamplingClient};
use crate::config::{Config, DEFAULT_TEMPLATE};
use crate::dockerfile::RULES;
use crate::engine::{ArtifactKind, Engine};
use crate::enhance::SamplingEnhancer;
use crate::manifest::ManifestValidator;
use crate::merge::merge_multiple;
use crate::report::{self, FileReport, RunReport};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

const FORMATS: &[&str] = &["pretty", "json", "sarif"];

/// Validate Dockerfiles and Kubernetes manifests.
///
/// Containercheck scores container build files against a catalog of
/// security and best-practice rules, and checks Kubernetes manifests against
/// structural schemas. AI review and rewrite suggestions are optional.
#[derive(Parser)]
#[command(name = "containercheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a file or every supported file under a directory
    #[command(visible_alias = "check")]
    Lint(LintArgs),
    /// Merge previously written JSON reports into one verdict
    Merge(MergeArgs),
    /// List the Dockerfile rules and known manifest kinds
    Rules(RulesArgs),
    /// Write a default configuration file
    Init(InitArgs),
}

/// Arguments for the lint command.
#[derive(Parser)]
pub struct LintArgs {
    /// Path to check (file or directory)
    pub path: PathBuf,

    /// Content kind: auto, dockerfile, or kubernetes
    #[arg(short, long, default_value = "auto")]
    pub kind: String,

    /// Output format: pretty, json, or sarif
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Pass manifests whose kind has no known schema
    #[arg(long)]
    pub allow_unknown_resources: bool,

    /// Do not run the external Dockerfile linter
    #[arg(long)]
    pub no_external_linter: bool,

    /// Also run an AI review of each file
    #[arg(long)]
    pub ai: bool,

    /// AI review focus: security, performance, best-practices, or all
    #[arg(long)]
    pub focus: Option<String>,

    /// Ask for a rewrite of files scoring below the enhancement threshold
    #[arg(long)]
    pub enhance: bool,

    /// Minimum acceptable score (exit non-zero below it)
    #[arg(short, long)]
    pub min_score: Option<u8>,
}

/// Arguments for the merge command.
#[derive(Parser)]
pub struct MergeArgs {
    /// JSON reports written by `lint --format json`
    #[arg(required = true)]
    pub reports: Vec<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Minimum acceptable merged score
    #[arg(short, long, default_value_t = 60)]
    pub min_score: u8,
}

/// Arguments for the rules command.
#[derive(Parser)]
pub struct RulesArgs {
    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "containercheck.yaml")]
    pub output: PathBuf,
}

/// Collect candidate files under `root`, skipping hidden and dependency directories.
fn collect_files(root: &Path, config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            if e.depth() > 0 && e.file_type().is_dir() && name.starts_with('.') {
                return false;
            }
            if e.file_type().is_dir() && (name == "vendor" || name == "node_modules" || name == "target") {
                return false;
            }
            !config.is_path_excluded(e.path())
        })
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

fn parse_kind(kind: &str) -> Result<Option<ArtifactKind>, String> {
    if kind.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    kind.parse().map(Some)
}

/// Fold command-line overrides into the loaded configuration.
fn apply_overrides(config: &mut Config, args: &LintArgs) -> Result<(), String> {
    if args.allow_unknown_resources {
        config.allow_unknown_resources = true;
    }
    if args.no_external_linter {
        config.enable_external_linter = false;
    }
    if let Some(min) = args.min_score {
        if min > 100 {
            return Err(format!("--min-score must be between 0 and 100, got {}", min));
        }
        config.min_score = min;
    }
    if args.ai {
        config.ai.enabled = true;
    }
    if let Some(focus) = &args.focus {
        config.ai.focus = focus.parse::<Focus>()?;
    }
    if args.enhance {
        config.enhancement.enabled = true;
    }
    Ok(())
}

/// A file read from disk with its resolved kind.
struct Artifact {
    path: PathBuf,
    kind: ArtifactKind,
    content: String,
}

fn read_artifact(path: &Path, forced: Option<ArtifactKind>, single: bool) -> Option<Artifact> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(path = %path.display(), "skipping unreadable file: {}", e);
            return None;
        }
    };

    let detected = Engine::detect_kind(path, &content);
    let kind = match (forced, detected) {
        (Some(kind), _) if single => kind,
        (Some(kind), Some(found)) if kind == found => kind,
        (None, Some(found)) => found,
        _ => return None,
    };

    Some(Artifact {
        path: path.to_path_buf(),
        kind,
        content,
    })
}

/// Run the deterministic validators over every artifact in parallel.
fn validate_all(engine: &Engine, artifacts: &[Artifact], progress: &ProgressBar) -> Vec<FileReport> {
    artifacts
        .par_iter()
        .map(|a| {
            let report = engine.validate(a.kind, &a.content);
            progress.inc(1);
            FileReport::new(a.path.to_string_lossy(), a.kind, report)
        })
        .collect()
}

/// AI review and rewrite suggestions, one file at a time.
fn augment(engine: &Engine, artifacts: &[Artifact], reports: &mut [FileReport]) -> anyhow::Result<()> {
    let config = engine.config();
    let client: Arc<dyn SamplingClient> = match HttpSamplingClient::from_config(&config.ai) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Warning: AI features unavailable: {}", e);
            return Ok(());
        }
    };
    let ctx = ExecutionContext::new(client.clone());
    let enhancer = SamplingEnhancer::from_config(client, &config.ai);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        for (artifact, file) in artifacts.iter().zip(reports.iter_mut()) {
            if config.ai.enabled {
                match engine.review(artifact.kind, &artifact.content, &ctx).await {
                    Ok(ai) => file.ai = Some(ai),
                    Err(e) => {
                        tracing::warn!(path = %file.path, "AI review failed: {}", e);
                        file.ai_error = Some(e.to_string());
                    }
                }
            }
            if config.enhancement.enabled {
                file.enhancement = engine
                    .enhance(artifact.kind, &file.report, &artifact.content, &enhancer)
                    .await;
            }
        }
    });

    Ok(())
}

/// Run the lint command.
pub fn run_lint(args: &LintArgs) -> anyhow::Result<i32> {
    // Validate format
    if !FORMATS.contains(&args.format.as_str()) {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty', 'json', or 'sarif'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let forced = match parse_kind(&args.kind) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    // Load config
    let cwd = std::env::current_dir()?;
    let (mut config, config_path) = match Config::discover(args.config.as_deref(), &cwd) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    if let Err(e) = apply_overrides(&mut config, args) {
        eprintln!("Error: {}", e);
        return Ok(EXIT_ERROR);
    }

    // Resolve path
    let abs_path = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };
    let single = abs_path.is_file();

    let candidates = if single {
        vec![abs_path.clone()]
    } else {
        collect_files(&abs_path, &config)?
    };

    let artifacts: Vec<Artifact> = candidates
        .iter()
        .filter_map(|p| read_artifact(p, forced, single))
        .collect();

    if artifacts.is_empty() {
        if single {
            eprintln!(
                "Error: cannot tell what {} is; use --kind dockerfile or --kind kubernetes",
                args.path.display()
            );
            return Ok(EXIT_ERROR);
        }
        eprintln!("Warning: no Dockerfiles or manifests found");
        return Ok(EXIT_SUCCESS);
    }

    let min_score = config.min_score;
    let wants_ai = config.ai.enabled || config.enhancement.enabled;
    let engine = Engine::new(config);

    let progress = if args.format == "pretty" && artifacts.len() > 1 {
        let bar = ProgressBar::new(artifacts.len() as u64);
        bar.set_style(ProgressStyle::with_template("  {bar:30} {pos}/{len} files")?);
        bar
    } else {
        ProgressBar::hidden()
    };
    let mut files = validate_all(&engine, &artifacts, &progress);
    progress.finish_and_clear();

    if wants_ai {
        augment(&engine, &artifacts, &mut files)?;
    }

    let path_str = args.path.to_string_lossy().to_string();
    let run = RunReport::new(path_str, min_score, files);

    match args.format.as_str() {
        "json" => report::write_json(&run)?,
        "sarif" => report::write_sarif(&abs_path, &run)?,
        _ => report::write_pretty(&run, config_path.as_deref()),
    }

    if run.passed {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the merge command.
pub fn run_merge(args: &MergeArgs) -> anyhow::Result<i32> {
    if args.format != "pretty" && args.format != "json" {
        eprintln!("Error: invalid format {:?}, must be 'pretty' or 'json'", args.format);
        return Ok(EXIT_ERROR);
    }

    let mut reports = Vec::with_capacity(args.reports.len());
    for path in &args.reports {
        match report::load_report(path) {
            Ok(r) => reports.push(r),
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    let merged = merge_multiple(&reports);
    let passed = merged.score >= args.min_score;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&merged)?);
    } else {
        println!("Merged {} report(s)", reports.len());
        println!(
            "  Score: {}  Grade: {}  ({} passed, {} failed: {} errors, {} warnings, {} info)",
            merged.score, merged.grade, merged.passed, merged.failed, merged.errors, merged.warnings, merged.info
        );
        for r in merged.failures() {
            println!("  {:<8} {:<28} {}", r.severity().as_str(), r.rule_id, r.display_message());
        }
        println!("  {}", if passed { "PASSED" } else { "FAILED" });
    }

    if passed {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the rules command.
pub fn run_rules(args: &RulesArgs) -> anyhow::Result<i32> {
    let kinds = ManifestValidator::new(false).registry().kinds();

    if args.format == "json" {
        let rules: Vec<serde_json::Value> = RULES
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "name": r.name,
                    "description": r.description,
                    "severity": r.severity.as_str(),
                    "category": r.category.as_str(),
                })
            })
            .collect();
        let kinds: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
        let out = serde_json::json!({ "dockerfileRules": rules, "manifestKinds": kinds });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("Dockerfile rules:");
    println!();
    for rule in RULES {
        println!(
            "  {:<28} {:<8} {:<14} {}",
            rule.id,
            rule.severity.as_str(),
            rule.category.as_str(),
            rule.description
        );
    }

    println!();
    println!("Manifest kinds:");
    println!();
    for kind in &kinds {
        println!("  {:<24} {}", kind.kind, kind.api_version());
    }

    Ok(EXIT_SUCCESS)
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // Check if output already exists
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, DEFAULT_TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your project", args.output.display());
    println!("  2. Run: containercheck lint . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}
