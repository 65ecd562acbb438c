//! Tests for report loading, merging and the lint command surface.

use std::path::PathBuf;

use tempfile::TempDir;

use containercheck::cli::{self, LintArgs, MergeArgs, EXIT_ERROR, EXIT_FAILED, EXIT_SUCCESS};
use containercheck::engine::{ArtifactKind, Engine};
use containercheck::merge::merge_multiple;
use containercheck::report::{build_sarif, load_report, FileReport, RunReport};
use containercheck::{Config, Grade, Severity};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

/// A config file with the external linter off, so results do not depend on the host.
fn offline_config(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("containercheck.yaml");
    std::fs::write(&path, "enable_external_linter: false\nmin_score: 60\n").unwrap();
    path
}

fn lint_args(path: PathBuf, config: PathBuf) -> LintArgs {
    LintArgs {
        path,
        kind: "auto".to_string(),
        format: "json".to_string(),
        config: Some(config),
        allow_unknown_resources: false,
        no_external_linter: false,
        ai: false,
        focus: None,
        enhance: false,
        min_score: None,
    }
}

#[test]
fn test_load_bare_and_wrapped_reports() {
    let reports = testdata_path().join("reports");
    let bare = load_report(&reports.join("internal.json")).unwrap();
    let wrapped = load_report(&reports.join("lint-run.json")).unwrap();

    assert_eq!(bare.score, 85);
    assert_eq!(wrapped.score, 90);
    assert_eq!(wrapped.results.len(), 2);

    let err = load_report(&reports.join("not-a-report.json")).unwrap_err();
    assert!(err.to_string().contains("not a validation report"));
}

#[test]
fn test_merge_fixture_reports() {
    let reports = testdata_path().join("reports");
    let merged = merge_multiple(&[
        load_report(&reports.join("internal.json")).unwrap(),
        load_report(&reports.join("lint-run.json")).unwrap(),
    ]);

    assert_eq!(merged.results.len(), 3);
    assert_eq!(merged.score, 85);
    assert_eq!(merged.grade, Grade::B);
    assert_eq!(merged.result("no-root-user").unwrap().severity(), Severity::Error);
    assert_eq!((merged.errors, merged.warnings, merged.info), (1, 1, 0));
}

#[test]
fn test_merge_command_exit_codes() {
    let reports = testdata_path().join("reports");
    let args = MergeArgs {
        reports: vec![reports.join("internal.json"), reports.join("lint-run.json")],
        format: "json".to_string(),
        min_score: 80,
    };
    assert_eq!(cli::run_merge(&args).unwrap(), EXIT_SUCCESS);

    let strict = MergeArgs { min_score: 90, ..args };
    assert_eq!(cli::run_merge(&strict).unwrap(), EXIT_FAILED);

    let missing = MergeArgs {
        reports: vec![reports.join("nope.json")],
        format: "json".to_string(),
        min_score: 0,
    };
    assert_eq!(cli::run_merge(&missing).unwrap(), EXIT_ERROR);
}

#[test]
fn test_lint_single_file() {
    let temp = TempDir::new().unwrap();
    let config = offline_config(&temp);

    let good = lint_args(testdata_path().join("Dockerfile.good"), config.clone());
    assert_eq!(cli::run_lint(&good).unwrap(), EXIT_SUCCESS);

    let bad = lint_args(testdata_path().join("Dockerfile.bad"), config);
    assert_eq!(cli::run_lint(&bad).unwrap(), EXIT_FAILED);
}

#[test]
fn test_lint_rejects_bad_arguments() {
    let temp = TempDir::new().unwrap();
    let config = offline_config(&temp);

    let mut args = lint_args(testdata_path().join("Dockerfile.good"), config.clone());
    args.format = "xml".to_string();
    assert_eq!(cli::run_lint(&args).unwrap(), EXIT_ERROR);

    let mut args = lint_args(testdata_path().join("Dockerfile.good"), config);
    args.kind = "helm".to_string();
    assert_eq!(cli::run_lint(&args).unwrap(), EXIT_ERROR);

    let args = lint_args(
        testdata_path().join("Dockerfile.good"),
        temp.path().join("missing.yaml"),
    );
    assert_eq!(cli::run_lint(&args).unwrap(), EXIT_ERROR);
}

#[test]
fn test_lint_directory_of_manifests() {
    let temp = TempDir::new().unwrap();
    let config = offline_config(&temp);
    let dir = temp.path().join("k8s");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::copy(testdata_path().join("manifests/valid.yaml"), dir.join("deploy.yaml")).unwrap();
    std::fs::write(dir.join("notes.yaml"), "title: not a manifest\n").unwrap();

    let args = lint_args(dir.clone(), config.clone());
    assert_eq!(cli::run_lint(&args).unwrap(), EXIT_SUCCESS);

    std::fs::copy(testdata_path().join("manifests/invalid.yaml"), dir.join("svc.yaml")).unwrap();
    let args = lint_args(dir, config);
    assert_eq!(cli::run_lint(&args).unwrap(), EXIT_FAILED);
}

#[test]
fn test_run_report_from_engine() {
    let engine = Engine::new(Config {
        enable_external_linter: false,
        ..Config::default()
    });

    let files: Vec<FileReport> = ["Dockerfile.good", "manifests/valid.yaml", "manifests/unknown-kind.yaml"]
        .iter()
        .map(|name| {
            let path = testdata_path().join(name);
            let content = std::fs::read_to_string(&path).unwrap();
            let kind = Engine::detect_kind(&path, &content).unwrap();
            FileReport::new(path.to_string_lossy(), kind, engine.validate(kind, &content))
        })
        .collect();
    assert_eq!(files[1].kind, ArtifactKind::Kubernetes);

    let run = RunReport::new(testdata_path().to_string_lossy(), 60, files);
    // Unknown kind is a single warning under manifest scoring: 100 - 8.
    assert_eq!(run.overall.score, 92);
    assert!(run.passed);

    let sarif = build_sarif(&testdata_path(), &run);
    let results = &sarif.runs[0].results;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].rule_id, "schema-unknown-CustomThing");
    assert_eq!(
        results[0].locations[0].physical_location.artifact_location.uri,
        "manifests/unknown-kind.yaml"
    );

    let json = serde_json::to_string(&run).unwrap();
    let back: RunReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.overall.score, run.overall.score);
    assert_eq!(back.files.len(), 3);
}
