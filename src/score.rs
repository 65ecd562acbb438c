//! Scoring and grading for validation reports.
//!
//! Dockerfile and manifest reports use different weights and grade
//! thresholds. Schema violations are structurally disqualifying, so the
//! manifest formula penalizes them harder.

use crate::types::{now_timestamp, Grade, Severity, ValidationReport, ValidationResult};

/// Point weights per failing finding for Dockerfile reports.
pub mod dockerfile_points {
    pub const ERROR: i32 = 15;
    pub const WARNING: i32 = 5;
    pub const INFO: i32 = 2;
}

/// Point weights per failing finding for manifest reports.
pub mod manifest_points {
    pub const ERROR: i32 = 25;
    pub const WARNING: i32 = 8;
    pub const INFO: i32 = 2;
}

/// Minimum score for each passing grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeThresholds {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
}

/// Grade thresholds for Dockerfile and AI reports.
pub const DOCKERFILE_GRADES: GradeThresholds = GradeThresholds {
    a: 90,
    b: 80,
    c: 70,
    d: 60,
};

/// Grade thresholds for manifest reports.
pub const MANIFEST_GRADES: GradeThresholds = GradeThresholds {
    a: 90,
    b: 75,
    c: 60,
    d: 45,
};

/// Failing-finding counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

impl SeverityCounts {
    /// Count failing results by severity. Passing results are ignored.
    pub fn from_results(results: &[ValidationResult]) -> Self {
        let failed = || results.iter().filter(|r| !r.is_valid);
        Self {
            errors: failed().filter(|r| r.severity() == Severity::Error).count(),
            warnings: failed().filter(|r| r.severity() == Severity::Warning).count(),
            info: failed().filter(|r| r.severity() == Severity::Info).count(),
        }
    }
}

fn clamp_score(points: i64) -> u8 {
    points.clamp(0, 100) as u8
}

/// `100 - errors*15 - warnings*5 - info*2`, clamped to `[0, 100]`.
pub fn dockerfile_score(counts: SeverityCounts) -> u8 {
    let penalty = counts.errors as i64 * dockerfile_points::ERROR as i64
        + counts.warnings as i64 * dockerfile_points::WARNING as i64
        + counts.info as i64 * dockerfile_points::INFO as i64;
    clamp_score(100 - penalty)
}

/// `100 - errors*25 - warnings*8 - info*2`, clamped to `[0, 100]`.
pub fn manifest_score(counts: SeverityCounts) -> u8 {
    let penalty = counts.errors as i64 * manifest_points::ERROR as i64
        + counts.warnings as i64 * manifest_points::WARNING as i64
        + counts.info as i64 * manifest_points::INFO as i64;
    clamp_score(100 - penalty)
}

/// Determine the letter grade from a score.
pub fn grade_for(score: u8, thresholds: &GradeThresholds) -> Grade {
    match score {
        s if s >= thresholds.a => Grade::A,
        s if s >= thresholds.b => Grade::B,
        s if s >= thresholds.c => Grade::C,
        s if s >= thresholds.d => Grade::D,
        _ => Grade::F,
    }
}

/// Which validator a report belongs to. Selects the scoring formula and grade scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Dockerfile,
    Manifest,
}

impl ReportKind {
    pub fn score(&self, counts: SeverityCounts) -> u8 {
        match self {
            ReportKind::Dockerfile => dockerfile_score(counts),
            ReportKind::Manifest => manifest_score(counts),
        }
    }

    pub fn thresholds(&self) -> &'static GradeThresholds {
        match self {
            ReportKind::Dockerfile => &DOCKERFILE_GRADES,
            ReportKind::Manifest => &MANIFEST_GRADES,
        }
    }

    pub fn grade(&self, score: u8) -> Grade {
        grade_for(score, self.thresholds())
    }
}

/// Aggregate results into a graded report.
pub fn build_report(results: Vec<ValidationResult>, kind: ReportKind) -> ValidationReport {
    let passed = results.iter().filter(|r| r.is_valid).count();
    let failed = results.len() - passed;
    let counts = SeverityCounts::from_results(&results);
    let score = kind.score(counts);

    ValidationReport {
        results,
        score,
        grade: kind.grade(score),
        passed,
        failed,
        errors: counts.errors,
        warnings: counts.warnings,
        info: counts.info,
        timestamp: now_timestamp(),
    }
}

/// A report holding a single terminal failure: score 0, grade F.
pub fn terminal_report(result: ValidationResult) -> ValidationReport {
    let counts = SeverityCounts::from_results(std::slice::from_ref(&result));
    let failed = usize::from(!result.is_valid);
    ValidationReport {
        passed: 1 - failed,
        failed,
        errors: counts.errors,
        warnings: counts.warnings,
        info: counts.info,
        results: vec![result],
        score: 0,
        grade: Grade::F,
        timestamp: now_timestamp(),
    }
}
