//! Static Dockerfile rule catalog.
//!
//! Each rule is a plain record: an id, metadata, and a predicate over the
//! full instruction sequence. Evaluation yields exactly one result per rule.

use lazy_static::lazy_static;
use regex::Regex;

use super::parser::Instruction;
use crate::types::{ResultMetadata, RuleCategory, Severity, ValidationResult};

/// A declarative Dockerfile rule.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: RuleCategory,
    pub severity: Severity,
    /// Returns true when the instruction sequence passes.
    pub check: fn(&[Instruction]) -> bool,
    pub fix_hint: Option<&'static str>,
}

lazy_static! {
    static ref SUDO_INSTALL: Regex = Regex::new(
        r"(?i)\bsudo\s+(?:-\S+\s+)*(?:apt-get|apt|yum|dnf|apk|zypper|pip3?|npm|gem)\b.*\b(?:install|add)\b"
    ).unwrap();

    static ref LATEST_TAG: Regex = Regex::new(r"(?i):latest$").unwrap();

    static ref STAGE_ALIAS: Regex = Regex::new(r"(?i)\s+as\s+\S+\s*$").unwrap();

    static ref PACKAGE_MANIFEST: Regex = Regex::new(
        r"(?i)(package(?:-lock)?\.json|package\*\.json|npm-shrinkwrap\.json|yarn\.lock|pnpm-lock\.yaml|requirements[\w.*-]*\.txt|pipfile(?:\.lock)?|pyproject\.toml|poetry\.lock|go\.(?:mod|sum)|cargo\.(?:toml|lock)|pom\.xml|build\.gradle(?:\.kts)?|gemfile(?:\.lock)?|composer\.(?:json|lock)|\*\.csproj)"
    ).unwrap();

    static ref SECRET_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)passw(?:or)?d\w*\s*=\s*\S+").unwrap(),
        Regex::new(r"(?i)api[_-]?key\w*\s*=\s*\S+").unwrap(),
        Regex::new(r"(?i)secret\w*\s*=\s*\S+").unwrap(),
        Regex::new(r"(?i)token\w*\s*=\s*\S+").unwrap(),
    ];

    static ref APT_INSTALL: Regex = Regex::new(r"\bapt-get\s+install\b").unwrap();
    static ref APT_LISTS_CLEANUP: Regex = Regex::new(r"rm\s+-\w*r\w*\s+.*?/var/lib/apt/lists").unwrap();
}

/// Instruction count below which multi-stage builds are not expected.
pub const MULTI_STAGE_MIN_INSTRUCTIONS: usize = 10;

/// The full catalog, evaluated in order.
pub static RULES: &[Rule] = &[
    Rule {
        id: "no-root-user",
        name: "No Root User",
        description: "Container should run as a non-root user",
        category: RuleCategory::Security,
        severity: Severity::Error,
        check: check_no_root_user,
        fix_hint: Some("Add 'USER <non-root-user>' after installing dependencies"),
    },
    Rule {
        id: "no-sudo-install",
        name: "No Sudo Install",
        description: "Package installation should not use sudo",
        category: RuleCategory::Security,
        severity: Severity::Warning,
        check: check_no_sudo_install,
        fix_hint: Some("Install packages before switching users instead of using sudo"),
    },
    Rule {
        id: "specific-base-image",
        name: "Specific Base Image",
        description: "Base images should be pinned to a specific tag, not latest",
        category: RuleCategory::BestPractice,
        severity: Severity::Warning,
        check: check_specific_base_image,
        fix_hint: Some("Pin the base image to a version tag, e.g. node:20-alpine"),
    },
    Rule {
        id: "has-healthcheck",
        name: "Has Healthcheck",
        description: "Image should define a HEALTHCHECK",
        category: RuleCategory::BestPractice,
        severity: Severity::Info,
        check: check_has_healthcheck,
        fix_hint: Some("Add 'HEALTHCHECK CMD <command>' to let the runtime probe the container"),
    },
    Rule {
        id: "layer-caching-optimization",
        name: "Layer Caching Optimization",
        description: "Dependency manifests should be copied before the rest of the build context",
        category: RuleCategory::Optimization,
        severity: Severity::Info,
        check: check_layer_caching,
        fix_hint: Some("COPY package manifests and install dependencies before 'COPY . .'"),
    },
    Rule {
        id: "no-secrets",
        name: "No Secrets",
        description: "ENV and ARG instructions must not embed credentials",
        category: RuleCategory::Security,
        severity: Severity::Error,
        check: check_no_secrets,
        fix_hint: Some("Pass secrets at runtime or use BuildKit secret mounts"),
    },
    Rule {
        id: "multi-stage-optimization",
        name: "Multi-Stage Build",
        description: "Larger Dockerfiles should use multi-stage builds to keep images small",
        category: RuleCategory::Optimization,
        severity: Severity::Info,
        check: check_multi_stage,
        fix_hint: Some("Split build tooling into a builder stage and copy artifacts into a slim runtime stage"),
    },
    Rule {
        id: "has-expose",
        name: "Has Expose",
        description: "Images that run a service should document their port with EXPOSE",
        category: RuleCategory::BestPractice,
        severity: Severity::Info,
        check: check_has_expose,
        fix_hint: Some("Add 'EXPOSE <port>' for the port the service listens on"),
    },
    Rule {
        id: "workdir-set",
        name: "Workdir Set",
        description: "A WORKDIR should be set instead of relying on the root directory",
        category: RuleCategory::BestPractice,
        severity: Severity::Info,
        check: check_workdir_set,
        fix_hint: Some("Add 'WORKDIR /app' before copying files"),
    },
    Rule {
        id: "no-add-remote-url",
        name: "No ADD From URL",
        description: "ADD should not fetch remote URLs",
        category: RuleCategory::Security,
        severity: Severity::Warning,
        check: check_no_add_remote_url,
        fix_hint: Some("Download with RUN curl and verify a checksum, or COPY a vendored file"),
    },
    Rule {
        id: "apt-cache-cleanup",
        name: "Apt Cache Cleanup",
        description: "apt-get install should remove /var/lib/apt/lists in the same layer",
        category: RuleCategory::Optimization,
        severity: Severity::Info,
        check: check_apt_cache_cleanup,
        fix_hint: Some("Append '&& rm -rf /var/lib/apt/lists/*' to the install RUN"),
    },
];

/// Look up a rule by id.
pub fn find_rule(id: &str) -> Option<&'static Rule> {
    RULES.iter().find(|r| r.id == id)
}

/// Evaluate one rule into a result.
pub fn evaluate_rule(rule: &Rule, instructions: &[Instruction]) -> ValidationResult {
    let passed = (rule.check)(instructions);
    tracing::debug!(rule = rule.id, passed, "evaluated dockerfile rule");

    let mut metadata = ResultMetadata::new(rule.severity);
    metadata.category = Some(rule.category.as_str().to_string());

    ValidationResult {
        rule_id: rule.id.to_string(),
        is_valid: passed,
        message: None,
        errors: if passed {
            Vec::new()
        } else {
            vec![format!("{}: {}", rule.name, rule.description)]
        },
        warnings: Vec::new(),
        suggestions: match (passed, rule.fix_hint) {
            (false, Some(hint)) => vec![hint.to_string()],
            _ => Vec::new(),
        },
        confidence: None,
        metadata,
    }
}

/// Evaluate the whole catalog.
pub fn evaluate_all(instructions: &[Instruction]) -> Vec<ValidationResult> {
    RULES
        .iter()
        .map(|rule| evaluate_rule(rule, instructions))
        .collect()
}

fn named<'a>(instructions: &'a [Instruction], name: &'a str) -> impl Iterator<Item = &'a Instruction> {
    instructions.iter().filter(move |i| i.is(name))
}

fn has(instructions: &[Instruction], name: &str) -> bool {
    named(instructions, name).next().is_some()
}

/// Drop `--flag` tokens (e.g. `--chown=node`, `--platform=...`).
fn without_flags(tokens: Vec<String>) -> Vec<String> {
    tokens.into_iter().filter(|t| !t.starts_with("--")).collect()
}

fn check_no_root_user(instructions: &[Instruction]) -> bool {
    match named(instructions, "USER").last() {
        None => false,
        Some(user) => {
            let name = user.text();
            let name = name.trim();
            name != "root" && name != "0"
        }
    }
}

fn check_no_sudo_install(instructions: &[Instruction]) -> bool {
    !named(instructions, "RUN").any(|i| SUDO_INSTALL.is_match(&i.text()))
}

/// The image reference of a FROM instruction, without flags or stage alias.
pub(crate) fn base_image_ref(from: &Instruction) -> String {
    let text = from.text();
    let stripped = STAGE_ALIAS.replace(&text, "");
    without_flags(
        stripped
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    )
    .into_iter()
    .next()
    .unwrap_or_default()
}

fn check_specific_base_image(instructions: &[Instruction]) -> bool {
    named(instructions, "FROM").all(|from| {
        let image = base_image_ref(from);
        image.contains(':') && !LATEST_TAG.is_match(&image)
    })
}

fn check_has_healthcheck(instructions: &[Instruction]) -> bool {
    has(instructions, "HEALTHCHECK")
}

/// Whether a COPY copies the entire build context.
///
/// True when some source is `.` or `./`, no source is a glob, and the copy
/// does not come from another stage. Only sources count: a `.` destination
/// (`COPY requirements.txt .`, `COPY src .`) is not a whole-context copy.
pub(crate) fn is_whole_context_copy(copy: &Instruction) -> bool {
    let tokens = copy.args.tokens();
    if tokens.iter().any(|t| t.starts_with("--from")) {
        return false;
    }
    let tokens = without_flags(tokens);
    if tokens.len() < 2 {
        return false;
    }
    let sources = &tokens[..tokens.len() - 1];
    if sources.iter().any(|s| s.contains('*')) {
        return false;
    }
    sources.iter().any(|s| s == "." || s == "./")
}

fn check_layer_caching(instructions: &[Instruction]) -> bool {
    let whole_context = instructions
        .iter()
        .position(|i| i.is("COPY") && is_whole_context_copy(i));
    let manifest = instructions
        .iter()
        .position(|i| i.is("COPY") && PACKAGE_MANIFEST.is_match(&i.text()));

    match (manifest, whole_context) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(m), Some(w)) => m < w,
    }
}

fn check_no_secrets(instructions: &[Instruction]) -> bool {
    !instructions
        .iter()
        .filter(|i| i.is("ENV") || i.is("ARG"))
        .any(|i| {
            let text = i.text();
            SECRET_PATTERNS.iter().any(|p| p.is_match(&text))
        })
}

fn check_multi_stage(instructions: &[Instruction]) -> bool {
    if instructions.len() < MULTI_STAGE_MIN_INSTRUCTIONS {
        return true;
    }
    named(instructions, "FROM").count() > 1
}

fn check_has_expose(instructions: &[Instruction]) -> bool {
    if !has(instructions, "CMD") && !has(instructions, "ENTRYPOINT") {
        return true;
    }
    has(instructions, "EXPOSE")
}

fn check_workdir_set(instructions: &[Instruction]) -> bool {
    has(instructions, "WORKDIR")
}

fn check_no_add_remote_url(instructions: &[Instruction]) -> bool {
    !named(instructions, "ADD").any(|add| {
        let tokens = without_flags(add.args.tokens());
        let sources = &tokens[..tokens.len().saturating_sub(1)];
        sources
            .iter()
            .any(|s| s.starts_with("http://") || s.starts_with("https://"))
    })
}

fn check_apt_cache_cleanup(instructions: &[Instruction]) -> bool {
    !named(instructions, "RUN").any(|run| {
        let text = run.text();
        APT_INSTALL.is_match(&text) && !APT_LISTS_CLEANUP.is_match(&text)
    })
}
