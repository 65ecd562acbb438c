//! Configuration for containercheck.
//!
//! Loaded from YAML. Every field has a default, so an empty file is valid.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ai::Focus;

/// File names searched in the working directory, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["containercheck.yaml", ".containercheck.yaml"];

/// Commented default configuration written by `containercheck init`.
pub const DEFAULT_TEMPLATE: &str = include_str!("templates/default.yaml");

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    /// Pass manifests whose kind has no registered schema instead of warning.
    #[serde(default)]
    pub allow_unknown_resources: bool,
    #[serde(default = "default_true")]
    pub enable_external_linter: bool,
    /// Minimum score for `lint` to exit successfully.
    #[serde(default = "default_min_score")]
    pub min_score: u8,
    /// Glob patterns for paths to skip during directory scans (e.g. "**/vendor/**").
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    #[serde(default)]
    pub linter: LinterConfig,
    #[serde(default)]
    pub enhancement: EnhancementConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            allow_unknown_resources: false,
            enable_external_linter: true,
            min_score: default_min_score(),
            excluded_paths: Vec::new(),
            linter: LinterConfig::default(),
            enhancement: EnhancementConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

/// External Dockerfile linter invocation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LinterConfig {
    #[serde(default = "default_linter_command")]
    pub command: String,
    #[serde(default = "default_linter_args")]
    pub args: Vec<String>,
}

impl Default for LinterConfig {
    fn default() -> Self {
        Self {
            command: default_linter_command(),
            args: default_linter_args(),
        }
    }
}

/// Knowledge-assisted rewrite settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnhancementConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Reports scoring at or above this are left alone.
    #[serde(default = "default_enhancement_threshold")]
    pub threshold: u8,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: default_enhancement_threshold(),
        }
    }
}

/// Sampling subsystem settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Candidates sampled per validation. The best heuristic score wins.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// JSON repair attempts on malformed model output.
    #[serde(default = "default_repair_attempts")]
    pub repair_attempts: usize,
    #[serde(default)]
    pub focus: Focus,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_ms: default_timeout_ms(),
            max_candidates: default_max_candidates(),
            repair_attempts: default_repair_attempts(),
            focus: Focus::default(),
        }
    }
}

impl AiConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "1".to_string()
}

fn default_min_score() -> u8 {
    60
}

fn default_linter_command() -> String {
    "hadolint".to_string()
}

fn default_linter_args() -> Vec<String> {
    vec!["--format".to_string(), "json".to_string(), "-".to_string()]
}

fn default_enhancement_threshold() -> u8 {
    90
}

fn default_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_max_candidates() -> usize {
    1
}

fn default_repair_attempts() -> usize {
    1
}

impl Config {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Locate and load the configuration.
    ///
    /// An explicit path must exist. Otherwise the working directory and then
    /// the user config directory are searched; defaults apply if nothing is found.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            let config = Self::parse_file(path)
                .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", path.display(), e))?;
            validate(&config)?;
            return Ok((config, Some(path.to_path_buf())));
        }

        let candidates = CONFIG_FILE_NAMES
            .iter()
            .map(|name| cwd.join(name))
            .chain(user_config_path());

        for path in candidates {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "loading config");
                let config = Self::parse_file(&path)
                    .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", path.display(), e))?;
                validate(&config)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((Self::default(), None))
    }

    /// Check if a path should be excluded based on excluded_paths patterns.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();
        self.excluded_paths.iter().any(|pattern| {
            globset::Glob::new(pattern)
                .map(|glob| glob.compile_matcher().is_match(&*path_str))
                .unwrap_or(false)
        })
    }
}

/// `<user config dir>/config.yaml`, e.g. `~/.config/containercheck/config.yaml`.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "containercheck")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
}

/// Validate a configuration for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.min_score > 100 {
        anyhow::bail!("min_score must be between 0 and 100, got {}", config.min_score);
    }
    if config.enhancement.threshold > 100 {
        anyhow::bail!(
            "enhancement.threshold must be between 0 and 100, got {}",
            config.enhancement.threshold
        );
    }
    if config.ai.max_candidates == 0 {
        anyhow::bail!("ai.max_candidates must be at least 1");
    }
    if config.linter.command.trim().is_empty() {
        anyhow::bail!("linter.command must not be empty");
    }

    for pattern in &config.excluded_paths {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid excluded_paths pattern {:?}: {}", pattern, e))?;
    }

    Ok(())
}
