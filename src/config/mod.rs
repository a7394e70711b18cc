//! Configuration loading.
//!
//! Loads warden configuration from `$WARDEN_CONFIG_PATH` or
//! `~/.warden/config.toml`. Environment variables override file values;
//! file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Command classification settings (`[classifier]`).
    pub classifier: ClassifierConfig,
    /// Sub-agent delegation settings (`[delegation]`).
    pub delegation: DelegationConfig,
    /// Workflow guard thresholds (`[guards]`).
    pub guards: GuardsConfig,
    /// Logging settings (`[logging]`).
    pub logging: LoggingConfig,
}

impl WardenConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// If the file does not exist, defaults are used.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        let mut config = match path {
            Some(path) => Self::load_from_file(&path)?,
            None => {
                tracing::debug!("no home directory, using default config");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file only, no env overrides. A missing file yields
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("invalid config file {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    /// Resolve the config path using a custom env resolver.
    ///
    /// Checks `$WARDEN_CONFIG_PATH` first, then `~/.warden/config.toml`.
    pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
        if let Some(p) = env("WARDEN_CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".warden").join("config.toml"))
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function so tests never touch the process env.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("WARDEN_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env("WARDEN_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(v));
        }

        if let Some(v) = env("WARDEN_AMBIGUITY_THRESHOLD") {
            match v.parse() {
                Ok(n) => self.guards.ambiguity_threshold = n,
                Err(_) => warn_invalid("WARDEN_AMBIGUITY_THRESHOLD", &v),
            }
        }
        if let Some(v) = env("WARDEN_MIN_ROUTING_CONFIDENCE") {
            match v.parse() {
                Ok(n) => self.guards.min_routing_confidence = n,
                Err(_) => warn_invalid("WARDEN_MIN_ROUTING_CONFIDENCE", &v),
            }
        }
        if let Some(v) = env("WARDEN_CACHE_CAPACITY") {
            match v.parse() {
                Ok(n) => self.classifier.cache_capacity = n,
                Err(_) => warn_invalid("WARDEN_CACHE_CAPACITY", &v),
            }
        }

        if let Some(v) = env("WARDEN_KNOWN_AGENTS") {
            let agents: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_owned)
                .collect();
            if agents.is_empty() {
                warn_invalid("WARDEN_KNOWN_AGENTS", &v);
            } else {
                self.delegation.known_agents = agents;
            }
        }
    }

    /// Reject configurations the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error for thresholds outside `[0, 1]`, a zero cache
    /// capacity, or an empty agent set.
    pub fn validate(&self) -> Result<()> {
        check_unit_interval("guards.ambiguity_threshold", self.guards.ambiguity_threshold)?;
        check_unit_interval(
            "guards.min_routing_confidence",
            self.guards.min_routing_confidence,
        )?;
        if self.classifier.cache_capacity == 0 {
            anyhow::bail!("classifier.cache_capacity must be at least 1");
        }
        if self.delegation.known_agents.is_empty() {
            anyhow::bail!("delegation.known_agents must list at least one agent");
        }
        Ok(())
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: WardenConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }
}

fn warn_invalid(var: &str, value: &str) {
    tracing::warn!(var, value, "ignoring invalid env override");
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        anyhow::bail!("{name} must be between 0 and 1, got {value}")
    }
}

// ── Classifier config ───────────────────────────────────────────

/// Command classification settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Capacity of the T0 fast-path cache.
    pub cache_capacity: usize,
    /// CLIs whose output may not be piped, redirected or chained.
    pub cloud_clis: Vec<String>,
    /// Extra regexes classified as blocked (T3).
    pub extra_blocked: Vec<String>,
    /// Extra regexes classified as always safe (T0).
    pub extra_safe: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 256,
            cloud_clis: [
                "gcloud",
                "gsutil",
                "bq",
                "aws",
                "az",
                "kubectl",
                "helm",
                "terraform",
                "terragrunt",
                "flux",
                "eksctl",
                "doctl",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
            extra_blocked: Vec::new(),
            extra_safe: Vec::new(),
        }
    }
}

// ── Delegation config ───────────────────────────────────────────

/// Sub-agent delegation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// Agent identifiers that may receive delegations.
    pub known_agents: Vec<String>,
    /// Extra case-insensitive regexes that mark a prompt as high risk.
    pub extra_risk_keywords: Vec<String>,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            known_agents: [
                "terraform-architect",
                "gitops-operator",
                "cloud-troubleshooter",
                "devops-developer",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
            extra_risk_keywords: Vec::new(),
        }
    }
}

// ── Guards config ───────────────────────────────────────────────

/// Workflow guard thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardsConfig {
    /// Maximum ambiguity score allowed to leave Clarification unresolved.
    pub ambiguity_threshold: f64,
    /// Minimum routing confidence to leave Routing.
    pub min_routing_confidence: f64,
    /// Fields a realization package needs before approval.
    pub required_plan_fields: Vec<String>,
}

impl Default for GuardsConfig {
    fn default() -> Self {
        Self {
            ambiguity_threshold: 0.3,
            min_routing_confidence: 0.5,
            required_plan_fields: vec![
                "summary".to_owned(),
                "changes".to_owned(),
                "validation".to_owned(),
            ],
        }
    }
}

// ── Logging config ──────────────────────────────────────────────

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for JSON log files; stderr only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            dir: None,
        }
    }
}
