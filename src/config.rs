//! Kernel configuration.
//!
//! # Load order
//!
//! 1. Default values
//! 2. TOML file (`--config`)
//! 3. Environment variables (`METROII_*`)
//! 4. Command-line flags ([`ConfigOverrides`])
//!
//! Each layer overrides the previous one. [`KernelConfig::validate`] runs
//! once all layers are applied; nothing is built from an invalid config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coordinator::{HaltPolicy, DEFAULT_MAX_ROUNDS};
use crate::error::ConfigError;
use crate::scheduler::UntimedPolicy;
use crate::solver::DEFAULT_CAPACITY;
use crate::time::Resolution;

/// Which resolver the coordinator runs once per round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    /// Rendezvous constraints only.
    #[default]
    Constraint,
    /// Timestamps only.
    Time,
    /// Earliest time first, then constraints among those.
    TimeThenConstraint,
}

impl std::str::FromStr for ResolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constraint" => Ok(ResolverKind::Constraint),
            "time" => Ok(ResolverKind::Time),
            "time_then_constraint" | "time-then-constraint" => Ok(ResolverKind::TimeThenConstraint),
            other => Err(format!("unknown resolver '{}'", other)),
        }
    }
}

/// Every knob of a kernel session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Constraint mapping file; `None` means no constraints.
    pub mapping: Option<PathBuf>,
    /// Log every resolved event at `info` level.
    pub print_trace: bool,
    /// Base period of the demo's periodic actors.
    pub period: u64,
    /// Round bound per run; `0` means unbounded.
    pub max_rounds: u64,
    /// Distinct constrained event names the solver can hold.
    pub solver_capacity: usize,
    /// Time scheduler resolution in seconds per tick.
    pub resolution: f64,
    pub resolver: ResolverKind,
    pub untimed: UntimedPolicy,
    pub halt: HaltPolicy,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            mapping: None,
            print_trace: false,
            period: 10,
            max_rounds: DEFAULT_MAX_ROUNDS,
            solver_capacity: DEFAULT_CAPACITY,
            resolution: Resolution::default().seconds(),
            resolver: ResolverKind::default(),
            untimed: UntimedPolicy::default(),
            halt: HaltPolicy::default(),
        }
    }
}

impl KernelConfig {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check values that cannot be expressed in the types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period == 0 {
            return Err(ConfigError::Invalid("period must be at least 1".into()));
        }
        if self.solver_capacity < 2 {
            return Err(ConfigError::Invalid(format!(
                "solver_capacity {} leaves no usable event ids",
                self.solver_capacity
            )));
        }
        self.time_resolution()?;
        Ok(())
    }

    pub fn time_resolution(&self) -> Result<Resolution, ConfigError> {
        Resolution::new(self.resolution).map_err(|_| ConfigError::InvalidResolution(self.resolution))
    }

    /// The round bound as the coordinator takes it.
    pub fn round_limit(&self) -> Option<u64> {
        (self.max_rounds > 0).then_some(self.max_rounds)
    }

    /// Apply `METROII_*` overrides from the process environment.
    pub fn apply_env_vars(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply `METROII_*` overrides read through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("METROII_MAPPING") {
            self.mapping = (!val.is_empty()).then(|| PathBuf::from(val));
        }
        if let Some(val) = lookup("METROII_PRINT_TRACE") {
            self.print_trace = parse_bool(&val)
                .ok_or_else(|| ConfigError::invalid_env_var("METROII_PRINT_TRACE", "expected bool"))?;
        }
        env_parse(&lookup, "METROII_PERIOD", &mut self.period)?;
        env_parse(&lookup, "METROII_MAX_ROUNDS", &mut self.max_rounds)?;
        env_parse(&lookup, "METROII_SOLVER_CAPACITY", &mut self.solver_capacity)?;
        env_parse(&lookup, "METROII_RESOLUTION", &mut self.resolution)?;
        env_parse(&lookup, "METROII_RESOLVER", &mut self.resolver)?;
        if let Some(val) = lookup("METROII_UNTIMED") {
            self.untimed = match val.as_str() {
                "after_timed" => UntimedPolicy::AfterTimed,
                "before_timed" => UntimedPolicy::BeforeTimed,
                _ => {
                    return Err(ConfigError::invalid_env_var(
                        "METROII_UNTIMED",
                        "expected after_timed or before_timed",
                    ))
                }
            };
        }
        if let Some(val) = lookup("METROII_HALT") {
            self.halt = match val.as_str() {
                "remove" => HaltPolicy::Remove,
                "keep" => HaltPolicy::Keep,
                _ => return Err(ConfigError::invalid_env_var("METROII_HALT", "expected remove or keep")),
            };
        }
        Ok(())
    }
}

fn env_parse<F, T>(lookup: &F, name: &str, field: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(val) = lookup(name) {
        *field = val
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid_env_var(name, &e.to_string()))?;
    }
    Ok(())
}

/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off".
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ── Loader ────────────────────────────────────────────────────────────

/// Layered configuration loader.
///
/// ```ignore
/// let config = ConfigLoader::new()
///     .with_file("kernel.toml")
///     .skip_env_vars()
///     .load()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    skip_env: bool,
    overrides: ConfigOverrides,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this TOML file. Unlike the other layers it must exist.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Merge every layer and validate the result.
    pub fn load(&self) -> Result<KernelConfig, ConfigError> {
        let mut config = match &self.file {
            Some(path) => {
                let config = KernelConfig::from_file(path)?;
                debug!(path = %path.display(), "loaded config file");
                config
            }
            None => KernelConfig::default(),
        };
        if !self.skip_env {
            config.apply_env_vars()?;
        }
        self.overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

// ── Overrides ─────────────────────────────────────────────────────────

/// Command-line overrides, applied last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub mapping: Option<PathBuf>,
    pub print_trace: Option<bool>,
    pub period: Option<u64>,
    pub max_rounds: Option<u64>,
    pub resolver: Option<ResolverKind>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut KernelConfig) {
        if let Some(path) = &self.mapping {
            config.mapping = Some(path.clone());
        }
        if let Some(v) = self.print_trace {
            config.print_trace = v;
        }
        if let Some(v) = self.period {
            config.period = v;
        }
        if let Some(v) = self.max_rounds {
            config.max_rounds = v;
        }
        if let Some(v) = self.resolver {
            config.resolver = v;
        }
    }
}
