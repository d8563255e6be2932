//! Configuration loading for Arbor.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.arbor/config.toml`)
//! 3. User config (`~/.arbor/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. Trees run with sensible defaults when no
//! config exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::distribution::{DistributionSpec, IntegerDistribution};
use crate::error::{ArborError, FailOpen, Result};

/// Main configuration struct for Arbor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// How a driver steps a tree.
    pub driver: DriverConfig,
    /// Repeat decorator defaults.
    pub repeat: RepeatConfig,
    /// Execution trace settings.
    pub trace: TraceConfig,
}

/// How a driver steps a tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    /// Upper bound on ticks per run.
    pub max_ticks: u64,
    /// Stop as soon as the root reaches a terminal status.
    pub stop_on_terminal: bool,
}

/// Minimum valid max_ticks value.
pub const MIN_MAX_TICKS: u64 = 1;

impl DriverConfig {
    /// Check if max_ticks is valid (must be >= 1).
    pub fn is_valid_max_ticks(value: u64) -> bool {
        value >= MIN_MAX_TICKS
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_ticks: 100,
            stop_on_terminal: true,
        }
    }
}

/// Repeat decorator defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepeatConfig {
    /// Distribution notation used when a repeat is built without one.
    pub default_times: String,
}

impl RepeatConfig {
    /// Parse the default distribution notation.
    pub fn spec(&self) -> Result<DistributionSpec> {
        self.default_times.parse()
    }

    /// Build the default distribution.
    pub fn distribution(&self) -> Result<Arc<dyn IntegerDistribution>> {
        self.spec()?.build()
    }
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            default_times: "constant,-1".to_string(),
        }
    }
}

/// Execution trace settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TraceConfig {
    /// Whether trees record trace events.
    pub enabled: bool,
    /// Maximum events kept; the oldest are dropped first.
    pub capacity: usize,
}

/// Minimum valid trace capacity.
pub const MIN_TRACE_CAPACITY: usize = 1;

impl TraceConfig {
    /// Check if a capacity is valid (must be >= 1).
    pub fn is_valid_capacity(value: usize) -> bool {
        value >= MIN_TRACE_CAPACITY
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1024,
        }
    }
}

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// Precedence (highest to lowest):
    /// 1. Environment variables
    /// 2. Project config (`.arbor/config.toml` in cwd or an ancestor)
    /// 3. User config (`~/.arbor/config.toml`)
    /// 4. Defaults
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Load user config from `$ARBOR_HOME/config.toml`.
    fn load_user_config() -> Option<Config> {
        let path = arbor_home()?.join("config.toml");
        Self::load_layer(&path)
    }

    /// Load project config from `.arbor/config.toml` under the project root.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        let path = project_arbor_dir(cwd).join("config.toml");
        Self::load_layer(&path)
    }

    /// Load one layer; a missing file is silent, a broken one is logged.
    fn load_layer(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring config layer: {}", e);
                None
            }
        }
    }

    /// Load and validate config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| ArborError::storage(path, e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ArborError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its valid range.
    pub fn validate(&self) -> Result<()> {
        if !DriverConfig::is_valid_max_ticks(self.driver.max_ticks) {
            return Err(ArborError::configuration(format!(
                "driver.max_ticks must be >= {}, got {}",
                MIN_MAX_TICKS, self.driver.max_ticks
            )));
        }
        if !TraceConfig::is_valid_capacity(self.trace.capacity) {
            return Err(ArborError::configuration(format!(
                "trace.capacity must be >= {}, got {}",
                MIN_TRACE_CAPACITY, self.trace.capacity
            )));
        }
        if !DistributionSpec::is_valid(&self.repeat.default_times) {
            return Err(ArborError::configuration(format!(
                "repeat.default_times '{}' is not a valid distribution",
                self.repeat.default_times
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // ARBOR_MAX_TICKS
        if let Ok(val) = env::var("ARBOR_MAX_TICKS") {
            match val.parse::<u64>() {
                Ok(n) if DriverConfig::is_valid_max_ticks(n) => self.driver.max_ticks = n,
                _ => tracing::warn!(
                    "Invalid ARBOR_MAX_TICKS value '{}'. Must be an integer >= {}. Using '{}'.",
                    val,
                    MIN_MAX_TICKS,
                    self.driver.max_ticks
                ),
            }
        }

        // ARBOR_STOP_ON_TERMINAL
        if let Ok(val) = env::var("ARBOR_STOP_ON_TERMINAL") {
            self.driver.stop_on_terminal = val == "true" || val == "1";
        }

        // ARBOR_REPEAT_TIMES
        if let Ok(val) = env::var("ARBOR_REPEAT_TIMES") {
            if DistributionSpec::is_valid(&val) {
                self.repeat.default_times = val;
            } else {
                tracing::warn!(
                    "Invalid ARBOR_REPEAT_TIMES value '{}'. Using '{}'.",
                    val,
                    self.repeat.default_times
                );
            }
        }

        // ARBOR_TRACE_ENABLED
        if let Ok(val) = env::var("ARBOR_TRACE_ENABLED") {
            self.trace.enabled = val == "true" || val == "1";
        }

        // ARBOR_TRACE_CAPACITY
        if let Ok(val) = env::var("ARBOR_TRACE_CAPACITY") {
            match val.parse::<usize>() {
                Ok(n) if TraceConfig::is_valid_capacity(n) => self.trace.capacity = n,
                _ => tracing::warn!(
                    "Invalid ARBOR_TRACE_CAPACITY '{}'. Must be an integer >= {}. Using '{}'.",
                    val,
                    MIN_TRACE_CAPACITY,
                    self.trace.capacity
                ),
            }
        }
    }

    /// Merge another config into this one.
    ///
    /// The `other` config takes precedence, field by field: every value in
    /// `other` that differs from the default replaces the value in `self`.
    ///
    /// # Limitation
    ///
    /// A layer cannot set a value back to its default to override a
    /// non-default value from a lower layer, since "not set in file" and
    /// "explicitly set to the default" deserialize identically.
    fn merge(mut self, other: Config) -> Self {
        let default_driver = DriverConfig::default();
        if other.driver.max_ticks != default_driver.max_ticks {
            self.driver.max_ticks = other.driver.max_ticks;
        }
        if other.driver.stop_on_terminal != default_driver.stop_on_terminal {
            self.driver.stop_on_terminal = other.driver.stop_on_terminal;
        }

        if other.repeat.default_times != RepeatConfig::default().default_times {
            self.repeat.default_times = other.repeat.default_times;
        }

        let default_trace = TraceConfig::default();
        if other.trace.enabled != default_trace.enabled {
            self.trace.enabled = other.trace.enabled;
        }
        if other.trace.capacity != default_trace.capacity {
            self.trace.capacity = other.trace.capacity;
        }

        self
    }

    /// Load config with fail-open behavior.
    ///
    /// If the merged result does not validate, returns defaults.
    pub fn load_fail_open() -> Self {
        let config = Self::load();
        let result = config.validate().map(|()| config);
        result.fail_open_default("loading config")
    }

    /// Save configuration to the project config file.
    ///
    /// Writes `.arbor/config.toml` under `cwd`, creating the directory if
    /// needed. The file is written to a temporary path and renamed into
    /// place.
    pub fn save_project(&self, cwd: &Path) -> Result<()> {
        self.validate()?;
        let arbor_dir = cwd.join(".arbor");

        if !arbor_dir.exists() {
            fs::create_dir_all(&arbor_dir).map_err(|e| ArborError::storage(&arbor_dir, e))?;
        }

        let config_path = arbor_dir.join("config.toml");
        let content = toml::to_string_pretty(self)
            .map_err(|e| ArborError::configuration(e.to_string()))?;

        let temp_path = arbor_dir.join(".config.toml.tmp");
        fs::write(&temp_path, &content).map_err(|e| ArborError::storage(&temp_path, e))?;

        let file = fs::File::open(&temp_path).map_err(|e| ArborError::storage(&temp_path, e))?;
        file.sync_all().map_err(|e| ArborError::storage(&temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &config_path).map_err(|e| ArborError::storage(&config_path, e))?;

        Ok(())
    }

    /// List changed values between two configs as (key, old, new).
    pub fn diff(&self, other: &Config) -> Vec<(String, String, String)> {
        let mut changes = Vec::new();
        let mut push = |key: &str, old: String, new: String| {
            if old != new {
                changes.push((key.to_string(), old, new));
            }
        };

        push(
            "driver.max_ticks",
            self.driver.max_ticks.to_string(),
            other.driver.max_ticks.to_string(),
        );
        push(
            "driver.stop_on_terminal",
            self.driver.stop_on_terminal.to_string(),
            other.driver.stop_on_terminal.to_string(),
        );
        push(
            "repeat.default_times",
            self.repeat.default_times.clone(),
            other.repeat.default_times.clone(),
        );
        push(
            "trace.enabled",
            self.trace.enabled.to_string(),
            other.trace.enabled.to_string(),
        );
        push(
            "trace.capacity",
            self.trace.capacity.to_string(),
            other.trace.capacity.to_string(),
        );

        changes
    }
}

/// Get the Arbor home directory.
///
/// Checks the `ARBOR_HOME` environment variable first, then falls back to
/// `~/.arbor`. An empty `ARBOR_HOME` is ignored.
pub fn arbor_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("ARBOR_HOME") {
        if home.is_empty() {
            tracing::warn!("ARBOR_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("ARBOR_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".arbor"));
    }

    let fallback = env::temp_dir().join("arbor");
    tracing::warn!("HOME not set, using fallback location: {}", fallback.display());
    Some(fallback)
}

/// Find the project root: the nearest ancestor of `cwd` holding an
/// `.arbor/` directory, or `cwd` itself.
pub fn find_project_root(cwd: &Path) -> PathBuf {
    cwd.ancestors()
        .find(|ancestor| ancestor.join(".arbor").is_dir())
        .unwrap_or(cwd)
        .to_path_buf()
}

/// Get the project `.arbor/` directory for a working directory.
pub fn project_arbor_dir(cwd: &Path) -> PathBuf {
    find_project_root(cwd).join(".arbor")
}
