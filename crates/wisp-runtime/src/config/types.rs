//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure.
///
/// ```
/// use wisp_runtime::config::WispConfig;
///
/// let config = WispConfig::default();
/// assert_eq!(config.timers.min_interval_ms, 1_000);
/// assert_eq!(config.dispatch.max_emit_depth, 32);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WispConfig {
    pub dispatch: DispatchConfig,
    pub timers: TimersConfig,
    pub scripts: ScriptsConfig,
    pub sources: SourcesConfig,
    pub persistence: PersistenceConfig,
    pub console: ConsoleConfig,
}

impl WispConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they
    /// differ from the default.
    pub fn merge(&mut self, other: &Self) {
        self.dispatch.merge(&other.dispatch);
        self.timers.merge(&other.timers);
        self.scripts.merge(&other.scripts);
        self.sources.merge(&other.sources);
        self.persistence.merge(&other.persistence);
        self.console.merge(&other.console);
    }
}

/// Event dispatch limits and statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Cascading emits deeper than this are dropped.
    pub max_emit_depth: usize,

    /// Invocations slower than this are recorded as slow.
    pub slow_invocation_ms: u64,

    /// How many slow invocations and errors the stats surface keeps.
    pub stats_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_emit_depth: 32,
            slow_invocation_ms: 100,
            stats_capacity: 64,
        }
    }
}

impl DispatchConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.max_emit_depth != default.max_emit_depth {
            self.max_emit_depth = other.max_emit_depth;
        }
        if other.slow_invocation_ms != default.slow_invocation_ms {
            self.slow_invocation_ms = other.slow_invocation_ms;
        }
        if other.stats_capacity != default.stats_capacity {
            self.stats_capacity = other.stats_capacity;
        }
    }
}

/// Timer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimersConfig {
    /// Floor applied to every `setInterval` period.
    pub min_interval_ms: u64,
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1_000,
        }
    }
}

impl TimersConfig {
    fn merge(&mut self, other: &Self) {
        if other.min_interval_ms != Self::default().min_interval_ms {
            self.min_interval_ms = other.min_interval_ms;
        }
    }
}

/// Per-invocation sandbox limits for the script engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScriptsConfig {
    /// VM instructions one invocation may execute before it is aborted.
    /// 0 (the default) never interrupts a running script; slow ones are
    /// only recorded in stats.
    pub max_instructions: u64,

    /// Memory one VM may allocate, in megabytes. 0 disables the limit.
    pub memory_limit_mb: usize,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            max_instructions: 0,
            memory_limit_mb: 64,
        }
    }
}

impl ScriptsConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.max_instructions != default.max_instructions {
            self.max_instructions = other.max_instructions;
        }
        if other.memory_limit_mb != default.memory_limit_mb {
            self.memory_limit_mb = other.memory_limit_mb;
        }
    }
}

/// Script source location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    /// Directory that source path `/` maps to.
    pub root: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("scripts"),
        }
    }
}

impl SourcesConfig {
    fn merge(&mut self, other: &Self) {
        if other.root != Self::default().root {
            self.root = other.root.clone();
        }
    }
}

/// World snapshot location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersistenceConfig {
    pub snapshot: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot: PathBuf::from(".wisp/world.json"),
        }
    }
}

impl PersistenceConfig {
    fn merge(&mut self, other: &Self) {
        if other.snapshot != Self::default().snapshot {
            self.snapshot = other.snapshot.clone();
        }
    }
}

/// The local console avatar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Object id of the console's avatar.
    pub avatar: String,

    /// Source path the avatar runs when it is first created.
    pub avatar_source: String,

    /// Line editor history. `None` means `~/.wisp/history`.
    pub history_file: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            avatar: "wizard".to_string(),
            avatar_source: "/avatar.lua".to_string(),
            history_file: None,
        }
    }
}

impl ConsoleConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.avatar != default.avatar {
            self.avatar = other.avatar.clone();
        }
        if other.avatar_source != default.avatar_source {
            self.avatar_source = other.avatar_source.clone();
        }
        if other.history_file.is_some() {
            self.history_file = other.history_file.clone();
        }
    }

    /// Returns the history file, falling back to `~/.wisp/history`.
    #[must_use]
    pub fn history_file_or_default(&self) -> PathBuf {
        self.history_file.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".wisp")
                .join("history")
        })
    }
}
