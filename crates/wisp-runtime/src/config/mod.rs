//! Configuration management with hierarchical layering.
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌─────────────────────────────────────────┐
//! │  1. Environment Variables (WISP_*)      │  Runtime override
//! ├─────────────────────────────────────────┤
//! │  2. Project Config (.wisp/config.toml)  │  World-specific
//! ├─────────────────────────────────────────┤
//! │  3. Global Config (~/.wisp/config.toml) │  User defaults
//! ├─────────────────────────────────────────┤
//! │  4. Default Values (compile-time)       │  Fallback
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `WISP_MAX_EMIT_DEPTH` | `dispatch.max_emit_depth` | usize |
//! | `WISP_SLOW_INVOCATION_MS` | `dispatch.slow_invocation_ms` | u64 |
//! | `WISP_MIN_INTERVAL_MS` | `timers.min_interval_ms` | u64 |
//! | `WISP_MAX_INSTRUCTIONS` | `scripts.max_instructions` | u64 |
//! | `WISP_SOURCE_ROOT` | `sources.root` | PathBuf |
//! | `WISP_SNAPSHOT` | `persistence.snapshot` | PathBuf |
//! | `WISP_AVATAR` | `console.avatar` | String |
//!
//! # Example Configuration
//!
//! ```toml
//! [dispatch]
//! max_emit_depth = 32
//! slow_invocation_ms = 100
//! stats_capacity = 64
//!
//! [timers]
//! min_interval_ms = 1000
//!
//! [scripts]
//! max_instructions = 0
//! memory_limit_mb = 64
//!
//! [sources]
//! root = "scripts"
//!
//! [persistence]
//! snapshot = ".wisp/world.json"
//!
//! [console]
//! avatar = "wizard"
//! avatar_source = "/avatar.lua"
//! history_file = "~/.wisp/history"   # optional
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{
    ConsoleConfig, DispatchConfig, PersistenceConfig, ScriptsConfig, SourcesConfig, TimersConfig,
    WispConfig,
};

/// Default global config directory.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".wisp")
}

/// Default global config file path.
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".wisp";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";
