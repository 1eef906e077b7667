//! Quorum settings: loader batch size, page bounds, throttling, session
//! timeout, bus buffers and role matrix overrides.
//!
//! ```text
//! Highest priority first:
//!
//! ┌───────────────────────────────────────────┐
//! │  1. Environment Variables (QUORUM_*)      │  Runtime override
//! ├───────────────────────────────────────────┤
//! │  2. Project Config (.quorum/config.toml)  │  Deployment-specific
//! ├───────────────────────────────────────────┤
//! │  3. Global Config (~/.quorum/config.toml) │  Operator defaults
//! ├───────────────────────────────────────────┤
//! │  4. Default Values (compile-time)         │  Fallback
//! └───────────────────────────────────────────┘
//! ```
//!
//! The result is immutable for the life of the process. The role matrix
//! derived from it is built once and injected into every gate.
//!
//! # Usage
//!
//! ```no_run
//! use quorum_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_project_root("/srv/quorum")
//!     .load()?;
//! let matrix = config.role_matrix()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # `QUORUM_*` overrides
//!
//! | Variable | Field | Parsed as |
//! |---|---|---|
//! | `QUORUM_RATE_LIMIT` | `rate_limit.enabled` | bool |
//! | `QUORUM_RATE_LIMIT_CAPACITY` | `rate_limit.capacity` | f64 |
//! | `QUORUM_RATE_LIMIT_REFILL` | `rate_limit.refill_per_sec` | f64 |
//! | `QUORUM_MAX_BATCH_SIZE` | `loader.max_batch_size` | usize |
//! | `QUORUM_MAX_PAGE_SIZE` | `pagination.max_limit` | u32 |
//! | `QUORUM_SESSION_TIMEOUT_SECS` | `sessions.timeout_secs` | u64 |
//! | `QUORUM_BUS_BUFFER` | `bus.buffer` | usize |
//!
//! # Sample `config.toml`
//!
//! ```toml
//! # ~/.quorum/config.toml
//!
//! [loader]
//! max_batch_size = 100
//!
//! [pagination]
//! default_limit = 20
//! max_limit = 100
//!
//! [rate_limit]
//! enabled = true
//! capacity = 120.0
//! refill_per_sec = 2.0
//!
//! [sessions]
//! timeout_secs = 1800
//!
//! [bus]
//! buffer = 256
//!
//! [roles]
//! ANALYST = ["response:read", "analytics:read", "analysis:write"]
//! ```

mod error;
mod loader;
mod types;

use std::path::PathBuf;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{
    BusConfig, LoaderConfig, PaginationConfig, QuorumConfig, RateLimitConfig, SessionConfig,
};

pub const PROJECT_CONFIG_DIR: &str = ".quorum";
pub const PROJECT_CONFIG_FILE: &str = "config.toml";

/// `~/.quorum`, or `./.quorum` when there is no home directory.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir().map_or_else(|| PathBuf::from(PROJECT_CONFIG_DIR), |home| home.join(PROJECT_CONFIG_DIR))
}

/// The global layer read when no `--config` path is given.
#[must_use]
pub fn default_config_path() -> PathBuf {
    default_config_dir().join(PROJECT_CONFIG_FILE)
}
