//! Layered configuration loading.
//!
//! # Layers
//!
//! ```text
//! QuorumConfig::default()
//!   ← global   ~/.quorum/config.toml (or with_global_config)
//!   ← project  <root>/.quorum/config.toml
//!   ← env      QUORUM_* variables
//! ```
//!
//! Later layers win field by field. A file that does not exist is skipped;
//! a file that exists but does not parse is an error. The merged `[roles]`
//! table is turned into a [`RoleMatrix`](quorum_auth::RoleMatrix) before
//! `load` returns, so a bad override fails at startup.

use super::{default_config_path, ConfigError, QuorumConfig, PROJECT_CONFIG_DIR, PROJECT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// One `QUORUM_*` variable and how it lands in the config.
struct EnvOverride {
    var: &'static str,
    expected: &'static str,
    apply: fn(&mut QuorumConfig, &str) -> Option<()>,
}

fn set<T: FromStr>(slot: &mut T, raw: &str) -> Option<()> {
    *slot = raw.trim().parse().ok()?;
    Some(())
}

const ENV_OVERRIDES: &[EnvOverride] = &[
    EnvOverride {
        var: "QUORUM_RATE_LIMIT",
        expected: "expected bool",
        apply: |c, raw| {
            c.rate_limit.enabled = parse_flag(raw)?;
            Some(())
        },
    },
    EnvOverride {
        var: "QUORUM_RATE_LIMIT_CAPACITY",
        expected: "expected number",
        apply: |c, raw| set(&mut c.rate_limit.capacity, raw),
    },
    EnvOverride {
        var: "QUORUM_RATE_LIMIT_REFILL",
        expected: "expected number",
        apply: |c, raw| set(&mut c.rate_limit.refill_per_sec, raw),
    },
    EnvOverride {
        var: "QUORUM_MAX_BATCH_SIZE",
        expected: "expected positive integer",
        apply: |c, raw| set(&mut c.loader.max_batch_size, raw),
    },
    EnvOverride {
        var: "QUORUM_MAX_PAGE_SIZE",
        expected: "expected positive integer",
        apply: |c, raw| set(&mut c.pagination.max_limit, raw),
    },
    EnvOverride {
        var: "QUORUM_SESSION_TIMEOUT_SECS",
        expected: "expected seconds",
        apply: |c, raw| set(&mut c.sessions.timeout_secs, raw),
    },
    EnvOverride {
        var: "QUORUM_BUS_BUFFER",
        expected: "expected positive integer",
        apply: |c, raw| set(&mut c.bus.buffer, raw),
    },
];

/// Builder that resolves a [`QuorumConfig`] from files and environment.
///
/// ```no_run
/// use quorum_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_project_root("/srv/quorum")
///     .skip_env_vars()
///     .load()?;
/// assert!(config.pagination.max_limit >= config.pagination.default_limit);
/// # Ok::<(), quorum_runtime::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    global_path: Option<PathBuf>,
    project_root: Option<PathBuf>,
    skip_env: bool,
    skip_global: bool,
    skip_project: bool,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces `~/.quorum/config.toml` as the global layer.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_path = Some(path.into());
        self
    }

    /// Reads the project layer from `<root>/.quorum/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.skip_project = true;
        self
    }

    /// Config files to read, lowest priority first.
    fn files(&self) -> Vec<(&'static str, PathBuf)> {
        let mut files = Vec::with_capacity(2);
        if !self.skip_global {
            let path = self.global_path.clone().unwrap_or_else(default_config_path);
            files.push(("global", path));
        }
        if let (false, Some(root)) = (self.skip_project, &self.project_root) {
            files.push(("project", root.join(PROJECT_CONFIG_DIR).join(PROJECT_CONFIG_FILE)));
        }
        files
    }

    /// Resolves every layer into one config.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when an existing file cannot be read or parsed, a
    /// `QUORUM_*` variable does not parse, or the merged role overrides
    /// are rejected by the role matrix.
    pub fn load(&self) -> Result<QuorumConfig, ConfigError> {
        let mut config = QuorumConfig::default();

        for (layer, path) in self.files() {
            if let Some(file) = read_layer(&path)? {
                debug!(layer, path = %path.display(), "config layer applied");
                config.merge(&file);
            }
        }

        if !self.skip_env {
            apply_env(&mut config, |var| std::env::var(var).ok())?;
        }

        config.role_matrix()?;
        Ok(config)
    }
}

fn read_layer(path: &Path) -> Result<Option<QuorumConfig>, ConfigError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    QuorumConfig::from_toml(&text)
        .map(Some)
        .map_err(|e| ConfigError::parse_toml(path, e))
}

/// Applies every override `lookup` knows about.
fn apply_env(
    config: &mut QuorumConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    for over in ENV_OVERRIDES {
        let Some(raw) = lookup(over.var) else {
            continue;
        };
        (over.apply)(config, &raw).ok_or_else(|| ConfigError::invalid_env_var(over.var, over.expected))?;
        debug!(var = over.var, "config override from environment");
    }
    Ok(())
}

/// `true/false`, `1/0`, `yes/no`, `on/off`; case-insensitive.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
