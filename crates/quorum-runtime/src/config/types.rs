//! Config sections. Every field has a default, so a TOML file only names
//! what it changes.

use quorum_auth::{MatrixError, RoleMatrix};
use quorum_types::{Page, PageArgs, PermissionSet, Role, DEFAULT_LIMIT, MAX_LIMIT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Process-wide settings, read once at startup.
///
/// ```
/// use quorum_runtime::config::QuorumConfig;
///
/// let config = QuorumConfig::default();
/// assert_eq!(config.pagination.max_limit, 100);
/// assert!(config.rate_limit.enabled);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuorumConfig {
    /// Batch loader tuning.
    pub loader: LoaderConfig,

    /// List operation page bounds.
    pub pagination: PaginationConfig,

    /// Inbound request throttling.
    pub rate_limit: RateLimitConfig,

    /// Survey-taking session lifecycle.
    pub sessions: SessionConfig,

    /// Notification bus.
    pub bus: BusConfig,

    /// Replacement permission increments per role tier.
    ///
    /// ```toml
    /// [roles]
    /// ANALYST = ["response:read", "analytics:read"]
    /// ```
    pub roles: BTreeMap<Role, PermissionSet>,
}

impl QuorumConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders the config as a `config.toml` body.
    ///
    /// # Errors
    ///
    /// A value TOML cannot represent.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Parses one config layer.
    ///
    /// # Errors
    ///
    /// Malformed TOML, unknown permission names, or mistyped values.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Builds the role matrix: defaults with the `[roles]` overrides applied.
    ///
    /// # Errors
    ///
    /// [`MatrixError`] if an override would give `tenant:cross` to a tier
    /// below SYSTEM_ADMIN.
    pub fn role_matrix(&self) -> Result<RoleMatrix, MatrixError> {
        RoleMatrix::default().with_overrides(self.roles.clone())
    }

    /// Lays `other` over `self`. A field in `other` that still holds its
    /// default leaves `self` untouched.
    pub fn merge(&mut self, other: &Self) {
        self.loader.merge(&other.loader);
        self.pagination.merge(&other.pagination);
        self.rate_limit.merge(&other.rate_limit);
        self.sessions.merge(&other.sessions);
        self.bus.merge(&other.bus);
        // Per tier: a later layer replaces the whole increment.
        for (role, set) in &other.roles {
            self.roles.insert(*role, set.clone());
        }
    }
}

/// Batch loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Largest number of keys sent to the store in one fetch.
    pub max_batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
        }
    }
}

impl LoaderConfig {
    fn merge(&mut self, other: &Self) {
        if other.max_batch_size != Self::default().max_batch_size {
            self.max_batch_size = other.max_batch_size;
        }
    }
}

/// Pagination configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_limit: u32,
    /// Larger limits are clamped to this, never rejected. Values above
    /// [`MAX_LIMIT`] are themselves capped at it.
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

impl PaginationConfig {
    /// Normalises caller arguments against these bounds.
    #[must_use]
    pub fn page(&self, args: PageArgs) -> Page {
        Page::with_bounds(args, self.default_limit, self.max_limit.min(MAX_LIMIT))
    }

    fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.default_limit != default.default_limit {
            self.default_limit = other.default_limit;
        }
        if other.max_limit != default.max_limit {
            self.max_limit = other.max_limit;
        }
    }
}

/// Token bucket rate limiting, per identity or client address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Bucket size: the burst a fresh caller may spend at once.
    pub capacity: f64,
    /// Tokens added per second.
    pub refill_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 120.0,
            refill_per_sec: 2.0,
        }
    }
}

impl RateLimitConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.enabled != default.enabled {
            self.enabled = other.enabled;
        }
        if (other.capacity - default.capacity).abs() > f64::EPSILON {
            self.capacity = other.capacity;
        }
        if (other.refill_per_sec - default.refill_per_sec).abs() > f64::EPSILON {
            self.refill_per_sec = other.refill_per_sec;
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity after which an open session expires, unless the survey
    /// sets its own.
    pub timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { timeout_secs: 1800 }
    }
}

impl SessionConfig {
    fn merge(&mut self, other: &Self) {
        if other.timeout_secs != Self::default().timeout_secs {
            self.timeout_secs = other.timeout_secs;
        }
    }
}

/// Notification bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BusConfig {
    /// Per-subscriber buffer; events to a full buffer are dropped.
    pub buffer: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { buffer: 256 }
    }
}

impl BusConfig {
    fn merge(&mut self, other: &Self) {
        if other.buffer != Self::default().buffer {
            self.buffer = other.buffer;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::Permission;

    #[test]
    fn default_config() {
        let config = QuorumConfig::default();
        assert_eq!(config.loader.max_batch_size, 100);
        assert_eq!(config.pagination.default_limit, 20);
        assert_eq!(config.sessions.timeout_secs, 1800);
        assert!(config.roles.is_empty());
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = QuorumConfig::default();
        config.bus.buffer = 8;
        config
            .roles
            .insert(Role::Viewer, [Permission::SurveyRead].into_iter().collect());

        let toml = config.to_toml().unwrap();
        let restored = QuorumConfig::from_toml(&toml).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn partial_toml() {
        let toml = r#"
[pagination]
max_limit = 50

[roles]
ANALYST = ["response:read"]
"#;
        let config = QuorumConfig::from_toml(toml).unwrap();
        assert_eq!(config.pagination.max_limit, 50);
        assert_eq!(config.pagination.default_limit, 20);
        assert_eq!(config.roles[&Role::Analyst].len(), 1);
    }

    #[test]
    fn merge_overrides_only_non_defaults() {
        let mut base = QuorumConfig::default();
        base.sessions.timeout_secs = 60;

        let mut overlay = QuorumConfig::default();
        overlay.loader.max_batch_size = 10;

        base.merge(&overlay);
        assert_eq!(base.loader.max_batch_size, 10);
        assert_eq!(base.sessions.timeout_secs, 60);
    }

    #[test]
    fn page_uses_configured_bounds() {
        let pagination = PaginationConfig {
            default_limit: 5,
            max_limit: 10,
        };
        assert_eq!(pagination.page(PageArgs::default()).limit, 5);
        let clamped = pagination.page(PageArgs {
            limit: Some(99),
            offset: None,
        });
        assert_eq!(clamped.limit, 10);
    }

    #[test]
    fn configured_cap_never_exceeds_hard_limit() {
        let pagination = PaginationConfig {
            default_limit: 500,
            max_limit: 1000,
        };
        let page = pagination.page(PageArgs {
            limit: Some(500),
            offset: None,
        });
        assert_eq!(page.limit, MAX_LIMIT);
        assert_eq!(pagination.page(PageArgs::default()).limit, MAX_LIMIT);
    }

    #[test]
    fn cross_tenant_override_rejected() {
        let mut config = QuorumConfig::default();
        config
            .roles
            .insert(Role::TenantAdmin, [Permission::CrossTenant].into_iter().collect());
        assert!(config.role_matrix().is_err());
    }
}
