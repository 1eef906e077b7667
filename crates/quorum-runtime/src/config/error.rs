//! Errors raised while resolving [`QuorumConfig`](super::QuorumConfig).

use quorum_auth::MatrixError;
use quorum_types::ErrorCode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid config TOML: {source}", path.display())]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config cannot be written as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A `QUORUM_*` variable is set but does not parse.
    #[error("{name}: {message}")]
    InvalidEnvVar { name: String, message: String },

    /// The merged `[roles]` table was rejected by the role matrix.
    #[error("[roles]: {0}")]
    Roles(#[from] MatrixError),
}

impl ConfigError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "CONFIG_READ_FILE",
            Self::ParseToml { .. } => "CONFIG_PARSE_TOML",
            Self::Serialize(_) => "CONFIG_SERIALIZE",
            Self::InvalidEnvVar { .. } => "CONFIG_INVALID_ENV_VAR",
            Self::Roles(_) => "CONFIG_ROLES",
        }
    }

    // Startup fails; nothing to retry.
    fn is_recoverable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::{assert_error_code, Role};

    #[test]
    fn error_display() {
        let err = ConfigError::invalid_env_var("QUORUM_RATE_LIMIT", "expected bool");
        assert!(err.to_string().contains("QUORUM_RATE_LIMIT"));
        assert!(err.to_string().contains("expected bool"));
        assert_error_code(&err, "CONFIG_");
    }

    #[test]
    fn roles_error_code() {
        let err = ConfigError::from(MatrixError::CrossTenantBelowSystem(Role::User));
        assert_eq!(err.code(), "CONFIG_ROLES");
        let read = ConfigError::read_file(
            "/x",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_error_code(&read, "CONFIG_");
    }
}
