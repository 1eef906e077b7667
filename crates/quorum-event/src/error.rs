//! Notification bus errors.
//!
//! All bus errors use the `BUS_` prefix for their codes:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`BusError::Closed`] | `BUS_CLOSED` | No |
//! | [`BusError::Transport`] | `BUS_TRANSPORT` | Yes |
//! | [`BusError::InvalidFilter`] | `BUS_INVALID_FILTER` | No |
//!
//! Publishing is best-effort, so a publisher normally logs these and moves
//! on. A mutation that already committed is never rolled back because its
//! event could not be delivered.

use quorum_types::ErrorCode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The bus has been shut down.
    #[error("notification bus is closed")]
    Closed,

    /// The distributed transport failed.
    ///
    /// Recoverable: the transport may reconnect.
    #[error("bus transport failed: {0}")]
    Transport(String),

    /// The filter can never be satisfied for this caller.
    #[error("invalid subscription filter: {0}")]
    InvalidFilter(String),
}

impl ErrorCode for BusError {
    fn code(&self) -> &'static str {
        match self {
            Self::Closed => "BUS_CLOSED",
            Self::Transport(_) => "BUS_TRANSPORT",
            Self::InvalidFilter(_) => "BUS_INVALID_FILTER",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::assert_error_codes;

    fn all_variants() -> Vec<BusError> {
        vec![
            BusError::Closed,
            BusError::Transport("x".into()),
            BusError::InvalidFilter("x".into()),
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "BUS_");
    }

    #[test]
    fn transport_is_recoverable() {
        let err = BusError::Transport("connection reset".into());
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("connection reset"));
        assert!(!BusError::Closed.is_recoverable());
    }
}
