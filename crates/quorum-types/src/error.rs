//! Stable error codes shared by every Quorum layer.
//!
//! Each layer (auth, store, service, bus, config, registry) owns a
//! `thiserror` enum and implements [`ErrorCode`] on it. Codes are what
//! logs and dashboards key on; the orchestrator maps errors to the
//! external taxonomy by variant, never by message text.
//!
//! ```
//! use quorum_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum StoreFault {
//!     Unavailable,
//!     Corrupt,
//! }
//!
//! impl ErrorCode for StoreFault {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Unavailable => "STORE_UNAVAILABLE",
//!             Self::Corrupt => "STORE_CORRUPT",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Unavailable)
//!     }
//! }
//!
//! assert_eq!(StoreFault::Corrupt.code(), "STORE_CORRUPT");
//! assert!(StoreFault::Unavailable.is_recoverable());
//! ```

use std::fmt;

/// Machine-readable identity of an error.
///
/// Codes are UPPER_SNAKE_CASE and start with their layer's prefix
/// (`AUTH_`, `STORE_`, `SERVICE_`, `BUS_`, `CONFIG_`, `REGISTRY_`,
/// `REQUEST_`). Renaming a code is a breaking change.
pub trait ErrorCode {
    fn code(&self) -> &'static str;

    /// Whether repeating the same call may succeed: store outages and bus
    /// backpressure, but never validation, permission or conflict errors.
    fn is_recoverable(&self) -> bool;
}

/// Why a code breaks the naming rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeViolation<'a> {
    Empty,
    WrongPrefix { code: &'a str, prefix: &'a str },
    NotUpperSnake(&'a str),
}

impl fmt::Display for CodeViolation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("error code is empty"),
            Self::WrongPrefix { code, prefix } => {
                write!(f, "error code {code} does not start with {prefix}")
            }
            Self::NotUpperSnake(code) => write!(f, "error code {code} is not UPPER_SNAKE_CASE"),
        }
    }
}

fn check_code<'a>(code: &'a str, prefix: &'a str) -> Result<(), CodeViolation<'a>> {
    if code.is_empty() {
        return Err(CodeViolation::Empty);
    }
    if !code.starts_with(prefix) {
        return Err(CodeViolation::WrongPrefix { code, prefix });
    }
    let well_formed = code
        .split('_')
        .all(|word| !word.is_empty() && word.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    if !well_formed {
        return Err(CodeViolation::NotUpperSnake(code));
    }
    Ok(())
}

/// Test helper: panics unless `err.code()` is non-empty, starts with
/// `prefix` and is UPPER_SNAKE_CASE.
///
/// ```
/// use quorum_types::{assert_error_code, ErrorCode};
///
/// struct Timeout;
///
/// impl ErrorCode for Timeout {
///     fn code(&self) -> &'static str { "BUS_TIMEOUT" }
///     fn is_recoverable(&self) -> bool { true }
/// }
///
/// assert_error_code(&Timeout, "BUS_");
/// ```
///
/// # Panics
///
/// On the first naming rule the code breaks.
pub fn assert_error_code<E: ErrorCode>(err: &E, prefix: &str) {
    if let Err(violation) = check_code(err.code(), prefix) {
        panic!("{violation}");
    }
}

/// [`assert_error_code`] over every listed variant.
///
/// # Panics
///
/// On the first variant whose code breaks a naming rule.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], prefix: &str) {
    errors.iter().for_each(|err| assert_error_code(err, prefix));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum Sample {
        Retry,
        Reject,
    }

    impl ErrorCode for Sample {
        fn code(&self) -> &'static str {
            match self {
                Self::Retry => "SAMPLE_RETRY",
                Self::Reject => "SAMPLE_REJECT_2",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Retry)
        }
    }

    #[test]
    fn codes_and_recoverability() {
        assert_eq!(Sample::Retry.code(), "SAMPLE_RETRY");
        assert!(Sample::Retry.is_recoverable());
        assert!(!Sample::Reject.is_recoverable());
        assert_error_codes(&[Sample::Retry, Sample::Reject], "SAMPLE_");
    }

    #[test]
    #[should_panic(expected = "does not start with AUTH_")]
    fn foreign_prefix_panics() {
        assert_error_code(&Sample::Retry, "AUTH_");
    }

    #[test]
    fn naming_rules() {
        assert_eq!(check_code("AUTH_FORBIDDEN", "AUTH_"), Ok(()));
        assert_eq!(check_code("", ""), Err(CodeViolation::Empty));
        for bad in ["auth_forbidden", "_AUTH", "AUTH_", "AUTH__FORBIDDEN", "AUTH-FORBIDDEN"] {
            assert_eq!(check_code(bad, ""), Err(CodeViolation::NotUpperSnake(bad)), "{bad}");
        }
    }
}
