use std::fmt;
use std::time::Duration;

/// Why a request that found its session was still refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Forbidden {
    /// The session owner's account is disabled; their shares stop working.
    OwnerInactive,
    /// A mutation was attempted by someone other than the owner.
    NotOwner,
}

impl fmt::Display for Forbidden {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OwnerInactive => f.write_str("owner inactive"),
            Self::NotOwner => f.write_str("not owner"),
        }
    }
}

/// Outcome taxonomy shared by every core operation.
///
/// `NotFound` deliberately covers both "no such session" and "exists but the
/// viewer has no grant". Callers must not try to tell them apart.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CoreError {
    #[error("not found")]
    NotFound,

    #[error("forbidden: {0}")]
    Forbidden(Forbidden),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("store failure: {0}")]
    StoreFailure(String),
}

impl CoreError {
    /// Expected outcomes are returned to the client as-is; the rest are
    /// logged server-side and surfaced generically.
    pub fn is_expected(&self) -> bool {
        match self {
            Self::NotFound | Self::Forbidden(_) | Self::InvalidInput(_) => true,
            Self::Timeout { .. } | Self::StoreFailure(_) => false,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidInput(_) => "invalid_input",
            Self::Timeout { .. } => "timeout",
            Self::StoreFailure(_) => "store_failure",
        }
    }
}
