//! Drop classification and error types for the redirect path.
//!
//! Per-packet failures are not errors: they are classified into a
//! [`DropReason`] and returned as the packet's verdict. [`ConfigError`] and
//! [`MetricsError`] cover the setup path.

use std::fmt;
use std::io;
use thiserror::Error;

/// Why the L3 processor refused to let a packet continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum L3Reject {
    /// TTL or hop limit would reach zero.
    HopLimitExceeded,
    /// The header could not be read or written at its recorded offset.
    Malformed,
    /// The processor refused the packet for a reason of its own.
    Policy(u32),
}

impl fmt::Display for L3Reject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            L3Reject::HopLimitExceeded => f.write_str("hop limit exceeded"),
            L3Reject::Malformed => f.write_str("malformed L3 header"),
            L3Reject::Policy(code) => write!(f, "rejected by policy ({})", code),
        }
    }
}

/// Terminal drop classification. A packet gets exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// The FIB had no usable route, or returned a status other than
    /// success or no-neighbor.
    NoRoute,
    /// The L3 processor rejected the packet.
    L3Rejected(L3Reject),
    /// The next hop's link-layer address could not be resolved locally.
    UnresolvedNeighbor,
    /// Writing the destination or source MAC into the frame failed.
    HeaderWriteError,
    /// The platform's deferred neighbor redirect dropped the packet.
    DeferredRedirectFailure,
}

impl DropReason {
    /// All reason labels, in declaration order.
    pub const LABELS: [&'static str; 5] = [
        "no_route",
        "l3_rejected",
        "unresolved_neighbor",
        "header_write_error",
        "deferred_redirect_failure",
    ];

    /// Stable label for metrics and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DropReason::NoRoute => "no_route",
            DropReason::L3Rejected(_) => "l3_rejected",
            DropReason::UnresolvedNeighbor => "unresolved_neighbor",
            DropReason::HeaderWriteError => "header_write_error",
            DropReason::DeferredRedirectFailure => "deferred_redirect_failure",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::L3Rejected(reject) => write!(f, "l3_rejected: {}", reject),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Errors raised while loading or validating [`crate::RedirectConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while registering redirect counters.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}
