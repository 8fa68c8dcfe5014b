//! Connection admission subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming handshake:
//!     → gatekeeper.rs (sliding-window rate check per source address)
//!     → external authenticator (auth module)
//!     → gatekeeper.rs (capacity check, lease open)
//!     → lease released once on socket close/error
//! ```
//!
//! # Design Decisions
//! - All mutable admission state lives behind the Gatekeeper; nothing else
//!   touches the ledger, lease table, or capacity indices
//! - Checks run strictly before side effects; a consumed attempt slot is
//!   never rolled back when a later check rejects the handshake
//! - Release is idempotent on every path (clean close, error, double fire)

pub mod gatekeeper;
pub mod lease;

pub use gatekeeper::{Gatekeeper, ReleaseHandle};
pub use lease::{ConnectionId, ConnectionLease};

use thiserror::Error;

/// Which concurrent-connection cap rejected a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityScope {
    /// Per-source-address cap.
    Address,
    /// Per-authenticated-identity cap.
    Identity,
}

impl std::fmt::Display for CapacityScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityScope::Address => write!(f, "address"),
            CapacityScope::Identity => write!(f, "identity"),
        }
    }
}

/// Errors raised by the Gatekeeper's admission checks.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Handshake attempt count or an active block exceeded; recoverable once
    /// the block expires.
    #[error("handshake rate limit exceeded for {address}, retry in {retry_after_ms} ms")]
    RateLimited {
        address: String,
        retry_after_ms: u64,
    },

    /// Address or identity already holds its maximum concurrent connections;
    /// recoverable once an existing connection closes.
    #[error("{scope} connection cap of {limit} reached")]
    CapacityExceeded { scope: CapacityScope, limit: usize },
}
