//! Connection identifiers and lease records.

use std::time::Instant;

use uuid::Uuid;

use crate::auth::Identity;

/// Opaque identifier for an admitted connection.
///
/// UUID v4 rather than a process-local counter so the id stays meaningful
/// when log lines from several gateway instances land in one aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Record that a connection is currently counted against capacity limits.
///
/// A lease exists in the lease table, in exactly one address-index bucket,
/// and (if an identity is present) in exactly one identity-index bucket.
#[derive(Debug, Clone)]
pub struct ConnectionLease {
    /// Source network address the connection arrived from.
    pub address: String,

    /// Authenticated identity, if any. Leases are only opened after
    /// authentication, but the data model allows anonymous leases.
    pub identity: Option<Identity>,

    /// Logical channel category (labeling only; caps are global).
    pub namespace: String,

    /// When the lease was opened.
    pub opened_at: Instant,

    /// Last heartbeat observed on the connection.
    pub last_seen_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn connection_id_display_prefix() {
        let id = ConnectionId::new();
        assert!(id.to_string().starts_with("conn-"));
    }
}
