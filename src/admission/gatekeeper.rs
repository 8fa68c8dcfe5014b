//! The Gatekeeper: single source of truth for handshake admission and
//! concurrent-connection capacity.
//!
//! State is three structures, each owned exclusively by this module:
//! - a handshake ledger per source address (sliding attempt/failure windows
//!   plus an optional cooldown block),
//! - the lease table (one entry per admitted connection),
//! - capacity indices by address and by identity.
//!
//! The lease table and both indices sit under one mutex so the lease
//! invariant (lease present ⇔ indexed in exactly one bucket per key) can
//! never be observed half-applied.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::admission::lease::{ConnectionId, ConnectionLease};
use crate::admission::{AdmissionError, CapacityScope};
use crate::auth::Identity;
use crate::config::AdmissionConfig;

/// Per-address handshake bookkeeping.
///
/// Both deques only ever contain timestamps within their window at the
/// moment of last access; pruning is lazy, not background-swept.
#[derive(Debug, Default)]
struct LedgerEntry {
    attempts: VecDeque<Instant>,
    failures: VecDeque<Instant>,
    blocked_until: Option<Instant>,
}

impl LedgerEntry {
    /// Drop timestamps older than `window` relative to `now`.
    fn prune(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = deque.front() {
            if now.duration_since(*front) > window {
                deque.pop_front();
            } else {
                break;
            }
        }
    }

    /// True once both windows are empty and any block has passed, meaning
    /// the entry carries no state worth keeping.
    fn is_idle(&self, now: Instant) -> bool {
        self.attempts.is_empty()
            && self.failures.is_empty()
            && self.blocked_until.map_or(true, |until| now >= until)
    }
}

/// Lease table plus both capacity indices, updated together under one lock.
#[derive(Debug, Default)]
struct LeaseTable {
    leases: HashMap<ConnectionId, ConnectionLease>,
    by_address: HashMap<String, HashSet<ConnectionId>>,
    by_identity: HashMap<Identity, HashSet<ConnectionId>>,
}

impl LeaseTable {
    /// Remove the lease and its index entries, deleting buckets that become
    /// empty. Returns the lease if it was still present.
    fn remove(&mut self, id: ConnectionId) -> Option<ConnectionLease> {
        let lease = self.leases.remove(&id)?;

        if let Some(bucket) = self.by_address.get_mut(&lease.address) {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.by_address.remove(&lease.address);
            }
        }
        if let Some(identity) = &lease.identity {
            if let Some(bucket) = self.by_identity.get_mut(identity) {
                bucket.remove(&id);
                if bucket.is_empty() {
                    self.by_identity.remove(identity);
                }
            }
        }

        Some(lease)
    }
}

/// Owns all admission-control state and exposes the admission checks.
pub struct Gatekeeper {
    config: AdmissionConfig,
    handshake_window: Duration,
    handshake_cooldown: Duration,
    failure_window: Duration,
    failure_cooldown: Duration,
    ledger: Mutex<HashMap<String, LedgerEntry>>,
    table: Arc<Mutex<LeaseTable>>,
}

impl Gatekeeper {
    /// Create a Gatekeeper. Limits are fixed for the process lifetime.
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            handshake_window: Duration::from_millis(config.handshake_window_ms),
            handshake_cooldown: Duration::from_millis(config.handshake_cooldown_ms),
            failure_window: Duration::from_millis(config.failure_window_ms),
            failure_cooldown: Duration::from_millis(config.failure_cooldown_ms),
            config,
            ledger: Mutex::new(HashMap::new()),
            table: Arc::new(Mutex::new(LeaseTable::default())),
        }
    }

    /// Check whether a handshake from `address` may proceed, consuming one
    /// attempt slot if it may.
    ///
    /// A blocked address is rejected outright without consuming window
    /// slots. An address at the attempt cap is escalated into a cooldown
    /// block. The consumed slot is never rolled back if a later admission
    /// step rejects the handshake.
    pub fn assert_handshake_allowed(
        &self,
        address: &str,
        namespace: &str,
    ) -> Result<(), AdmissionError> {
        self.assert_handshake_allowed_at(address, namespace, Instant::now())
    }

    pub(crate) fn assert_handshake_allowed_at(
        &self,
        address: &str,
        namespace: &str,
        now: Instant,
    ) -> Result<(), AdmissionError> {
        let mut ledger = self.ledger.lock().expect("handshake ledger mutex poisoned");
        let entry = ledger.entry(address.to_string()).or_default();

        if let Some(until) = entry.blocked_until {
            if now < until {
                return Err(AdmissionError::RateLimited {
                    address: address.to_string(),
                    retry_after_ms: until.duration_since(now).as_millis() as u64,
                });
            }
            entry.blocked_until = None;
        }

        LedgerEntry::prune(&mut entry.attempts, now, self.handshake_window);
        if entry.attempts.len() >= self.config.max_handshakes_per_address {
            let until = now + self.handshake_cooldown;
            entry.blocked_until = Some(until);
            tracing::warn!(
                address = %address,
                namespace = %namespace,
                attempts = entry.attempts.len(),
                cooldown_ms = self.config.handshake_cooldown_ms,
                "Handshake burst limit reached, cooling address down"
            );
            return Err(AdmissionError::RateLimited {
                address: address.to_string(),
                retry_after_ms: self.config.handshake_cooldown_ms,
            });
        }

        entry.attempts.push_back(now);
        Ok(())
    }

    /// Record a definitive authentication failure from `address`. Reaching
    /// the failure threshold inside the failure window blocks the address
    /// for the failure cooldown.
    pub fn record_handshake_failure(&self, address: &str, namespace: &str) {
        self.record_handshake_failure_at(address, namespace, Instant::now());
    }

    pub(crate) fn record_handshake_failure_at(
        &self,
        address: &str,
        namespace: &str,
        now: Instant,
    ) {
        let mut ledger = self.ledger.lock().expect("handshake ledger mutex poisoned");
        let entry = ledger.entry(address.to_string()).or_default();

        LedgerEntry::prune(&mut entry.failures, now, self.failure_window);
        entry.failures.push_back(now);

        if entry.failures.len() >= self.config.max_failures_per_address {
            entry.blocked_until = Some(now + self.failure_cooldown);
            tracing::warn!(
                address = %address,
                namespace = %namespace,
                failures = entry.failures.len(),
                cooldown_ms = self.config.failure_cooldown_ms,
                "Authentication failure threshold reached, blocking address"
            );
        }
    }

    /// Open a lease for an admitted connection.
    ///
    /// Both capacity checks run strictly before any mutation; on success the
    /// lease and both indices are updated together and an idempotent
    /// [`ReleaseHandle`] is returned.
    pub fn open_lease(
        &self,
        id: ConnectionId,
        address: &str,
        identity: Option<Identity>,
        namespace: &str,
    ) -> Result<ReleaseHandle, AdmissionError> {
        self.open_lease_at(id, address, identity, namespace, Instant::now())
    }

    pub(crate) fn open_lease_at(
        &self,
        id: ConnectionId,
        address: &str,
        identity: Option<Identity>,
        namespace: &str,
        now: Instant,
    ) -> Result<ReleaseHandle, AdmissionError> {
        let mut table = self.table.lock().expect("lease table mutex poisoned");

        let held_by_address = table.by_address.get(address).map_or(0, HashSet::len);
        if held_by_address >= self.config.max_connections_per_address {
            return Err(AdmissionError::CapacityExceeded {
                scope: CapacityScope::Address,
                limit: self.config.max_connections_per_address,
            });
        }
        if let Some(identity) = &identity {
            let held_by_identity = table.by_identity.get(identity).map_or(0, HashSet::len);
            if held_by_identity >= self.config.max_connections_per_identity {
                return Err(AdmissionError::CapacityExceeded {
                    scope: CapacityScope::Identity,
                    limit: self.config.max_connections_per_identity,
                });
            }
        }

        table.leases.insert(
            id,
            ConnectionLease {
                address: address.to_string(),
                identity: identity.clone(),
                namespace: namespace.to_string(),
                opened_at: now,
                last_seen_at: now,
            },
        );
        table.by_address.entry(address.to_string()).or_default().insert(id);
        if let Some(identity) = identity {
            table.by_identity.entry(identity).or_default().insert(id);
        }

        Ok(ReleaseHandle {
            table: Arc::clone(&self.table),
            id,
            released: AtomicBool::new(false),
        })
    }

    /// Update the lease's last-seen timestamp. No-op if the connection has
    /// already closed.
    pub fn mark_heartbeat(&self, id: ConnectionId) {
        self.mark_heartbeat_at(id, Instant::now());
    }

    pub(crate) fn mark_heartbeat_at(&self, id: ConnectionId, now: Instant) {
        let mut table = self.table.lock().expect("lease table mutex poisoned");
        if let Some(lease) = table.leases.get_mut(&id) {
            lease.last_seen_at = now;
        }
    }

    /// Remove the lease and its index entries. Safe to call repeatedly;
    /// returns whether the lease was still present.
    pub fn release(&self, id: ConnectionId) -> bool {
        let mut table = self.table.lock().expect("lease table mutex poisoned");
        table.remove(id).is_some()
    }

    /// Defensive snapshot of all current leases, for diagnostics.
    pub fn list_connections(&self) -> Vec<(ConnectionId, ConnectionLease)> {
        let table = self.table.lock().expect("lease table mutex poisoned");
        table
            .leases
            .iter()
            .map(|(id, lease)| (*id, lease.clone()))
            .collect()
    }

    /// Evict ledger entries whose windows are empty and whose block has
    /// passed. Returns the number of evicted addresses.
    ///
    /// Ledger entries are otherwise kept for the process lifetime, so a
    /// periodic sweep is what bounds memory under address churn.
    pub fn sweep_ledger(&self) -> usize {
        self.sweep_ledger_at(Instant::now())
    }

    pub(crate) fn sweep_ledger_at(&self, now: Instant) -> usize {
        let mut ledger = self.ledger.lock().expect("handshake ledger mutex poisoned");
        let before = ledger.len();
        ledger.retain(|_, entry| {
            LedgerEntry::prune(&mut entry.attempts, now, self.handshake_window);
            LedgerEntry::prune(&mut entry.failures, now, self.failure_window);
            !entry.is_idle(now)
        });
        before - ledger.len()
    }

    #[cfg(test)]
    fn ledger_counts(&self, address: &str) -> Option<(usize, usize, bool)> {
        let ledger = self.ledger.lock().expect("handshake ledger mutex poisoned");
        ledger.get(address).map(|entry| {
            (
                entry.attempts.len(),
                entry.failures.len(),
                entry.blocked_until.is_some(),
            )
        })
    }
}

/// Releases one lease exactly once.
///
/// Close and error paths of a socket may both fire; the atomic guard makes
/// the second and later calls silent no-ops so capacity indices are never
/// decremented twice.
#[derive(Debug)]
pub struct ReleaseHandle {
    table: Arc<Mutex<LeaseTable>>,
    id: ConnectionId,
    released: AtomicBool,
}

impl ReleaseHandle {
    /// The connection this handle releases.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Release the lease. Returns true only on the call that actually
    /// removed it, so callers can tie one-shot side effects (gauge
    /// decrement, close log line) to the return value.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        let mut table = self.table.lock().expect("lease table mutex poisoned");
        table.remove(self.id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AdmissionConfig {
        AdmissionConfig {
            handshake_window_ms: 1_000,
            max_handshakes_per_address: 3,
            handshake_cooldown_ms: 15_000,
            failure_window_ms: 60_000,
            max_failures_per_address: 5,
            failure_cooldown_ms: 120_000,
            max_connections_per_identity: 8,
            max_connections_per_address: 12,
            ledger_sweep_interval_secs: 60,
        }
    }

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn handshakes_allowed_up_to_cap_then_rate_limited() {
        let gk = Gatekeeper::new(test_config());
        let base = Instant::now();

        assert!(gk.assert_handshake_allowed_at("1.2.3.4", "ns", at(base, 0)).is_ok());
        assert!(gk.assert_handshake_allowed_at("1.2.3.4", "ns", at(base, 100)).is_ok());
        assert!(gk.assert_handshake_allowed_at("1.2.3.4", "ns", at(base, 200)).is_ok());

        let err = gk
            .assert_handshake_allowed_at("1.2.3.4", "ns", at(base, 300))
            .unwrap_err();
        match err {
            AdmissionError::RateLimited { retry_after_ms, .. } => {
                assert_eq!(retry_after_ms, 15_000);
            }
            other => panic!("expected RateLimited, got {other}"),
        }
        // blockedUntil = 300 + cooldown
        let (_, _, blocked) = gk.ledger_counts("1.2.3.4").unwrap();
        assert!(blocked);
    }

    #[test]
    fn block_holds_for_cooldown_then_clears() {
        let gk = Gatekeeper::new(test_config());
        let base = Instant::now();

        for i in 0..3 {
            gk.assert_handshake_allowed_at("a", "ns", at(base, i * 10)).unwrap();
        }
        assert!(gk.assert_handshake_allowed_at("a", "ns", at(base, 40)).is_err());

        // Still blocked before the cooldown elapses.
        assert!(gk.assert_handshake_allowed_at("a", "ns", at(base, 10_000)).is_err());

        // After the cooldown the attempt window has also drained.
        assert!(gk.assert_handshake_allowed_at("a", "ns", at(base, 16_000)).is_ok());
    }

    #[test]
    fn attempts_outside_window_are_pruned() {
        let gk = Gatekeeper::new(test_config());
        let base = Instant::now();

        for i in 0..3 {
            gk.assert_handshake_allowed_at("a", "ns", at(base, i)).unwrap();
        }
        // 1.5s later the first three attempts fell out of the 1s window.
        assert!(gk.assert_handshake_allowed_at("a", "ns", at(base, 1_500)).is_ok());
    }

    #[test]
    fn failure_threshold_blocks_even_with_attempt_headroom() {
        let gk = Gatekeeper::new(test_config());
        let base = Instant::now();

        for i in 0..5 {
            gk.record_handshake_failure_at("a", "ns", at(base, i * 10));
        }
        let err = gk.assert_handshake_allowed_at("a", "ns", at(base, 100)).unwrap_err();
        assert!(matches!(err, AdmissionError::RateLimited { .. }));
    }

    #[test]
    fn address_cap_rejects_regardless_of_identity() {
        let gk = Gatekeeper::new(test_config());
        let mut handles = Vec::new();

        for i in 0..12 {
            let identity = Identity::new(format!("user-{i}"));
            let handle = gk
                .open_lease(ConnectionId::new(), "1.2.3.4", Some(identity), "ns")
                .expect("under the address cap");
            handles.push(handle);
        }

        let err = gk
            .open_lease(
                ConnectionId::new(),
                "1.2.3.4",
                Some(Identity::new("user-fresh")),
                "ns",
            )
            .unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::CapacityExceeded {
                scope: CapacityScope::Address,
                limit: 12,
            }
        ));
    }

    #[test]
    fn identity_cap_rejects_with_address_headroom() {
        let gk = Gatekeeper::new(test_config());
        let identity = Identity::new("user-42");
        let mut handles = Vec::new();

        for i in 0..8 {
            let address = format!("10.0.0.{i}");
            let handle = gk
                .open_lease(
                    ConnectionId::new(),
                    &address,
                    Some(identity.clone()),
                    "subscription-api",
                )
                .expect("under the identity cap");
            handles.push(handle);
        }

        let err = gk
            .open_lease(
                ConnectionId::new(),
                "10.0.0.99",
                Some(identity),
                "subscription-api",
            )
            .unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::CapacityExceeded {
                scope: CapacityScope::Identity,
                limit: 8,
            }
        ));
    }

    #[test]
    fn release_is_idempotent() {
        let gk = Gatekeeper::new(test_config());
        let id = ConnectionId::new();
        let handle = gk
            .open_lease(id, "1.2.3.4", Some(Identity::new("u")), "ns")
            .unwrap();

        assert!(handle.release());
        assert!(!handle.release());
        assert!(!gk.release(id));
        assert!(gk.list_connections().is_empty());

        // Freed capacity is usable again.
        assert!(gk.open_lease(ConnectionId::new(), "1.2.3.4", None, "ns").is_ok());
    }

    #[test]
    fn list_connections_tracks_open_minus_released() {
        let gk = Gatekeeper::new(test_config());
        let mut handles = Vec::new();
        for i in 0..5 {
            let address = format!("10.0.0.{i}");
            handles.push(gk.open_lease(ConnectionId::new(), &address, None, "ns").unwrap());
        }
        for handle in handles.iter().take(2) {
            assert!(handle.release());
        }
        assert_eq!(gk.list_connections().len(), 3);
    }

    #[test]
    fn capacity_rejection_consumes_attempt_but_records_no_failure() {
        let gk = Gatekeeper::new(test_config());
        let base = Instant::now();

        // Fill the address to its connection cap.
        let mut handles = Vec::new();
        for _ in 0..12 {
            handles.push(gk.open_lease(ConnectionId::new(), "a", None, "ns").unwrap());
        }

        gk.assert_handshake_allowed_at("a", "ns", at(base, 0)).unwrap();
        assert!(gk.open_lease(ConnectionId::new(), "a", None, "ns").is_err());

        let (attempts, failures, blocked) = gk.ledger_counts("a").unwrap();
        assert_eq!(attempts, 1);
        assert_eq!(failures, 0);
        assert!(!blocked);
    }

    #[test]
    fn heartbeat_updates_last_seen_and_ignores_released() {
        let gk = Gatekeeper::new(test_config());
        let id = ConnectionId::new();
        let base = Instant::now();
        let handle = gk.open_lease_at(id, "a", None, "ns", base).unwrap();

        gk.mark_heartbeat_at(id, at(base, 500));
        let snapshot = gk.list_connections();
        let (_, lease) = snapshot.iter().find(|(other, _)| *other == id).unwrap();
        assert_eq!(lease.last_seen_at.duration_since(base), Duration::from_millis(500));

        handle.release();
        gk.mark_heartbeat(id); // no-op, must not panic or resurrect
        assert!(gk.list_connections().is_empty());
    }

    #[test]
    fn sweep_evicts_only_idle_unblocked_entries() {
        let gk = Gatekeeper::new(test_config());
        let base = Instant::now();

        gk.assert_handshake_allowed_at("idle", "ns", at(base, 0)).unwrap();
        gk.assert_handshake_allowed_at("busy", "ns", at(base, 1_900)).unwrap();
        for i in 0..5 {
            gk.record_handshake_failure_at("blocked", "ns", at(base, i));
        }

        // At t=2s the idle address's attempt fell out of the window; the
        // busy one is still inside it and the blocked one still has a block.
        let evicted = gk.sweep_ledger_at(at(base, 2_000));
        assert_eq!(evicted, 1);
        assert!(gk.ledger_counts("idle").is_none());
        assert!(gk.ledger_counts("busy").is_some());
        assert!(gk.ledger_counts("blocked").is_some());
    }
}
