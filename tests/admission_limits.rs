//! Admission-limit properties exercised through the public Gatekeeper API.

use subscription_gateway::admission::{AdmissionError, ConnectionId, Gatekeeper};
use subscription_gateway::auth::Identity;
use subscription_gateway::config::AdmissionConfig;

#[test]
fn default_attempt_cap_is_twenty_per_window() {
    let gatekeeper = Gatekeeper::new(AdmissionConfig::default());

    for _ in 0..20 {
        gatekeeper
            .assert_handshake_allowed("198.51.100.9", "ns")
            .expect("within the attempt window");
    }

    let err = gatekeeper
        .assert_handshake_allowed("198.51.100.9", "ns")
        .unwrap_err();
    assert!(matches!(err, AdmissionError::RateLimited { .. }));

    // Other addresses are unaffected.
    assert!(gatekeeper.assert_handshake_allowed("198.51.100.10", "ns").is_ok());
}

#[test]
fn snapshot_counts_open_minus_released() {
    let gatekeeper = Gatekeeper::new(AdmissionConfig::default());

    let mut handles = Vec::new();
    for i in 0..6 {
        let address = format!("10.1.0.{i}");
        let identity = Identity::new(format!("user-{i}"));
        let handle = gatekeeper
            .open_lease(ConnectionId::new(), &address, Some(identity), "ns")
            .unwrap();
        handles.push(handle);
    }
    assert_eq!(gatekeeper.list_connections().len(), 6);

    for handle in handles.iter().take(4) {
        assert!(handle.release());
    }
    assert_eq!(gatekeeper.list_connections().len(), 2);

    // Releasing again changes nothing.
    for handle in handles.iter().take(4) {
        assert!(!handle.release());
    }
    assert_eq!(gatekeeper.list_connections().len(), 2);
}

#[test]
fn explicit_release_by_id_is_idempotent() {
    let gatekeeper = Gatekeeper::new(AdmissionConfig::default());
    let id = ConnectionId::new();
    gatekeeper
        .open_lease(id, "10.1.0.1", Some(Identity::new("user-1")), "ns")
        .unwrap();

    assert!(gatekeeper.release(id));
    assert!(!gatekeeper.release(id));
    gatekeeper.mark_heartbeat(id); // no-op after release
    assert!(gatekeeper.list_connections().is_empty());
}

#[test]
fn sweep_reports_zero_while_windows_are_live() {
    let gatekeeper = Gatekeeper::new(AdmissionConfig::default());
    gatekeeper.assert_handshake_allowed("10.1.0.1", "ns").unwrap();

    // The attempt is inside its 10s window, so nothing is evictable yet.
    assert_eq!(gatekeeper.sweep_ledger(), 0);
}
