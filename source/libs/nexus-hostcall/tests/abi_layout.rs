//! CONTEXT: Layout and decoding checks for the host-call ABI types
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 3 unit tests
//!
//! TEST_SCENARIOS:
//!   - notification_slot_is_sixteen_bytes(): ring stride matches the host's record size
//!   - status_decoding_matches_codes(): raw status words map onto HostError and back
//!   - network_status_defaults_to_connecting(): unknown status words never read as connected
use nexus_hostcall::{
    check_status, HostError, NetworkStatus, NotificationSlot, STATUS_OKAY,
};

#[test]
fn notification_slot_is_sixteen_bytes() {
    assert_eq!(core::mem::size_of::<NotificationSlot>(), 16);
    let ring = [NotificationSlot::empty(), NotificationSlot::empty()];
    assert_eq!(core::mem::size_of_val(&ring), 32);
}

#[test]
fn status_decoding_matches_codes() {
    assert!(check_status(STATUS_OKAY).is_ok());
    for raw in 1..=9u32 {
        let err = check_status(raw).unwrap_err();
        assert_eq!(err.code(), raw);
    }
    assert_eq!(check_status(1000), Err(HostError::Unrecognized(1000)));
}

#[test]
fn network_status_defaults_to_connecting() {
    assert_eq!(NetworkStatus::from_raw(2), NetworkStatus::Connected);
    assert_eq!(NetworkStatus::from_raw(0), NetworkStatus::DelayingConnection);
    assert_eq!(NetworkStatus::from_raw(99), NetworkStatus::Connecting);
}
