//! Memory reads, download and programming mode against the simulated ECU
//!
//! Run with: cargo test -p gmlan-tests --test programming_test

use example_ecu::config::FaultConfig;
use example_ecu::SimConfig;
use gmlan::gmlan::FieldWidth;
use gmlan::{EcuFamily, EventCategory, ServiceError};
use gmlan_tests::TestHarness;
use pretty_assertions::assert_eq;
use rstest::rstest;

// =============================================================================
// Memory reads
// =============================================================================

#[rstest]
#[case(EcuFamily::E38, 0x0000, 0x1000)]
#[case(EcuFamily::E67, 0x2_0000, 0x150)]
#[case(EcuFamily::T43, 0x0100, 0x0201)]
fn paged_read_matches_flash(#[case] family: EcuFamily, #[case] address: u32, #[case] length: u32) {
    let mut harness = TestHarness::new(family).expect("Failed to setup test harness");
    let data = harness.session.read_memory(address, length).unwrap();
    assert_eq!(Some(data), harness.ecu().memory(address, length as usize));

    // one progress event per block
    let blocks = (length as usize).div_ceil(0x80);
    assert_eq!(harness.events.messages(EventCategory::MemoryAccess).len(), blocks);
}

#[test]
fn single_block_reads() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    let data = harness
        .session
        .read_memory_by_address_32_16(0x2_0140, 4)
        .unwrap();
    assert_eq!(data, vec![0x00, 0x02, 0x00, 0x00]);

    // an E38 decodes four address bytes, so a 24-bit request is malformed
    let err = harness
        .session
        .read_memory_by_address_24_16(0x2_0140, 4)
        .unwrap_err();
    assert_eq!(err.negative_code(), Some(0x12));
}

#[test]
fn failing_block_aborts_the_read() {
    let mut harness = TestHarness::with_sim_config(SimConfig {
        faults: FaultConfig {
            fail_read_address: Some(0x1080),
            ..FaultConfig::default()
        },
        ..SimConfig::for_family(EcuFamily::E38)
    })
    .expect("Failed to setup test harness");

    let err = harness.session.read_memory(0x1000, 0x100).unwrap_err();
    assert_eq!(err.negative_code(), Some(0x31));

    let events = harness.events.messages(EventCategory::MemoryAccess);
    assert_eq!(events.len(), 2);
    assert!(events[0].starts_with("Read 0x80 bytes at 0x001000"));
    assert!(events[1].contains("failed"));
}

#[test]
fn read_past_flash_end_is_rejected() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    let size = harness.ecu().flash_size() as u32;
    let err = harness.session.read_memory(size - 0x10, 0x20).unwrap_err();
    assert_eq!(err.negative_code(), Some(0x31));
}

#[test]
fn read_outside_address_space_never_reaches_the_bus() {
    let mut harness = TestHarness::new(EcuFamily::T43).expect("Failed to setup test harness");
    let err = harness
        .session
        .read_memory_paged(FieldWidth::Bits24, 0xFF_FFF0, 0x20, 0x10)
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
    assert_eq!(harness.ecu().requests_handled(), 0);
}

#[test]
fn generic_modules_do_not_read_memory() {
    let mut harness = TestHarness::new(EcuFamily::Generic).expect("Failed to setup test harness");
    let err = harness.session.read_memory(0, 0x10).unwrap_err();
    assert_eq!(err.negative_code(), Some(0x11));
}

// =============================================================================
// Download
// =============================================================================

#[test]
fn download_transfer_and_execute() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    harness.unlock().unwrap();

    harness.session.programming_mode(0x01).unwrap();
    harness.session.programming_mode(0x03).unwrap();
    assert!(harness.ecu().programming_enabled());

    let routine: Vec<u8> = (0..0x200u32).map(|i| (i % 251) as u8).collect();
    harness.session.request_download(0x200, 32, 0x00).unwrap();
    harness.session.transfer_data(&routine, 0x4000, Some(0xF0), true).unwrap();

    assert_eq!(harness.ecu().downloaded_bytes(), Some(0x200));
    assert_eq!(harness.ecu().memory(0x4000, 0x200), Some(routine));
    assert_eq!(harness.ecu().executed_at(), Some(0x4000));

    let events = harness.events.messages(EventCategory::Programming);
    assert!(events.iter().any(|m| m == "Download of 0x200 bytes accepted"));
    // 0x200 bytes in 0xF0-byte blocks
    assert_eq!(events.iter().filter(|m| m.starts_with("Transferred")).count(), 3);
    assert!(events.iter().any(|m| m == "Execute requested at 0x004000"));
}

#[test]
fn configured_transfer_block_size_splits_the_download() {
    let sim = SimConfig::for_family(EcuFamily::E38);
    let mut harness = TestHarness::build(sim, Default::default(), |config| {
        config.services.transfer_block_size = 0x80;
    })
    .expect("Failed to setup test harness");
    harness.unlock().unwrap();

    let routine = vec![0x5A; 0x1C0];
    harness.session.request_download(0x1C0, 16, 0x00).unwrap();
    harness.session.transfer_data(&routine, 0x4000, None, false).unwrap();
    assert_eq!(harness.ecu().memory(0x4000, 0x1C0), Some(routine));

    let blocks: Vec<String> = harness
        .events
        .messages(EventCategory::Programming)
        .into_iter()
        .filter(|m| m.starts_with("Transferred"))
        .collect();
    assert_eq!(
        blocks,
        vec![
            "Transferred 0x80 bytes to 0x004000",
            "Transferred 0x80 bytes to 0x004080",
            "Transferred 0x80 bytes to 0x004100",
            "Transferred 0x40 bytes to 0x004180",
        ]
    );
}

#[test]
fn download_requires_security_access() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    let err = harness.session.request_download(0x100, 16, 0x00).unwrap_err();
    assert_eq!(err.negative_code(), Some(0x33));
    assert_eq!(harness.events.messages(EventCategory::Programming).len(), 1);
}

#[test]
fn transfer_beyond_announced_size_is_rejected() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    harness.unlock().unwrap();
    harness.session.request_download(0x10, 16, 0x00).unwrap();

    let err = harness
        .session
        .transfer_data(&[0xAA; 0x20], 0x4000, Some(0x20), false)
        .unwrap_err();
    assert_eq!(err.negative_code(), Some(0x75));
}

#[rstest]
#[case(8, 0x10)]
#[case(16, 0x1_0000)]
fn download_size_must_fit_the_width(#[case] bits: u8, #[case] size: u32) {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    let err = harness.session.request_download(size, bits, 0x00).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
    assert_eq!(harness.ecu().requests_handled(), 0);
}

#[test]
fn transmission_modules_are_not_programmable() {
    let mut harness = TestHarness::new(EcuFamily::T43).expect("Failed to setup test harness");
    let err = harness.session.programming_mode(0x01).unwrap_err();
    assert_eq!(err.negative_code(), Some(0x11));
}

// =============================================================================
// Programming mode
// =============================================================================

#[test]
fn enable_without_request_is_ignored() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    harness.session.programming_mode(0x03).unwrap();
    assert!(!harness.ecu().programming_enabled());
}

#[test]
fn answered_enable_is_tolerated() {
    let mut harness = TestHarness::with_sim_config(SimConfig {
        faults: FaultConfig {
            answer_silent_requests: true,
            ..FaultConfig::default()
        },
        ..SimConfig::for_family(EcuFamily::E38)
    })
    .expect("Failed to setup test harness");

    harness.session.programming_mode(0x02).unwrap();
    harness.session.programming_mode(0x03).unwrap();
    assert!(harness.ecu().programming_enabled());

    let events = harness.events.messages(EventCategory::Programming);
    assert!(events
        .iter()
        .any(|m| m.starts_with("Unexpected positive response to service 0xA5")));
}

#[test]
fn unknown_programming_level_is_rejected_locally() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    let err = harness.session.programming_mode(0x07).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
    assert_eq!(harness.ecu().requests_handled(), 0);
}
