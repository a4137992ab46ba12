//! Segmentation across the virtual bus
//!
//! Run with: cargo test -p gmlan-tests --test segmentation_test

use std::sync::Arc;

use example_ecu::{SimConfig, VirtualBus};
use gmlan::isotp::{TransferBuffers, MAX_MESSAGE_LEN};
use gmlan::transport::mock::MockTransport;
use gmlan::{
    EcuFamily, EventCategory, IsoTpEngine, IsoTpSettings, NullSink, ServiceError, TransferError,
};
use gmlan_tests::TestHarness;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

// =============================================================================
// Round trips
// =============================================================================

/// Write an identifier of `len` bytes, then read it back
///
/// The write request is 2 + len bytes and the read response 2 + len bytes,
/// so the grid covers single frames, the first multi-frame size and the
/// 4095-byte maximum in both directions.
#[rstest]
#[case(1)]
#[case(5)]
#[case(6)]
#[case(12)]
#[case(13)]
#[case(62)]
#[case(255)]
#[case(1000)]
#[case(4093)]
fn identifier_round_trip(#[case] len: usize) {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    harness.unlock().expect("unlock");

    let value = pattern(len);
    harness.session.write_identifier(0xA0, &value).expect("write");
    assert_eq!(harness.ecu().identifier(0xA0), Some(value.clone()));
    assert_eq!(harness.session.read_identifier(0xA0).expect("read"), value);
}

/// Every representable length, sender frames replayed into a receiver
#[test]
fn every_length_reassembles_to_the_original_payload() {
    let settings = IsoTpSettings::default();
    for len in 1..=MAX_MESSAGE_LEN {
        let payload = pattern(len);

        let tx_transport = MockTransport::new();
        let tx_handle = tx_transport.handle();
        tx_handle.push_frame(settings.rx_id, &[0x30, 0x00, 0x00]);
        let mut sender = IsoTpEngine::new(tx_transport, settings.clone(), Arc::new(NullSink));
        sender
            .send_message(&payload)
            .unwrap_or_else(|e| panic!("send of {} bytes failed: {}", len, e));

        let rx_transport = MockTransport::new();
        let rx_handle = rx_transport.handle();
        for frame in tx_handle.sent() {
            rx_handle.push_frame(frame.id, frame.data());
        }
        let mut receiver = IsoTpEngine::new(rx_transport, settings.reversed(), Arc::new(NullSink));
        let mut out = vec![0u8; MAX_MESSAGE_LEN];
        let got = receiver
            .receive_message(&mut out)
            .unwrap_or_else(|e| panic!("receive of {} bytes failed: {}", len, e));

        assert_eq!(got, len);
        assert_eq!(&out[..got], payload.as_slice(), "payload of {} bytes", len);
    }
}

#[test]
fn oversized_messages_are_rejected_before_sending() {
    let bus = VirtualBus::with_capture();
    let mut harness = TestHarness::build(SimConfig::for_family(EcuFamily::E38), bus, |_| {})
        .expect("Failed to setup test harness");
    harness.unlock().expect("unlock");
    let before = harness.bus.captured().len();
    harness.events.clear();

    // 2 + 4094 bytes exceeds the 12-bit length
    let result = harness.session.write_identifier(0xA0, &pattern(4094));
    assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));

    let result = harness.session.engine_mut().send_message(&pattern(4096));
    assert_eq!(result, Err(TransferError::LengthOutOfRange(4096)));

    assert_eq!(harness.bus.captured().len(), before);
    assert_eq!(harness.events.messages(EventCategory::QueryingEcuTypeInfo).len(), 1);
    assert_eq!(harness.events.messages(EventCategory::TransferLayer).len(), 1);
}

// =============================================================================
// Frame layout on the wire
// =============================================================================

#[test]
fn consecutive_frames_wrap_sequence_numbers() {
    let bus = VirtualBus::with_capture();
    let mut harness = TestHarness::build(SimConfig::for_family(EcuFamily::E38), bus, |_| {})
        .expect("Failed to setup test harness");
    harness.unlock().expect("unlock");
    let start = harness.bus.captured().len();

    // 2 + 198 = 200 bytes: first frame with 6, then 28 consecutive frames
    harness
        .session
        .write_identifier(0xA1, &pattern(198))
        .expect("write");

    let frames = harness.bus.captured();
    let request: Vec<_> = frames[start..].iter().filter(|f| f.id == 0x7E0).collect();
    assert_eq!(&request[0].data()[..2], &[0x10, 200]);
    assert_eq!(request.len(), 1 + 28);

    let sequence: Vec<u8> = request[1..].iter().map(|f| f.byte(0)).collect();
    let expected: Vec<u8> = (1..=28u8).map(|n| 0x20 | (n % 16)).collect();
    assert_eq!(sequence, expected);
    assert!(request.iter().all(|f| f.len() == 8), "frames are padded to 8 bytes");

    // the ECU granted the transfer with a single flow-control frame
    let flow_control: Vec<_> = frames[start..]
        .iter()
        .filter(|f| f.id == 0x7E8 && f.byte(0) >> 4 == 0x3)
        .collect();
    assert_eq!(flow_control.len(), 1);
    assert_eq!(&flow_control[0].data()[..3], &[0x30, 0x00, 0x00]);
}

#[test]
fn engine_transfer_returns_the_raw_response() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    let mut buffers = TransferBuffers::new();

    let len = buffers.load(&[0x1A, 0x90]);
    let got = harness
        .session
        .engine_mut()
        .transfer(&mut buffers, len)
        .expect("transfer");
    let mut expected = vec![0x5A, 0x90];
    expected.extend_from_slice(b"1G1ZT53806F109149");
    assert_eq!(buffers.received(got), expected.as_slice());
}

#[rstest]
#[case(0x00)]
#[case(0x05)]
#[case(0xF3)]
fn simulator_separation_time_is_honoured(#[case] separation_time: u8) {
    let sim = SimConfig {
        rx_separation_time: separation_time,
        ..SimConfig::for_family(EcuFamily::E38)
    };
    let bus = VirtualBus::with_capture();
    let mut harness =
        TestHarness::build(sim, bus, |_| {}).expect("Failed to setup test harness");
    harness.unlock().expect("unlock");

    harness.session.write_identifier(0xA2, &pattern(40)).expect("write");
    let advertised: Vec<u8> = harness
        .bus
        .captured()
        .iter()
        .filter(|f| f.id == 0x7E8 && f.byte(0) == 0x30)
        .map(|f| f.byte(2))
        .collect();
    assert_eq!(advertised, vec![separation_time]);
}

#[test]
fn family_can_ids_reach_the_simulator() {
    // T43 answers on 0x7E2/0x7EA, picked up from the family
    let mut harness = TestHarness::new(EcuFamily::T43).expect("Failed to setup test harness");
    assert_eq!(harness.session.read_identifier_u32(0xDF).expect("read"), 10000);
}
