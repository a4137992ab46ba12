//! Diagnostic services against the simulated ECU
//!
//! Run with: cargo test -p gmlan-tests --test services_test

use example_ecu::config::{DtcDef, FaultConfig, InjectedNrc, SecurityConfig};
use example_ecu::SimConfig;
use gmlan::gmlan::{translate_error_code, GM_IDENTIFIERS};
use gmlan::{
    EcuFamily, EventCategory, FixedKey, ProgrammedState, ProtocolVariant, SecurityOutcome,
    ServiceError, TransferError,
};
use gmlan_tests::TestHarness;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn with_faults(faults: FaultConfig) -> TestHarness {
    TestHarness::with_sim_config(SimConfig {
        faults,
        ..SimConfig::for_family(EcuFamily::E38)
    })
    .expect("Failed to setup test harness")
}

// =============================================================================
// Identifiers
// =============================================================================

#[test]
fn reads_vin_and_odometer() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    assert_eq!(
        harness.session.read_identifier_text(0x90).unwrap(),
        Some("1G1ZT53806F109149".to_string())
    );
    assert_eq!(harness.session.read_identifier_u32(0xDF).unwrap(), 10000);
}

#[test]
fn identifier_list_marks_unanswered_entries() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    let readings = harness.session.read_did_list(GM_IDENTIFIERS);
    assert_eq!(readings.len(), GM_IDENTIFIERS.len());

    let value = |id: u8| {
        readings
            .iter()
            .find(|r| r.descriptor.id == id)
            .map(|r| r.display_value().to_string())
    };
    assert_eq!(value(0x90).as_deref(), Some("1G1ZT53806F109149"));
    assert_eq!(value(0xDF).as_deref(), Some("156"));
    assert_eq!(value(0x98).as_deref(), Some("(could not read)"));

    // one event per identifier, whether or not it answered
    let events = harness.events.messages(EventCategory::QueryingEcuTypeInfo);
    assert_eq!(events.len(), GM_IDENTIFIERS.len());
    assert!(events.contains(&"Repair shop code (0x98): (could not read)".to_string()));
}

#[test]
fn full_scan_returns_only_answered_identifiers() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    let readings = harness.session.scan_all_identifiers();

    let ids: Vec<u8> = readings.iter().map(|r| r.descriptor.id).collect();
    assert_eq!(ids, vec![0x90, 0x92, 0x99, 0xB4, 0xC0, 0xC1, 0xC2, 0xCB, 0xCC, 0xDF]);
    assert!(readings.iter().all(|r| r.value.is_some()));
}

#[test]
fn write_requires_security_access() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    let err = harness.session.write_identifier(0x98, b"SHOP01").unwrap_err();
    assert_eq!(err.negative_code(), Some(0x33));

    harness.unlock().unwrap();
    harness.session.write_identifier(0x98, b"SHOP01").unwrap();
    assert_eq!(
        harness.session.read_identifier_text(0x98).unwrap(),
        Some("SHOP01".to_string())
    );
}

// =============================================================================
// Security access
// =============================================================================

#[test]
fn seed_key_unlocks_then_reports_already_unlocked() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    assert_eq!(harness.unlock().unwrap(), SecurityOutcome::Unlocked);
    assert!(harness.ecu().is_unlocked());

    assert_eq!(harness.unlock().unwrap(), SecurityOutcome::AlreadyUnlocked);
    let events = harness.events.messages(EventCategory::SecurityAccess);
    assert!(events.iter().any(|m| m.contains("already unlocked")));
}

#[test]
fn wrong_key_is_rejected() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    let ecu = harness.ecu_handle();
    let wrong = move |seed: &[u8], _: EcuFamily, _: u8, _: u8| {
        let mut key = ecu.expected_key(seed);
        key[0] ^= 0xFF;
        Some(key)
    };

    let err = harness
        .session
        .security_access(EcuFamily::E38, 0x01, 0, &wrong)
        .unwrap_err();
    assert_eq!(
        err,
        ServiceError::NegativeResponse {
            service: 0x27,
            code: 0x35,
            description: translate_error_code(0x35),
        }
    );
    assert!(!harness.ecu().is_unlocked());
    assert_eq!(harness.events.messages(EventCategory::SecurityAccess).len(), 1);
}

#[test]
fn always_unlocked_module_sends_zero_seed() {
    let mut harness = TestHarness::with_sim_config(SimConfig {
        security: SecurityConfig {
            always_unlocked: true,
            ..SecurityConfig::default()
        },
        ..SimConfig::for_family(EcuFamily::E38)
    })
    .expect("Failed to setup test harness");

    // the key function is never consulted for a zero seed
    let outcome = harness
        .session
        .security_access(EcuFamily::E38, 0x01, 0, &FixedKey(Vec::new()))
        .unwrap();
    assert_eq!(outcome, SecurityOutcome::AlreadyUnlocked);
}

#[test]
fn unsupported_level_is_a_negative_response() {
    let mut harness = TestHarness::new(EcuFamily::Generic).expect("Failed to setup test harness");
    let err = harness
        .session
        .security_access(EcuFamily::Generic, 0x01, 0, &FixedKey(vec![0x12, 0x34]))
        .unwrap_err();
    assert_eq!(err.negative_code(), Some(0x12));
}

// =============================================================================
// Trouble codes and state
// =============================================================================

#[test]
fn failure_records_and_clear() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    let records = harness.session.read_failure_record_identifiers().unwrap();
    let codes: Vec<String> = records.iter().map(|r| r.code_string()).collect();
    assert_eq!(codes, vec!["P0420", "U0100"]);
    assert_eq!(records[0].number, 1);
    assert_eq!(records[0].failure_type, 0x01);

    harness.session.clear_diagnostic_information().unwrap();
    assert_eq!(harness.ecu().stored_records(), 0);
    assert!(harness.session.read_failure_record_identifiers().unwrap().is_empty());
}

#[test]
fn configured_records_are_reported() {
    let mut harness = TestHarness::with_sim_config(SimConfig {
        dtcs: Some(vec![DtcDef::new("C1234", 0x07), DtcDef::new("B0001", 0x00)]),
        ..SimConfig::for_family(EcuFamily::E67)
    })
    .expect("Failed to setup test harness");
    let codes: Vec<String> = harness
        .session
        .read_failure_record_identifiers()
        .unwrap()
        .iter()
        .map(|r| r.code_string())
        .collect();
    assert_eq!(codes, vec!["C1234", "B0001"]);
}

#[rstest]
#[case(0x00, ProgrammedState::FullyProgrammed)]
#[case(0x02, ProgrammedState::MissingCalibration)]
#[case(0x53, ProgrammedState::BootMemoryFault)]
#[case(0x77, ProgrammedState::Unknown(0x77))]
fn programmed_state_is_decoded(#[case] raw: u8, #[case] expected: ProgrammedState) {
    let mut harness = TestHarness::with_sim_config(SimConfig {
        programmed_state: raw,
        ..SimConfig::for_family(EcuFamily::E38)
    })
    .expect("Failed to setup test harness");
    assert_eq!(harness.session.report_programmed_state().unwrap(), expected);
}

#[test]
fn session_control_services() {
    let mut harness = TestHarness::new(EcuFamily::E38).expect("Failed to setup test harness");
    harness.session.initiate_diagnostic_operation(0x02).unwrap();
    harness.session.disable_normal_communication().unwrap();
    harness.session.tester_present().unwrap();
    assert_eq!(harness.ecu().diagnostic_mode(), Some(0x02));
    assert!(harness.ecu().normal_communication_disabled());

    harness.unlock().unwrap();
    harness.session.return_to_normal().unwrap();
    assert!(!harness.ecu().is_unlocked());
    assert!(!harness.ecu().normal_communication_disabled());
}

// =============================================================================
// Fault injection
// =============================================================================

#[test]
fn response_pending_frames_are_skipped() {
    let mut harness = with_faults(FaultConfig {
        response_pending: 2,
        ..FaultConfig::default()
    });
    assert_eq!(harness.session.read_identifier_u32(0xDF).unwrap(), 10000);
    assert!(harness.events.events().is_empty());
}

#[test]
fn endless_response_pending_exhausts_retries() {
    let mut harness = with_faults(FaultConfig {
        response_pending: 41,
        ..FaultConfig::default()
    });
    let err = harness.session.tester_present().unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Transfer(TransferError::RetriesExhausted { attempts: 40, .. })
    ));
    // reported once, by the transfer layer
    assert_eq!(harness.events.messages(EventCategory::TransferLayer).len(), 1);
    assert!(harness.events.messages(EventCategory::Diagnostics).is_empty());
}

#[test]
fn injected_negative_response_is_translated() {
    let mut harness = with_faults(FaultConfig {
        negative_responses: vec![InjectedNrc {
            service: 0x1A,
            code: 0x22,
        }],
        ..FaultConfig::default()
    });
    let err = harness.session.read_identifier(0x90).unwrap_err();
    assert_eq!(
        err,
        ServiceError::NegativeResponse {
            service: 0x1A,
            code: 0x22,
            description: translate_error_code(0x22),
        }
    );
    let events = harness.events.messages(EventCategory::QueryingEcuTypeInfo);
    assert_eq!(events.len(), 1);
    assert!(events[0].contains("Conditions not correct"));
}

#[test]
fn kwp2000_sessions_use_their_own_error_table() {
    let sim = SimConfig {
        faults: FaultConfig {
            negative_responses: vec![InjectedNrc {
                service: 0x1A,
                code: 0x22,
            }],
            ..FaultConfig::default()
        },
        ..SimConfig::for_family(EcuFamily::E38)
    };
    let mut harness = TestHarness::build(sim, Default::default(), |config| {
        config.protocol = ProtocolVariant::Kwp2000;
    })
    .expect("Failed to setup test harness");

    match harness.session.read_identifier(0x90).unwrap_err() {
        ServiceError::NegativeResponse { code, description, .. } => {
            assert_eq!(code, 0x22);
            assert!(!description.is_empty());
        }
        other => panic!("expected a negative response, got {other:?}"),
    }
}

#[test]
fn silent_service_times_out() {
    let mut harness = with_faults(FaultConfig {
        silent_services: vec![0x3E],
        ..FaultConfig::default()
    });
    assert_eq!(
        harness.session.tester_present(),
        Err(ServiceError::Transfer(TransferError::NoResponse))
    );
    assert_eq!(harness.events.messages(EventCategory::TransferLayer).len(), 1);
    assert!(harness.events.messages(EventCategory::Diagnostics).is_empty());

    // the link is still usable afterwards
    assert_eq!(harness.session.read_identifier_u32(0xDF).unwrap(), 10000);
}
