// Oracle Engine Tests
// Registration, request routing and status consensus

use flightsurety::config::{ether, MarketConfig};
use flightsurety::flight::FlightStatus;
use flightsurety::identity::Address;
use flightsurety::oracle::{
    routing_index, OracleEngine, OracleError, RequestKey, ResponseOutcome, ScriptedIndexSource,
    TicketKind,
};

const FLIGHT: &str = "CODE123";

fn airline() -> Address {
    Address::from_label("airline-0")
}

fn oracle(n: usize) -> Address {
    Address::from_label(&format!("oracle-{}", n))
}

/// Timestamp whose request routes to `target`
fn timestamp_for(target: u8) -> u64 {
    (1_700_000_000u64..)
        .find(|ts| routing_index(&airline(), FLIGHT, *ts) == target)
        .unwrap()
}

/// Engine with `count` oracles that all serve index 5, plus one oracle
/// (the last) that only serves other indexes
fn engine_serving_five(count: usize) -> (OracleEngine, MarketConfig) {
    let config = MarketConfig::default();
    let mut engine = OracleEngine::new();
    let mut source = ScriptedIndexSource::new(Vec::<u8>::new());
    for _ in 0..count {
        source.push_set([2, 5, 8]);
    }
    source.push_set([0, 1, 3]);
    for n in 0..=count {
        engine
            .register_oracle(oracle(n), config.registration_fee, &mut source, &config)
            .unwrap();
    }
    (engine, config)
}

// ============================================================================
// REGISTRATION
// ============================================================================

#[test]
fn test_register_assigns_indexes() {
    let config = MarketConfig::default();
    let mut engine = OracleEngine::new();
    let mut source = ScriptedIndexSource::new([2, 5, 8]);

    let indexes = engine
        .register_oracle(oracle(0), ether(1), &mut source, &config)
        .unwrap();
    assert_eq!(indexes, [2, 5, 8]);
    assert_eq!(engine.get_my_indexes(&oracle(0)), Ok([2, 5, 8]));
    assert_eq!(engine.oracles().len(), 1);
}

#[test]
fn test_register_requires_fee() {
    let config = MarketConfig::default();
    let mut engine = OracleEngine::new();
    let mut source = ScriptedIndexSource::new([2, 5, 8]);

    let err = engine
        .register_oracle(oracle(0), ether(1) - 1, &mut source, &config)
        .unwrap_err();
    assert_eq!(
        err,
        OracleError::InsufficientFunds {
            provided: ether(1) - 1,
            required: ether(1),
        }
    );
    assert!(engine.oracles().is_empty());
    // Failed registration consumed no indexes
    assert_eq!(source.remaining(), 3);
}

#[test]
fn test_register_twice_is_duplicate() {
    let config = MarketConfig::default();
    let mut engine = OracleEngine::new();
    let mut source = ScriptedIndexSource::new([2, 5, 8, 1, 1, 1]);
    engine
        .register_oracle(oracle(0), ether(1), &mut source, &config)
        .unwrap();

    assert_eq!(
        engine.register_oracle(oracle(0), ether(1), &mut source, &config),
        Err(OracleError::DuplicateOracle(oracle(0)))
    );
    assert_eq!(engine.get_my_indexes(&oracle(0)), Ok([2, 5, 8]));
}

#[test]
fn test_indexes_of_unknown_oracle() {
    let engine = OracleEngine::new();
    assert_eq!(
        engine.get_my_indexes(&oracle(3)),
        Err(OracleError::UnknownOracle(oracle(3)))
    );
}

// ============================================================================
// REQUESTS
// ============================================================================

#[test]
fn test_fetch_opens_request_with_routing_index() {
    let (mut engine, config) = engine_serving_five(3);
    let ts = timestamp_for(5);

    let ticket = engine.fetch_flight_status(airline(), FLIGHT, ts, 10, &config);
    assert_eq!(ticket.kind, TicketKind::Opened);
    assert_eq!(ticket.routing_index, 5);
    assert!(ticket.needs_broadcast());

    let request = engine.request(&ticket.key).unwrap();
    assert!(request.is_open());
    assert_eq!(request.opened_at(), 10);
    assert_eq!(engine.open_request_count(), 1);
}

#[test]
fn test_response_without_request_is_unknown() {
    let (mut engine, config) = engine_serving_five(3);
    let ts = timestamp_for(5);

    let err = engine
        .submit_oracle_response(oracle(0), 5, airline(), FLIGHT, ts, 20, 10, &config)
        .unwrap_err();
    assert_eq!(err, OracleError::UnknownRequest(RequestKey::new(airline(), FLIGHT, ts)));
}

#[test]
fn test_response_with_wrong_index_is_unknown_request() {
    let (mut engine, config) = engine_serving_five(3);
    let ts = timestamp_for(5);
    engine.fetch_flight_status(airline(), FLIGHT, ts, 10, &config);

    let err = engine
        .submit_oracle_response(oracle(0), 2, airline(), FLIGHT, ts, 20, 10, &config)
        .unwrap_err();
    assert!(matches!(err, OracleError::UnknownRequest(_)));
}

#[test]
fn test_unassigned_oracle_rejected() {
    let (mut engine, config) = engine_serving_five(3);
    let ts = timestamp_for(5);
    engine.fetch_flight_status(airline(), FLIGHT, ts, 10, &config);

    // oracle 3 holds [0, 1, 3]
    let err = engine
        .submit_oracle_response(oracle(3), 5, airline(), FLIGHT, ts, 20, 10, &config)
        .unwrap_err();
    assert_eq!(err, OracleError::IndexMismatch { oracle: oracle(3), index: 5 });
}

#[test]
fn test_unregistered_oracle_rejected() {
    let (mut engine, config) = engine_serving_five(3);
    let ts = timestamp_for(5);
    engine.fetch_flight_status(airline(), FLIGHT, ts, 10, &config);

    let err = engine
        .submit_oracle_response(oracle(99), 5, airline(), FLIGHT, ts, 20, 10, &config)
        .unwrap_err();
    assert_eq!(err, OracleError::UnknownOracle(oracle(99)));
}

// ============================================================================
// CONSENSUS
// ============================================================================

#[test]
fn test_three_matching_reports_finalize() {
    let (mut engine, config) = engine_serving_five(4);
    let ts = timestamp_for(5);
    let ticket = engine.fetch_flight_status(airline(), FLIGHT, ts, 10, &config);

    let mut outcomes = Vec::new();
    for n in 0..3 {
        outcomes.push(
            engine
                .submit_oracle_response(oracle(n), 5, airline(), FLIGHT, ts, 20, 10, &config)
                .unwrap(),
        );
    }
    assert_eq!(
        outcomes,
        vec![
            ResponseOutcome::Recorded { status: FlightStatus::LateAirline, reports: 1 },
            ResponseOutcome::Recorded { status: FlightStatus::LateAirline, reports: 2 },
            ResponseOutcome::Finalized { status: FlightStatus::LateAirline, reports: 3 },
        ]
    );

    let request = engine.request(&ticket.key).unwrap();
    assert_eq!(request.finalized_status(), Some(FlightStatus::LateAirline));
    assert_eq!(engine.open_request_count(), 0);

    // A fourth, disagreeing report changes nothing
    let late = engine
        .submit_oracle_response(oracle(3), 5, airline(), FLIGHT, ts, 10, 11, &config)
        .unwrap();
    assert_eq!(late, ResponseOutcome::Ignored { finalized: FlightStatus::LateAirline });
    assert_eq!(
        engine.request(&ticket.key).unwrap().finalized_status(),
        Some(FlightStatus::LateAirline)
    );
}

#[test]
fn test_split_reports_do_not_finalize() {
    let (mut engine, config) = engine_serving_five(6);
    let ts = timestamp_for(5);
    let ticket = engine.fetch_flight_status(airline(), FLIGHT, ts, 10, &config);

    for (n, code) in [(0, 10), (1, 20), (2, 10), (3, 20)] {
        let outcome = engine
            .submit_oracle_response(oracle(n), 5, airline(), FLIGHT, ts, code, 10, &config)
            .unwrap();
        assert!(matches!(outcome, ResponseOutcome::Recorded { .. }));
    }
    let request = engine.request(&ticket.key).unwrap();
    assert!(request.is_open());
    assert_eq!(request.response_count(), 4);
    assert_eq!(request.reports_for(FlightStatus::OnTime), 2);
    assert_eq!(request.reports_for(FlightStatus::LateAirline), 2);

    // First bucket to reach three wins
    let outcome = engine
        .submit_oracle_response(oracle(4), 5, airline(), FLIGHT, ts, 10, 10, &config)
        .unwrap();
    assert_eq!(outcome, ResponseOutcome::Finalized { status: FlightStatus::OnTime, reports: 3 });
}

#[test]
fn test_oracle_reports_once_per_request() {
    let (mut engine, config) = engine_serving_five(3);
    let ts = timestamp_for(5);
    engine.fetch_flight_status(airline(), FLIGHT, ts, 10, &config);

    engine
        .submit_oracle_response(oracle(0), 5, airline(), FLIGHT, ts, 20, 10, &config)
        .unwrap();
    for code in [20, 10] {
        let err = engine
            .submit_oracle_response(oracle(0), 5, airline(), FLIGHT, ts, code, 10, &config)
            .unwrap_err();
        assert!(matches!(err, OracleError::DuplicateResponse { .. }));
    }
}

#[test]
fn test_fetch_after_finalization_reports_status() {
    let (mut engine, config) = engine_serving_five(3);
    let ts = timestamp_for(5);
    engine.fetch_flight_status(airline(), FLIGHT, ts, 10, &config);
    for n in 0..3 {
        engine
            .submit_oracle_response(oracle(n), 5, airline(), FLIGHT, ts, 40, 10, &config)
            .unwrap();
    }

    let ticket = engine.fetch_flight_status(airline(), FLIGHT, ts, 20, &config);
    assert_eq!(ticket.kind, TicketKind::Finalized(FlightStatus::LateTechnical));
    assert!(!ticket.needs_broadcast());
}

#[test]
fn test_lower_threshold_from_config() {
    let (mut engine, _) = engine_serving_five(3);
    let config = MarketConfig::default().with_min_responses(1);
    let ts = timestamp_for(5);
    engine.fetch_flight_status(airline(), FLIGHT, ts, 10, &config);

    let outcome = engine
        .submit_oracle_response(oracle(0), 5, airline(), FLIGHT, ts, 50, 10, &config)
        .unwrap();
    assert_eq!(outcome, ResponseOutcome::Finalized { status: FlightStatus::LateOther, reports: 1 });
}

// ============================================================================
// EXPIRY
// ============================================================================

#[test]
fn test_expired_request_rejects_reports_and_reopens() {
    let (mut engine, _) = engine_serving_five(3);
    let config = MarketConfig::default().with_request_max_age(60);
    let ts = timestamp_for(5);
    engine.fetch_flight_status(airline(), FLIGHT, ts, 100, &config);
    engine
        .submit_oracle_response(oracle(0), 5, airline(), FLIGHT, ts, 20, 120, &config)
        .unwrap();

    let err = engine
        .submit_oracle_response(oracle(1), 5, airline(), FLIGHT, ts, 20, 161, &config)
        .unwrap_err();
    assert!(matches!(err, OracleError::UnknownRequest(_)));

    let ticket = engine.fetch_flight_status(airline(), FLIGHT, ts, 161, &config);
    assert_eq!(ticket.kind, TicketKind::Reopened);
    let request = engine.request(&ticket.key).unwrap();
    assert_eq!(request.response_count(), 0);
    assert_eq!(request.opened_at(), 161);

    // oracle 0 may report again on the fresh request
    engine
        .submit_oracle_response(oracle(0), 5, airline(), FLIGHT, ts, 20, 170, &config)
        .unwrap();
}

#[test]
fn test_sweep_drops_only_stale_open_requests() {
    let (mut engine, _) = engine_serving_five(3);
    let config = MarketConfig::default().with_request_max_age(60);
    let stale = timestamp_for(5);
    let finalized = (stale + 1..)
        .find(|ts| routing_index(&airline(), FLIGHT, *ts) == 5)
        .unwrap();

    engine.fetch_flight_status(airline(), FLIGHT, stale, 0, &config);
    engine.fetch_flight_status(airline(), FLIGHT, finalized, 0, &config);
    for n in 0..3 {
        engine
            .submit_oracle_response(oracle(n), 5, airline(), FLIGHT, finalized, 10, 30, &config)
            .unwrap();
    }
    engine.fetch_flight_status(airline(), "OTHER", 1, 100, &config);

    assert_eq!(engine.expire_stale_requests(100, &config), 1);
    assert!(engine.request(&RequestKey::new(airline(), FLIGHT, stale)).is_none());
    assert!(engine.request(&RequestKey::new(airline(), FLIGHT, finalized)).is_some());
    assert_eq!(engine.open_request_count(), 1);
}

#[test]
fn test_no_expiry_by_default() {
    let (mut engine, config) = engine_serving_five(3);
    let ts = timestamp_for(5);
    engine.fetch_flight_status(airline(), FLIGHT, ts, 0, &config);
    assert_eq!(engine.expire_stale_requests(u64::MAX, &config), 0);
    assert_eq!(
        engine.fetch_flight_status(airline(), FLIGHT, ts, u64::MAX, &config).kind,
        TicketKind::AlreadyOpen
    );
}
