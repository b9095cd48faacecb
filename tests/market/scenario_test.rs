// Market Scenario Tests
// End-to-end flows through the FlightSurety facade

use flightsurety::flight::FlightStatus;
use flightsurety::governance::{Admission, GovernanceError};
use flightsurety::identity::Address;
use flightsurety::insurance::InsuranceError;
use flightsurety::ledger::{LedgerEvent, ManualClock};
use flightsurety::oracle::{routing_index, OracleError, ResponseOutcome, ScriptedIndexSource, TicketKind};
use flightsurety::storage::SnapshotStore;
use flightsurety::{ether, FlightSurety, MarketConfig, MarketError};
use tempfile::TempDir;

const FLIGHT: &str = "FS100";
const START: u64 = 1_700_000_000;

fn owner() -> Address {
    Address::from_label("owner")
}

fn airline(n: usize) -> Address {
    Address::from_label(&format!("airline-{}", n))
}

fn oracle(n: usize) -> Address {
    Address::from_label(&format!("oracle-{}", n))
}

fn passenger(n: usize) -> Address {
    Address::from_label(&format!("passenger-{}", n))
}

/// Departure time whose status request routes to index 5
fn departure() -> u64 {
    (START..)
        .find(|ts| routing_index(&owner(), FLIGHT, *ts) == 5)
        .unwrap()
}

/// Market whose first four oracles hold [2, 5, 8] and fifth holds [0, 1, 3]
fn market() -> (FlightSurety, ManualClock) {
    let clock = ManualClock::new(START);
    let mut source = ScriptedIndexSource::new(Vec::<u8>::new());
    for _ in 0..4 {
        source.push_set([2, 5, 8]);
    }
    source.push_set([0, 1, 3]);

    let market = FlightSurety::builder(owner())
        .genesis_name("Airline 0")
        .clock(clock.clone())
        .index_source(source)
        .build()
        .unwrap();
    (market, clock)
}

/// Market with a funded genesis airline, one flight and five oracles
fn market_with_flight() -> (FlightSurety, ManualClock) {
    let (market, clock) = market();
    market.fund(owner(), ether(10)).unwrap();
    market
        .register_flight(owner(), FLIGHT, "Zurich", departure())
        .unwrap();
    for n in 0..5 {
        market.register_oracle(oracle(n), ether(1)).unwrap();
    }
    (market, clock)
}

fn report(market: &FlightSurety, n: usize, code: u8) -> Result<ResponseOutcome, MarketError> {
    market.submit_oracle_response(oracle(n), 5, owner(), FLIGHT, departure(), code)
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<LedgerEvent>) -> Vec<LedgerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ============================================================================
// GOVERNANCE
// ============================================================================

#[test]
fn test_genesis_airline_registered_on_creation() {
    let (market, _) = market();
    assert!(market.is_airline(&owner()));
    assert_eq!(market.airlines_count(), 1);
    assert_eq!(market.airline(&owner()).unwrap().name(), "Airline 0");
    assert!(market.is_operational());
}

#[test]
fn test_fifth_airline_requires_two_votes() {
    let (market, _) = market();
    market.fund(owner(), ether(10)).unwrap();

    for n in 1..4 {
        let admission = market
            .register_airline(owner(), airline(n), &format!("Airline {}", n))
            .unwrap();
        assert!(admission.is_admitted());
        market.fund(airline(n), ether(10)).unwrap();
    }
    assert_eq!(market.airlines_count(), 4);

    let first = market.register_airline(owner(), airline(4), "Airline 4").unwrap();
    assert_eq!(first, Admission::Pending { votes: 1, required: 2 });
    assert!(!market.is_airline(&airline(4)));
    assert_eq!(market.votes_for(&airline(4)), 1);

    let repeat = market.register_airline(owner(), airline(4), "Airline 4");
    assert!(matches!(
        repeat,
        Err(MarketError::Governance(GovernanceError::DuplicateVote { .. }))
    ));

    let second = market.register_airline(airline(1), airline(4), "Airline 4").unwrap();
    assert_eq!(second, Admission::Admitted { votes: 2 });
    assert!(market.is_airline(&airline(4)));
    assert_eq!(market.airlines_count(), 5);
}

#[test]
fn test_unfunded_genesis_cannot_propose() {
    let (market, _) = market();
    let err = market
        .register_airline(owner(), airline(1), "Airline 1")
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::Governance(GovernanceError::NotAuthorized(_))
    ));
    assert!(!market.is_airline(&airline(1)));
}

#[test]
fn test_funding_fills_treasury() {
    let (market, _) = market();
    assert_eq!(market.fund(owner(), ether(10)).unwrap(), ether(10));
    assert_eq!(market.treasury_balance(), ether(10));
}

#[test]
fn test_apply_then_fund() {
    let (market, _) = market();
    market.apply_airline(airline(1), "Airline 1").unwrap();
    market.fund(airline(1), ether(10)).unwrap();

    let record = market.airline(&airline(1)).unwrap();
    assert_eq!(record.funds(), ether(10));
    assert!(!market.is_airline(&airline(1)));
}

// ============================================================================
// ORACLE CONSENSUS
// ============================================================================

#[test]
fn test_consensus_settles_flight_and_ignores_late_report() {
    let (market, _) = market_with_flight();
    assert_eq!(market.get_my_indexes(&oracle(0)).unwrap(), [2, 5, 8]);

    let ticket = market
        .fetch_flight_status(owner(), FLIGHT, departure())
        .unwrap();
    assert_eq!(ticket.routing_index, 5);
    assert_eq!(ticket.kind, TicketKind::Opened);

    for n in 0..2 {
        assert!(matches!(report(&market, n, 20).unwrap(), ResponseOutcome::Recorded { .. }));
    }
    assert_eq!(market.view_flight_status(FLIGHT, owner()), 0);

    assert_eq!(
        report(&market, 2, 20).unwrap(),
        ResponseOutcome::Finalized { status: FlightStatus::LateAirline, reports: 3 }
    );
    assert_eq!(market.view_flight_status(FLIGHT, owner()), 20);

    assert_eq!(
        report(&market, 3, 10).unwrap(),
        ResponseOutcome::Ignored { finalized: FlightStatus::LateAirline }
    );
    assert_eq!(market.view_flight_status(FLIGHT, owner()), 20);
}

#[test]
fn test_unassigned_oracle_rejected() {
    let (market, _) = market_with_flight();
    market.fetch_flight_status(owner(), FLIGHT, departure()).unwrap();

    let err = report(&market, 4, 20).unwrap_err();
    assert!(matches!(
        err,
        MarketError::Oracle(OracleError::IndexMismatch { index: 5, .. })
    ));
}

#[test]
fn test_oracle_fee_enforced() {
    let (market, _) = market();
    let err = market.register_oracle(oracle(0), ether(1) / 2).unwrap_err();
    assert!(matches!(
        err,
        MarketError::Oracle(OracleError::InsufficientFunds { .. })
    ));
    assert_eq!(market.treasury_balance(), 0);
}

#[test]
fn test_status_request_event_carries_routing_index() {
    let (market, _) = market_with_flight();
    let mut rx = market.subscribe();

    market.fetch_flight_status(owner(), FLIGHT, departure()).unwrap();
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);

    let request = events[0].as_oracle_request().unwrap();
    assert_eq!(request.routing_index, 5);
    assert_eq!(request.airline, owner());
    assert_eq!(request.flight, FLIGHT);
    assert_eq!(request.timestamp, departure());
}

// ============================================================================
// INSURANCE
// ============================================================================

#[test]
fn test_late_airline_credits_and_pays() {
    let (market, _) = market_with_flight();
    let balance_before = market.treasury_balance();

    let policy = market.buy(passenger(0), owner(), FLIGHT, ether(1)).unwrap();
    assert_eq!(policy.amount(), ether(1));
    assert_eq!(market.treasury_balance(), balance_before + ether(1));
    assert_eq!(market.passengers_of(owner(), FLIGHT), vec![passenger(0)]);

    market.fetch_flight_status(owner(), FLIGHT, departure()).unwrap();
    for n in 0..3 {
        report(&market, n, 20).unwrap();
    }
    assert_eq!(market.get_credit_to_pay(&passenger(0)), ether(3) / 2);

    assert_eq!(market.pay(passenger(0)).unwrap(), ether(3) / 2);
    assert_eq!(market.get_credit_to_pay(&passenger(0)), 0);
    assert_eq!(market.disbursed_to(&passenger(0)), ether(3) / 2);
    assert_eq!(
        market.treasury_balance(),
        balance_before + ether(1) - ether(3) / 2
    );

    assert!(matches!(
        market.pay(passenger(0)),
        Err(MarketError::Insurance(InsuranceError::NothingOwed(_)))
    ));
}

#[test]
fn test_on_time_flight_credits_nothing() {
    let (market, _) = market_with_flight();
    market.buy(passenger(0), owner(), FLIGHT, ether(1)).unwrap();

    market.fetch_flight_status(owner(), FLIGHT, departure()).unwrap();
    for n in 0..3 {
        report(&market, n, 10).unwrap();
    }

    assert_eq!(market.flight(owner(), FLIGHT).unwrap().status(), FlightStatus::OnTime);
    assert_eq!(market.get_credit_to_pay(&passenger(0)), 0);
}

#[test]
fn test_weather_delay_credits_nothing() {
    let (market, _) = market_with_flight();
    market.buy(passenger(0), owner(), FLIGHT, ether(1)).unwrap();

    market.fetch_flight_status(owner(), FLIGHT, departure()).unwrap();
    for n in 0..3 {
        report(&market, n, 30).unwrap();
    }
    assert_eq!(market.get_credit_to_pay(&passenger(0)), 0);
}

#[test]
fn test_settlement_events() {
    let (market, _) = market_with_flight();
    market.buy(passenger(0), owner(), FLIGHT, ether(1)).unwrap();
    market.fetch_flight_status(owner(), FLIGHT, departure()).unwrap();
    for n in 0..2 {
        report(&market, n, 20).unwrap();
    }

    let mut rx = market.subscribe();
    report(&market, 2, 20).unwrap();
    let events = drain(&mut rx);

    assert!(events.contains(&LedgerEvent::FlightStatusInfo {
        airline: owner(),
        flight: FLIGHT.to_string(),
        timestamp: departure(),
        status: FlightStatus::LateAirline,
    }));
    assert!(events.iter().any(|event| matches!(
        event,
        LedgerEvent::InsureeCredited { passenger: p, amount, .. }
            if *p == passenger(0) && *amount == ether(3) / 2
    )));
}

#[test]
fn test_buy_rejected_after_settlement() {
    let (market, _) = market_with_flight();
    market.fetch_flight_status(owner(), FLIGHT, departure()).unwrap();
    for n in 0..3 {
        report(&market, n, 20).unwrap();
    }

    let err = market
        .buy(passenger(0), owner(), FLIGHT, ether(1))
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::Insurance(InsuranceError::FlightClosed { .. })
    ));
}

#[test]
fn test_buy_unknown_flight_and_price_limit() {
    let (market, _) = market_with_flight();
    assert!(matches!(
        market.buy(passenger(0), owner(), "NOPE", ether(1)),
        Err(MarketError::Insurance(InsuranceError::UnknownFlight(_)))
    ));
    assert!(matches!(
        market.buy(passenger(0), owner(), FLIGHT, ether(2)),
        Err(MarketError::Insurance(InsuranceError::PriceExceeded { .. }))
    ));
    assert!(market.passengers_of(owner(), FLIGHT).is_empty());
}

// ============================================================================
// OPERATIONS CONTROL
// ============================================================================

#[test]
fn test_paused_market_rejects_mutations() {
    let (market, _) = market_with_flight();
    let balance = market.treasury_balance();
    market.set_operating_status(owner(), false).unwrap();
    assert!(!market.is_operational());

    assert!(matches!(
        market.buy(passenger(0), owner(), FLIGHT, ether(1)),
        Err(MarketError::OperationPaused)
    ));
    assert!(matches!(
        market.fetch_flight_status(owner(), FLIGHT, departure()),
        Err(MarketError::OperationPaused)
    ));
    assert!(matches!(
        market.register_oracle(oracle(9), ether(1)),
        Err(MarketError::OperationPaused)
    ));
    assert_eq!(market.treasury_balance(), balance);

    // Reads still work while paused
    assert_eq!(market.view_flight_status(FLIGHT, owner()), 0);

    market.set_operating_status(owner(), true).unwrap();
    market.buy(passenger(0), owner(), FLIGHT, ether(1)).unwrap();
}

#[test]
fn test_only_owner_toggles_status() {
    let (market, _) = market();
    let err = market.set_operating_status(airline(1), false).unwrap_err();
    assert!(matches!(err, MarketError::NotAuthorized(_)));
    assert!(market.is_operational());
}

#[test]
fn test_failed_call_leaves_no_trace() {
    let (market, _) = market_with_flight();
    let before = market.statistics();

    let _ = market.buy(passenger(0), owner(), FLIGHT, ether(5));
    let _ = market.register_airline(airline(7), airline(8), "Nobody");

    assert_eq!(market.statistics(), before);
}

// ============================================================================
// EXPIRY AND PERSISTENCE
// ============================================================================

#[test]
fn test_stale_request_reopened_after_max_age() {
    let clock = ManualClock::new(START);
    let mut source = ScriptedIndexSource::new(Vec::<u8>::new());
    for _ in 0..3 {
        source.push_set([5, 5, 5]);
    }
    let market = FlightSurety::builder(owner())
        .config(MarketConfig::default().with_request_max_age(60))
        .clock(clock.clone())
        .index_source(source)
        .build()
        .unwrap();
    for n in 0..3 {
        market.register_oracle(oracle(n), ether(1)).unwrap();
    }

    market.fetch_flight_status(owner(), FLIGHT, departure()).unwrap();
    report(&market, 0, 20).unwrap();

    clock.advance(61);
    assert!(matches!(
        report(&market, 1, 20),
        Err(MarketError::Oracle(OracleError::UnknownRequest(_)))
    ));
    assert_eq!(
        market.fetch_flight_status(owner(), FLIGHT, departure()).unwrap().kind,
        TicketKind::Reopened
    );

    clock.advance(61);
    assert_eq!(market.expire_stale_requests().unwrap(), 1);
    assert_eq!(market.statistics().open_requests, 0);
}

#[test]
fn test_market_resumes_from_snapshot() {
    let temp_dir = TempDir::new().unwrap();

    {
        let market = FlightSurety::builder(owner())
            .snapshots(SnapshotStore::open(temp_dir.path()).unwrap())
            .build()
            .unwrap();
        market.fund(owner(), ether(10)).unwrap();
        market
            .register_airline(owner(), airline(1), "Airline 1")
            .unwrap();
        market.flush().unwrap();
    }

    let market = FlightSurety::builder(owner())
        .snapshots(SnapshotStore::open(temp_dir.path()).unwrap())
        .build()
        .unwrap();
    assert!(market.is_airline(&airline(1)));
    assert_eq!(market.treasury_balance(), ether(10));
    assert_eq!(market.statistics().version, 2);
}
