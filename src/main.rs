// flightsurety - command line driver for the insurance marketplace

use clap::{Parser, Subcommand};
use flightsurety::flight::FlightStatus;
use flightsurety::identity::Address;
use flightsurety::ledger::LedgerEvent;
use flightsurety::oracle::SeededIndexSource;
use flightsurety::relay::{DefaultStatusSource, OracleRelay, RelayConfig};
use flightsurety::storage::SnapshotStore;
use flightsurety::{ether, Amount, FlightSurety, MarketConfig};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const FLIGHT_CODE: &str = "FS100";
const DESTINATION: &str = "Zurich";

#[derive(Parser)]
#[command(name = "flightsurety", version, about = "Flight delay insurance marketplace")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an end-to-end market: airlines, a flight, policies, oracles, payout
    Simulate {
        /// Oracle accounts registered by the relay
        #[arg(long, default_value_t = 20)]
        oracles: usize,
        /// Status code the oracles report (10, 20, 30, 40, 50)
        #[arg(long, default_value_t = 20)]
        status: u8,
        /// Seed for oracle index assignment
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Insured passengers
        #[arg(long, default_value_t = 3)]
        passengers: usize,
        /// Premium per passenger, in thousandths of a unit
        #[arg(long, default_value_t = 1000)]
        premium_milli: u64,
        /// Persist the ledger here (must not already hold one)
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Seconds to wait for oracle consensus
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
    },
    /// Print statistics of a persisted ledger
    Status {
        #[arg(long)]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Simulate {
            oracles,
            status,
            seed,
            passengers,
            premium_milli,
            data_dir,
            timeout_secs,
        } => {
            let premium = ether(premium_milli) / 1000;
            simulate(oracles, status, seed, passengers, premium, data_dir, timeout_secs).await
        }
        Command::Status { data_dir } => print_status(data_dir),
    }
}

#[allow(clippy::too_many_arguments)]
async fn simulate(
    oracle_count: usize,
    status_code: u8,
    seed: u64,
    passenger_count: usize,
    premium: Amount,
    data_dir: Option<PathBuf>,
    timeout_secs: u64,
) -> Result<(), Box<dyn Error>> {
    let owner = Address::from_label("owner");
    let config = MarketConfig::default();

    let mut builder = FlightSurety::builder(owner)
        .config(config.clone())
        .index_source(SeededIndexSource::new(seed));
    if let Some(dir) = data_dir {
        let snapshots = SnapshotStore::open(&dir)?;
        if !snapshots.is_empty()? {
            return Err(format!("{} already holds a ledger", dir.display()).into());
        }
        builder = builder.snapshots(snapshots);
    }
    let market = Arc::new(builder.build()?);

    // Airlines
    market.fund(owner, config.minimum_funds)?;
    for n in 1..config.direct_admission_limit {
        let airline = Address::from_label(&format!("airline-{}", n));
        market.register_airline(owner, airline, &format!("Airline {}", n))?;
    }
    info!(airlines = market.airlines_count(), "airlines registered");

    // Flight and policies
    let departure = market.now() + 3600;
    market.register_flight(owner, FLIGHT_CODE, DESTINATION, departure)?;
    let passengers: Vec<Address> = (0..passenger_count)
        .map(|n| Address::from_label(&format!("passenger-{}", n)))
        .collect();
    for passenger in &passengers {
        market.buy(*passenger, owner, FLIGHT_CODE, premium)?;
    }

    // Oracles
    let source = Arc::new(DefaultStatusSource::default());
    source.set_code(status_code);
    let accounts = (0..oracle_count).map(|n| Address::from_label(&format!("oracle-{}", n)));
    let relay = OracleRelay::register(market.clone(), accounts, source, RelayConfig::default())?;
    let mut events = market.subscribe();
    let handle = relay.spawn();

    let ticket = market.fetch_flight_status(owner, FLIGHT_CODE, departure)?;
    info!(routing_index = ticket.routing_index, "flight status requested");

    let settled = tokio::time::timeout(Duration::from_secs(timeout_secs), async {
        loop {
            match events.recv().await {
                Ok(LedgerEvent::FlightStatusInfo { status, .. }) => return Some(status),
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten();

    let stats = handle.shutdown().await?;
    info!(?stats, "relay finished");

    match settled {
        Some(status) => println!("{} settled as {}", FLIGHT_CODE, status),
        None => {
            warn!("no oracle consensus reached");
            println!(
                "{} still {}: fewer than {} oracles serve routing index {}",
                FLIGHT_CODE,
                FlightStatus::Unknown,
                config.min_responses,
                ticket.routing_index
            );
        }
    }

    for passenger in &passengers {
        let owed = market.get_credit_to_pay(passenger);
        if owed == 0 {
            println!("{}: nothing owed", passenger);
            continue;
        }
        let paid = market.pay(*passenger)?;
        println!("{}: paid {} wei", passenger, paid);
    }

    market.flush()?;
    let statistics = market.statistics();
    println!(
        "ledger v{}: {} airlines, {} oracles, treasury {} wei",
        statistics.version, statistics.registered_airlines, statistics.oracles, statistics.treasury_balance
    );
    Ok(())
}

fn print_status(data_dir: PathBuf) -> Result<(), Box<dyn Error>> {
    let snapshots = SnapshotStore::open(&data_dir)?;
    let stats = snapshots.stats()?;
    match snapshots.load_state()? {
        Some(state) => {
            let summary = state.statistics();
            println!("owner:        {}", state.owner());
            println!("operational:  {}", state.is_operational());
            println!("version:      {}", summary.version);
            println!("airlines:     {}", summary.registered_airlines);
            println!("oracles:      {}", summary.oracles);
            println!("requests:     {} open", summary.open_requests);
            println!("treasury:     {} wei", summary.treasury_balance);
            println!("disk:         {} bytes", stats.disk_size_bytes);
        }
        None => println!("{} holds no ledger", data_dir.display()),
    }
    Ok(())
}
