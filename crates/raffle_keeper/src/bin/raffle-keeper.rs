//! Raffle keeper binary: runs a simulated sequence of rounds.

use raffle_keeper::{KeeperSettings, Simulation};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(version = raffle_engine::VERSION, "Starting raffle keeper");

    let settings = KeeperSettings::load("raffle")?;
    info!(
        rounds = settings.rounds,
        interval = settings.interval_secs,
        fee = settings.entrance_fee,
        "Configuration loaded"
    );

    let report = Simulation::new(settings).run()?;

    println!("coordinator key: 0x{}", hex::encode(report.coordinator_key));
    for r in &report.rounds {
        println!(
            "round {:>3}  request {:>4}  entrants {:>4}  prize {:>24}  winner {}",
            r.round, r.request_id, r.entrants, r.prize, r.winner
        );
    }
    println!("fees paid:            {}", report.fees_paid);
    println!("prizes paid:          {}", report.total_prizes());
    println!("subscription balance: {}", report.subscription_balance);
    println!(
        "keeper: {} checks, {} requests, {} draws",
        report.stats.checks, report.stats.requests, report.stats.draws
    );
    Ok(())
}
