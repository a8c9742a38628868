#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

//! Raffle keeper.
//!
//! Polls a [`Raffle`] for upkeep, triggers the draw when it is due and hands
//! the coordinator's delivery back to the raffle. [`Simulation`] drives whole
//! rounds against a VRF coordinator on a manual clock.

pub mod settings;

use raffle_engine::{
    verify_fulfillment, Amount, Clock, Fulfiller, Fulfillment, InMemoryLedger, Ledger, ManualClock, OracleError,
    PayoutError, PlayerId, Raffle, RaffleError, RandomnessOracle, RequestId, SystemClock, VrfCoordinator,
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use settings::KeeperSettings;

#[derive(Debug, Error)]
pub enum KeeperError {
    #[error(transparent)]
    Raffle(#[from] RaffleError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("ledger error: {0}")]
    Ledger(#[from] PayoutError),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("invalid hex in {field}: {source}")]
    InvalidHex {
        field: &'static str,
        source: hex::FromHexError,
    },
    #[error("round {round} produced no draw after {ticks} ticks")]
    Stalled { round: u32, ticks: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeeperAction {
    Idle,
    Requested(RequestId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeeperStats {
    pub checks: u64,
    pub requests: u64,
    pub races: u64,
    pub draws: u64,
}

/// Upkeep trigger for a single raffle.
#[derive(Debug, Clone, Default)]
pub struct Keeper {
    verify_key: Option<[u8; 32]>,
    held: Option<Fulfillment>,
    stats: KeeperStats,
}

impl Keeper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only hand over deliveries that carry a valid VRF proof under `public_key`.
    #[must_use]
    pub const fn verifying(mut self, public_key: [u8; 32]) -> Self {
        self.verify_key = Some(public_key);
        self
    }

    #[must_use]
    pub const fn stats(&self) -> KeeperStats {
        self.stats
    }

    /// Check upkeep and close the round if it is due.
    pub fn tick<C: Clock, O: RandomnessOracle, L: Ledger>(
        &mut self,
        raffle: &mut Raffle<C, O, L>,
    ) -> Result<KeeperAction, KeeperError> {
        self.stats.checks += 1;
        if !raffle.check_upkeep(&[]).upkeep_needed {
            return Ok(KeeperAction::Idle);
        }
        match raffle.perform_upkeep(&[]) {
            Ok(id) => {
                self.stats.requests += 1;
                debug!(request_id = id.0, "upkeep performed");
                Ok(KeeperAction::Requested(id))
            }
            Err(RaffleError::UpkeepNotNeeded { balance, players, state }) => {
                self.stats.races += 1;
                warn!(balance, players, %state, "upkeep no longer needed");
                Ok(KeeperAction::Idle)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch the delivery for the raffle's pending request and apply it.
    ///
    /// Returns `Ok(None)` when nothing is pending. A delivery whose payout
    /// fails is held and replayed on the next call, since the coordinator
    /// only produces it once.
    pub fn deliver<C: Clock, O: RandomnessOracle + Fulfiller, L: Ledger>(
        &mut self,
        raffle: &mut Raffle<C, O, L>,
    ) -> Result<Option<PlayerId>, KeeperError> {
        let Some(pending) = raffle.pending_request() else {
            return Ok(None);
        };
        let delivery = match self.held.take() {
            Some(f) if f.request_id == pending.request_id => f,
            _ => raffle.oracle_mut().fulfill(pending.request_id)?,
        };
        if let Some(pk) = self.verify_key {
            verify_fulfillment(&pk, &delivery)?;
        }

        match raffle.fulfill_random_words(delivery.request_id, &delivery.random_words) {
            Ok(winner) => {
                self.stats.draws += 1;
                Ok(Some(winner))
            }
            Err(e @ RaffleError::PayoutFailed { .. }) => {
                self.held = Some(delivery);
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub round: u32,
    pub request_id: RequestId,
    pub entrants: usize,
    pub prize: Amount,
    pub winner: PlayerId,
    pub ticks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub rounds: Vec<RoundReport>,
    pub fees_paid: Amount,
    pub coordinator_key: [u8; 32],
    pub subscription_balance: Amount,
    pub stats: KeeperStats,
}

impl SimulationReport {
    #[must_use]
    pub fn total_prizes(&self) -> Amount {
        self.rounds.iter().map(|r| r.prize).sum()
    }
}

/// Runs whole rounds: every funded player enters, the clock advances one
/// poll interval per tick until the keeper closes the round, then the
/// coordinator's delivery picks the winner.
#[derive(Debug, Clone)]
pub struct Simulation {
    settings: KeeperSettings,
}

impl Simulation {
    #[must_use]
    pub const fn new(settings: KeeperSettings) -> Self {
        Self { settings }
    }

    pub fn run(&self) -> Result<SimulationReport, KeeperError> {
        let s = &self.settings;
        let players = s.player_ids()?;
        let base_fee = Amount::from(s.base_fee);

        let mut coordinator = match s.vrf_secret_bytes()? {
            Some(secret) => VrfCoordinator::from_secret_bytes(&secret, base_fee)?,
            None => VrfCoordinator::generate(base_fee),
        };
        let coordinator_key = coordinator.public_key();
        let subscription_id = coordinator.funded_subscription(Amount::from(s.subscription_funds));
        let config = s.raffle_config(subscription_id)?;
        let fee = config.entrance_fee;

        let mut ledger = InMemoryLedger::new();
        for p in &players {
            ledger.credit(p, Amount::from(s.player_funds))?;
        }

        let clock = ManualClock::new(s.start_time.unwrap_or_else(|| SystemClock.now()));
        let mut raffle = Raffle::new(config, clock.clone(), coordinator, ledger)?;
        let mut keeper = Keeper::new().verifying(coordinator_key);
        info!(
            players = players.len(),
            rounds = s.rounds,
            coordinator = %hex::encode(coordinator_key),
            "simulation started"
        );

        let mut rounds = Vec::new();
        let mut fees_paid: Amount = 0;
        for round in 1..=s.rounds {
            for p in &players {
                if !raffle.ledger_mut().debit(p, fee) {
                    debug!(player = %p, round, "player cannot afford entry");
                    continue;
                }
                raffle.enter_raffle(*p, fee)?;
                fees_paid += fee;
            }
            let entrants = raffle.number_of_players();
            if entrants == 0 {
                warn!(round, "no player could afford an entry, stopping");
                break;
            }

            let mut ticks = 0;
            let request_id = loop {
                if ticks >= s.max_ticks_per_round {
                    return Err(KeeperError::Stalled { round, ticks });
                }
                ticks += 1;
                clock.advance(s.poll_interval_secs);
                if let KeeperAction::Requested(id) = keeper.tick(&mut raffle)? {
                    break id;
                }
            };

            let prize = raffle.balance();
            let winner = keeper.deliver(&mut raffle)?.ok_or(KeeperError::Stalled { round, ticks })?;
            info!(round, request_id = request_id.0, entrants, prize, %winner, "round settled");
            rounds.push(RoundReport { round, request_id, entrants, prize, winner, ticks });
        }

        let subscription_balance = raffle
            .oracle()
            .subscriptions()
            .balance_of(subscription_id)
            .unwrap_or_default();
        Ok(SimulationReport {
            rounds,
            fees_paid,
            coordinator_key,
            subscription_balance,
            stats: keeper.stats(),
        })
    }
}
