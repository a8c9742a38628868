//! The raffle state machine.
//!
//! ```text
//! Open --enter_raffle--> Open
//! Open --perform_upkeep--> Calculating      (requests randomness)
//! Calculating --fulfill_random_words--> Open (pays the winner)
//! ```
//!
//! Every operation either commits all of its effects or returns an error
//! having changed nothing. Notifications go out only after a commit.

use primitive_types::U256;
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    errors::RaffleError,
    events::{EventSink, RaffleEvent},
    ledger::Ledger,
    oracle::{RandomnessOracle, RandomnessRequest},
    types::{Amount, PendingRequest, PlayerId, RaffleConfig, RaffleState, RandomWord, RequestId, Timestamp, UpkeepCheck},
};

pub struct Raffle<C, O, L> {
    config: RaffleConfig,
    state: RaffleState,
    players: Vec<PlayerId>,
    balance: Amount,
    last_timestamp: Timestamp,
    recent_winner: Option<PlayerId>,
    pending: Option<PendingRequest>,
    clock: C,
    oracle: O,
    ledger: L,
    sinks: Vec<Box<dyn EventSink + Send>>,
}

/// `words[0] mod entrants`. Slightly biased toward low indices when
/// `entrants` does not divide 2^256; the bias is below 2^-192 for any
/// realistic entrant count.
#[must_use]
pub fn winner_index(word: &RandomWord, entrants: usize) -> Option<usize> {
    if entrants == 0 {
        return None;
    }
    let idx = *word % U256::from(entrants);
    usize::try_from(idx.low_u64()).ok()
}

impl<C: Clock, O: RandomnessOracle, L: Ledger> Raffle<C, O, L> {
    /// Create an open raffle. The interval starts counting now.
    ///
    /// # Errors
    /// Returns `RaffleError::InvalidConfig` if the configuration is rejected.
    pub fn new(config: RaffleConfig, clock: C, oracle: O, ledger: L) -> Result<Self, RaffleError> {
        config.validate()?;
        let last_timestamp = clock.now();
        info!(
            entrance_fee = config.entrance_fee,
            interval = config.interval,
            subscription_id = config.subscription_id,
            "raffle created"
        );
        Ok(Self {
            config,
            state: RaffleState::Open,
            players: Vec::new(),
            balance: 0,
            last_timestamp,
            recent_winner: None,
            pending: None,
            clock,
            oracle,
            ledger,
            sinks: Vec::new(),
        })
    }

    /// Register a notification receiver.
    pub fn subscribe(&mut self, sink: Box<dyn EventSink + Send>) {
        self.sinks.push(sink);
    }

    fn publish(&mut self, event: RaffleEvent) {
        for sink in &mut self.sinks {
            sink.publish(&event);
        }
    }

    /// Join the current round, paying at least the entrance fee. Anything above
    /// the fee stays in the pot.
    pub fn enter_raffle(&mut self, player: PlayerId, paid: Amount) -> Result<(), RaffleError> {
        if paid < self.config.entrance_fee {
            return Err(RaffleError::InsufficientPayment { paid, required: self.config.entrance_fee });
        }
        if self.state != RaffleState::Open {
            return Err(RaffleError::NotOpen);
        }
        let Some(balance) = self.balance.checked_add(paid) else {
            return Err(RaffleError::BalanceOverflow { balance: self.balance, paid });
        };
        self.players.push(player);
        self.balance = balance;
        debug!(%player, paid, players = self.players.len(), "entrance recorded");
        self.publish(RaffleEvent::EntranceRecorded { player });
        Ok(())
    }

    fn upkeep_needed(&self) -> bool {
        let elapsed = self.clock.now().saturating_sub(self.last_timestamp);
        let time_passed = elapsed >= self.config.interval;
        let is_open = self.state == RaffleState::Open;
        let has_balance = self.balance > 0;
        let has_players = !self.players.is_empty();
        time_passed && is_open && has_balance && has_players
    }

    /// Whether a draw is due: the interval has elapsed, the raffle is open,
    /// and at least one paying player has entered.
    #[must_use]
    pub fn check_upkeep(&self, _check_data: &[u8]) -> UpkeepCheck {
        UpkeepCheck { upkeep_needed: self.upkeep_needed(), perform_data: Vec::new() }
    }

    /// Close the round and request randomness for the draw.
    pub fn perform_upkeep(&mut self, _perform_data: &[u8]) -> Result<RequestId, RaffleError> {
        if !self.upkeep_needed() {
            return Err(RaffleError::UpkeepNotNeeded {
                balance: self.balance,
                players: self.players.len(),
                state: self.state,
            });
        }
        let request = RandomnessRequest {
            key_hash: self.config.key_hash,
            subscription_id: self.config.subscription_id,
            request_confirmations: self.config.request_confirmations,
            callback_gas_limit: self.config.callback_gas_limit,
            num_words: self.config.num_words,
        };
        let request_id = self.oracle.request_random_words(&request).map_err(|e| {
            warn!(error = %e, "randomness request refused");
            RaffleError::RequestFailed(e)
        })?;

        self.state = RaffleState::Calculating;
        self.pending = Some(PendingRequest {
            request_id,
            entrants: self.players.len(),
            requested_at: self.clock.now(),
        });
        info!(request_id = request_id.0, players = self.players.len(), balance = self.balance, "requested raffle winner");
        self.publish(RaffleEvent::RequestedRaffleWinner { request_id });
        Ok(request_id)
    }

    /// Coordinator callback: pick the winner from `random_words[0]`, pay out
    /// the whole balance and reopen. On a payout failure nothing changes and
    /// the request stays pending, so the same delivery can be retried.
    pub fn fulfill_random_words(&mut self, request_id: RequestId, random_words: &[RandomWord]) -> Result<PlayerId, RaffleError> {
        let pending = match self.pending {
            Some(p) if p.request_id == request_id => p,
            _ => {
                warn!(request_id = request_id.0, "fulfillment for unknown request");
                return Err(RaffleError::UnknownRequest { request_id });
            }
        };
        let Some(word) = random_words.first() else {
            return Err(RaffleError::MissingRandomWords { expected: self.config.num_words, got: 0 });
        };
        // `entrants` is at least one: upkeep never fires on an empty round.
        let index = winner_index(word, pending.entrants).unwrap_or(0);
        let winner = self.player(index)?;

        let amount = self.balance;
        if let Err(reason) = self.ledger.transfer(&winner, amount) {
            warn!(%winner, amount, error = %reason, "winner payout failed");
            return Err(RaffleError::PayoutFailed { winner, amount, reason });
        }

        self.recent_winner = Some(winner);
        self.players.clear();
        self.balance = 0;
        self.last_timestamp = self.clock.now();
        self.pending = None;
        self.state = RaffleState::Open;
        info!(request_id = request_id.0, %winner, amount, "winner picked");
        self.publish(RaffleEvent::WinnerPicked { winner });
        Ok(winner)
    }

    #[must_use]
    pub const fn raffle_state(&self) -> RaffleState {
        self.state
    }

    #[must_use]
    pub const fn entrance_fee(&self) -> Amount {
        self.config.entrance_fee
    }

    #[must_use]
    pub const fn interval(&self) -> u64 {
        self.config.interval
    }

    pub fn player(&self, index: usize) -> Result<PlayerId, RaffleError> {
        self.players
            .get(index)
            .copied()
            .ok_or(RaffleError::PlayerIndexOutOfRange { index, len: self.players.len() })
    }

    #[must_use]
    pub const fn recent_winner(&self) -> Option<PlayerId> {
        self.recent_winner
    }

    #[must_use]
    pub const fn last_timestamp(&self) -> Timestamp {
        self.last_timestamp
    }

    #[must_use]
    pub fn number_of_players(&self) -> usize {
        self.players.len()
    }

    #[must_use]
    pub const fn balance(&self) -> Amount {
        self.balance
    }

    #[must_use]
    pub const fn num_words(&self) -> u32 {
        self.config.num_words
    }

    #[must_use]
    pub const fn request_confirmations(&self) -> u16 {
        self.config.request_confirmations
    }

    #[must_use]
    pub const fn pending_request(&self) -> Option<PendingRequest> {
        self.pending
    }

    #[must_use]
    pub const fn config(&self) -> &RaffleConfig {
        &self.config
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    #[must_use]
    pub const fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    #[must_use]
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }
}
