use thiserror::Error;

use crate::types::{Amount, PlayerId, RaffleState, RequestId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaffleError {
    #[error("insufficient payment: paid {paid}, entrance fee is {required}")]
    InsufficientPayment { paid: Amount, required: Amount },

    #[error("raffle is not open")]
    NotOpen,

    #[error("upkeep not needed: balance {balance}, players {players}, state {state}")]
    UpkeepNotNeeded { balance: Amount, players: usize, state: RaffleState },

    #[error("unknown randomness request {request_id}")]
    UnknownRequest { request_id: RequestId },

    #[error("payout of {amount} to {winner} failed: {reason}")]
    PayoutFailed { winner: PlayerId, amount: Amount, reason: PayoutError },

    #[error("randomness request failed: {0}")]
    RequestFailed(#[from] OracleError),

    #[error("pot overflow: balance {balance} cannot take a payment of {paid}")]
    BalanceOverflow { balance: Amount, paid: Amount },

    #[error("missing random words: expected {expected} got {got}")]
    MissingRandomWords { expected: u32, got: usize },

    #[error("player index out of range: {index} not in [0, {len})")]
    PlayerIndexOutOfRange { index: usize, len: usize },

    #[error("invalid length: expected {expected} got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Failures reported by a randomness coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("invalid subscription {0}")]
    InvalidSubscription(u64),

    #[error("subscription {subscription_id} has no consumer registered")]
    InvalidConsumer { subscription_id: u64 },

    #[error("nonexistent request {0}")]
    NonexistentRequest(RequestId),

    #[error("insufficient subscription balance: have {balance}, need {required}")]
    InsufficientBalance { balance: Amount, required: Amount },

    #[error("subscription {subscription_id} balance overflow")]
    SubscriptionOverflow { subscription_id: u64 },

    #[error("invalid number of words: {0}")]
    InvalidWordCount(u32),

    #[error("invalid VRF key")]
    InvalidKey,

    #[error("invalid VRF proof")]
    InvalidProof,
}

/// Failures reported by the payout ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayoutError {
    #[error("recipient rejected the transfer")]
    Rejected,

    #[error("recipient balance overflow")]
    Overflow,
}
