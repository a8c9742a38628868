#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

//! Raffle Engine
//!
//! A lottery state machine that sells entries at a fixed minimum fee, closes
//! itself once an interval has passed, asks a randomness coordinator for a
//! draw, and pays the whole pot to the player the draw selects.
//!
//! The engine owns no time source, coordinator or bank of its own: a
//! [`Clock`], a [`RandomnessOracle`] and a payout [`Ledger`] are injected, so
//! every transition is deterministic under test.

// Fixed choices:
// - Winner = random_words[0] mod entrants (modulo bias accepted)
// - Request ids are sequential per coordinator, starting at 1
// - VRF: ECVRF-RISTRETTO255-SHA512 (RFC 9381), words expanded with BLAKE3
// - A failed payout rolls back the whole fulfillment

pub mod types;
pub mod errors;
pub mod clock;
pub mod ledger;
pub mod events;
pub mod oracle;
pub mod coordinator;
#[cfg(feature = "vrf-r255")]
pub mod vrf;
pub mod raffle;

pub use types::*;
pub use errors::{OracleError, PayoutError, RaffleError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{InMemoryLedger, Ledger};
pub use events::{EventLog, EventSink, RaffleEvent};
pub use oracle::{Fulfiller, Fulfillment, FulfillmentProof, RandomnessOracle, RandomnessRequest, SubscriptionRegistry, DEFAULT_BASE_FEE};
pub use coordinator::MockCoordinator;
#[cfg(feature = "vrf-r255")]
pub use vrf::{verify_fulfillment, VrfCoordinator};
pub use raffle::{winner_index, Raffle};
pub use primitive_types::U256;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
