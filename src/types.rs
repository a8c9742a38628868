use core::convert::TryFrom;
use core::fmt;
use core::str::FromStr;

use primitive_types::U256;

use crate::errors::RaffleError;

/// Smallest indivisible value unit.
pub type Amount = u128;
/// Seconds since the UNIX epoch.
pub type Timestamp = u64;
/// A single 256-bit word delivered by the randomness coordinator.
pub type RandomWord = U256;

pub const PLAYER_ID_LEN: usize = 32;
pub const KEY_HASH_LEN: usize = 32;

pub const DEFAULT_ENTRANCE_FEE: Amount = 10_000_000_000_000_000; // 0.01 at 18 decimals
pub const DEFAULT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_CALLBACK_GAS_LIMIT: u32 = 500_000;
pub const REQUEST_CONFIRMATIONS: u16 = 3;
pub const NUM_WORDS: u32 = 1;

/// Lifecycle of a raffle round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum RaffleState {
    #[default]
    Open = 0,
    Calculating = 1,
}

impl fmt::Display for RaffleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Calculating => f.write_str("calculating"),
        }
    }
}

/// Opaque 32-byte participant identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct PlayerId(pub [u8; PLAYER_ID_LEN]);

impl PlayerId {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PLAYER_ID_LEN] {
        &self.0
    }

    /// Parse a hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut out = [0u8; PLAYER_ID_LEN];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({self})")
    }
}

impl FromStr for PlayerId {
    type Err = hex::FromHexError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; PLAYER_ID_LEN]> for PlayerId {
    fn from(b: [u8; PLAYER_ID_LEN]) -> Self {
        Self(b)
    }
}

impl TryFrom<&[u8]> for PlayerId {
    type Error = RaffleError;
    fn try_from(b: &[u8]) -> Result<Self, Self::Error> {
        if b.len() != PLAYER_ID_LEN {
            return Err(RaffleError::InvalidLength { expected: PLAYER_ID_LEN, got: b.len() });
        }
        let mut arr = [0u8; PLAYER_ID_LEN];
        arr.copy_from_slice(b);
        Ok(Self(arr))
    }
}

/// Identifier of a randomness request; issued ids are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of [`crate::Raffle::check_upkeep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpkeepCheck {
    pub upkeep_needed: bool,
    pub perform_data: Vec<u8>,
}

/// Outstanding randomness request recorded by `perform_upkeep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: RequestId,
    /// Entrant count at the moment the draw was requested.
    pub entrants: usize,
    pub requested_at: Timestamp,
}

/// Immutable raffle parameters fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaffleConfig {
    pub entrance_fee: Amount,
    pub interval: u64,
    pub key_hash: [u8; KEY_HASH_LEN],
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    pub request_confirmations: u16,
    pub num_words: u32,
}

impl Default for RaffleConfig {
    fn default() -> Self {
        Self {
            entrance_fee: DEFAULT_ENTRANCE_FEE,
            interval: DEFAULT_INTERVAL_SECS,
            key_hash: [0u8; KEY_HASH_LEN],
            subscription_id: 1,
            callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
            request_confirmations: REQUEST_CONFIRMATIONS,
            num_words: NUM_WORDS,
        }
    }
}

impl RaffleConfig {
    #[must_use]
    pub const fn with_entrance_fee(mut self, fee: Amount) -> Self {
        self.entrance_fee = fee;
        self
    }

    #[must_use]
    pub const fn with_interval(mut self, secs: u64) -> Self {
        self.interval = secs;
        self
    }

    #[must_use]
    pub const fn with_key_hash(mut self, key_hash: [u8; KEY_HASH_LEN]) -> Self {
        self.key_hash = key_hash;
        self
    }

    #[must_use]
    pub const fn with_subscription_id(mut self, id: u64) -> Self {
        self.subscription_id = id;
        self
    }

    #[must_use]
    pub const fn with_callback_gas_limit(mut self, limit: u32) -> Self {
        self.callback_gas_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_num_words(mut self, n: u32) -> Self {
        self.num_words = n;
        self
    }

    pub fn validate(&self) -> Result<(), RaffleError> {
        if self.entrance_fee == 0 {
            return Err(RaffleError::InvalidConfig("entrance fee must be non-zero"));
        }
        if self.num_words == 0 {
            return Err(RaffleError::InvalidConfig("at least one random word is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_hex_roundtrip_accepts_prefix() {
        let id = PlayerId([0xab; 32]);
        let s = id.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.parse::<PlayerId>().unwrap(), id);
        assert_eq!(PlayerId::from_hex(&s[2..]).unwrap(), id);
    }

    #[test]
    fn player_id_rejects_wrong_length() {
        assert!(PlayerId::try_from(&[1u8; 31][..]).is_err());
        assert!(PlayerId::from_hex("abcd").is_err());
    }

    #[test]
    fn default_config_is_valid() {
        assert!(RaffleConfig::default().validate().is_ok());
        assert_eq!(RaffleConfig::default().num_words, 1);
    }

    #[test]
    fn zero_fee_and_zero_words_rejected() {
        assert!(RaffleConfig::default().with_entrance_fee(0).validate().is_err());
        assert!(RaffleConfig::default().with_num_words(0).validate().is_err());
    }
}
