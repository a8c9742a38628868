//! Keeper settings.

use raffle_engine::{Amount, PlayerId, RaffleConfig, KEY_HASH_LEN};
use serde::Deserialize;

use crate::KeeperError;

/// Settings for a simulated keeper run.
///
/// Loaded from an optional `raffle.toml` and then `RAFFLE_*` environment
/// variables; every field falls back to a default.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct KeeperSettings {
    #[serde(default = "defaults::entrance_fee")]
    pub entrance_fee: u64,

    #[serde(default = "defaults::interval_secs")]
    pub interval_secs: u64,

    /// Simulated seconds between keeper ticks.
    #[serde(default = "defaults::poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "defaults::max_ticks_per_round")]
    pub max_ticks_per_round: u32,

    #[serde(default = "defaults::rounds")]
    pub rounds: u32,

    /// Hex player ids. When empty, `generated_players` ids are made up.
    #[serde(default)]
    pub players: Vec<String>,

    #[serde(default = "defaults::generated_players")]
    pub generated_players: u32,

    /// Starting ledger balance credited to every player.
    #[serde(default = "defaults::player_funds")]
    pub player_funds: u64,

    #[serde(default = "defaults::subscription_funds")]
    pub subscription_funds: u64,

    #[serde(default = "defaults::base_fee")]
    pub base_fee: u64,

    /// Hex gas lane key hash; empty means all zeros.
    #[serde(default)]
    pub key_hash: String,

    /// Hex VRF secret scalar. A fresh key is generated when unset.
    #[serde(default)]
    pub vrf_secret: Option<String>,

    #[serde(default = "defaults::callback_gas_limit")]
    pub callback_gas_limit: u32,

    #[serde(default = "defaults::num_words")]
    pub num_words: u32,

    /// Simulated start time; wall clock when unset.
    #[serde(default)]
    pub start_time: Option<u64>,
}

impl Default for KeeperSettings {
    fn default() -> Self {
        Self {
            entrance_fee: defaults::entrance_fee(),
            interval_secs: defaults::interval_secs(),
            poll_interval_secs: defaults::poll_interval_secs(),
            max_ticks_per_round: defaults::max_ticks_per_round(),
            rounds: defaults::rounds(),
            players: Vec::new(),
            generated_players: defaults::generated_players(),
            player_funds: defaults::player_funds(),
            subscription_funds: defaults::subscription_funds(),
            base_fee: defaults::base_fee(),
            key_hash: String::new(),
            vrf_secret: None,
            callback_gas_limit: defaults::callback_gas_limit(),
            num_words: defaults::num_words(),
            start_time: None,
        }
    }
}

impl KeeperSettings {
    /// Read `<name>.toml` (if present) and `RAFFLE_*` variables.
    pub fn load(name: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(name).required(false))
            .add_source(
                config::Environment::with_prefix("RAFFLE")
                    .list_separator(",")
                    .with_list_parse_key("players"),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse settings from an inline TOML document.
    pub fn from_toml(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Configured players, or `generated_players` synthetic ids.
    pub fn player_ids(&self) -> Result<Vec<PlayerId>, KeeperError> {
        if self.players.is_empty() {
            return Ok((1..=self.generated_players).map(synthetic_player).collect());
        }
        self.players
            .iter()
            .map(|s| PlayerId::from_hex(s).map_err(|source| KeeperError::InvalidHex { field: "players", source }))
            .collect()
    }

    pub fn vrf_secret_bytes(&self) -> Result<Option<[u8; 32]>, KeeperError> {
        self.vrf_secret
            .as_deref()
            .map(|s| decode_32("vrf_secret", s))
            .transpose()
    }

    /// Raffle configuration for the given coordinator subscription.
    pub fn raffle_config(&self, subscription_id: u64) -> Result<RaffleConfig, KeeperError> {
        let key_hash = if self.key_hash.is_empty() {
            [0u8; KEY_HASH_LEN]
        } else {
            decode_32("key_hash", &self.key_hash)?
        };
        let config = RaffleConfig::default()
            .with_entrance_fee(Amount::from(self.entrance_fee))
            .with_interval(self.interval_secs)
            .with_key_hash(key_hash)
            .with_subscription_id(subscription_id)
            .with_callback_gas_limit(self.callback_gas_limit)
            .with_num_words(self.num_words);
        config.validate()?;
        Ok(config)
    }
}

fn decode_32(field: &'static str, s: &str) -> Result<[u8; 32], KeeperError> {
    PlayerId::from_hex(s)
        .map(|id| id.0)
        .map_err(|source| KeeperError::InvalidHex { field, source })
}

fn synthetic_player(n: u32) -> PlayerId {
    let mut id = [0u8; 32];
    id[0] = 0xaa;
    id[28..].copy_from_slice(&n.to_be_bytes());
    PlayerId(id)
}

mod defaults {
    pub fn entrance_fee() -> u64 {
        10_000_000_000_000_000
    }

    pub fn interval_secs() -> u64 {
        30
    }

    pub fn poll_interval_secs() -> u64 {
        10
    }

    pub fn max_ticks_per_round() -> u32 {
        1_000
    }

    pub fn rounds() -> u32 {
        3
    }

    pub fn generated_players() -> u32 {
        4
    }

    pub fn player_funds() -> u64 {
        1_000_000_000_000_000_000
    }

    pub fn subscription_funds() -> u64 {
        2_500_000_000_000_000_000
    }

    pub fn base_fee() -> u64 {
        250_000_000_000_000_000
    }

    pub fn callback_gas_limit() -> u32 {
        500_000
    }

    pub fn num_words() -> u32 {
        1
    }
}
