//! Randomness coordinator backed by ECVRF-RISTRETTO255-SHA512 (RFC 9381).
//!
//! Each fulfillment carries α and π so anyone holding the coordinator's public
//! key can re-derive the delivered words:
//!
//! α     = "raffle.vrf.alpha" || `key_hash` || LE64(subscription) || LE64(request id)
//! y     = ECVRF output of π over α (64 bytes)
//! word i = BLAKE3("raffle.vrf.word" || y || LE32(i)) as a big-endian U256

use core::fmt;

use rand_core::OsRng;
use tracing::debug;
use vrf_r255::{Proof, PublicKey, SecretKey};

use crate::{
    errors::OracleError,
    oracle::{expand_words, Fulfiller, Fulfillment, FulfillmentProof, RandomnessOracle, RandomnessRequest, RequestBook, SubscriptionRegistry, DEFAULT_BASE_FEE, VRF_PROOF_LEN},
    types::{Amount, RequestId, KEY_HASH_LEN},
};

const TAG_ALPHA: &[u8] = b"raffle.vrf.alpha";
const TAG_VRF_WORD: &str = "raffle.vrf.word";
pub const ALPHA_LEN: usize = TAG_ALPHA.len() + KEY_HASH_LEN + 8 + 8;

/// α for a request: `TAG` || `key_hash` || LE64(subscription) || LE64(request id)
#[must_use]
pub fn build_alpha(req: &RandomnessRequest, id: RequestId) -> Vec<u8> {
    let mut v = Vec::with_capacity(ALPHA_LEN);
    v.extend_from_slice(TAG_ALPHA);
    v.extend_from_slice(&req.key_hash);
    v.extend_from_slice(&req.subscription_id.to_le_bytes());
    v.extend_from_slice(&id.0.to_le_bytes());
    v
}

fn alpha_request_id(alpha: &[u8]) -> Option<RequestId> {
    if alpha.len() != ALPHA_LEN || !alpha.starts_with(TAG_ALPHA) {
        return None;
    }
    let mut le = [0u8; 8];
    le.copy_from_slice(&alpha[ALPHA_LEN - 8..]);
    Some(RequestId(u64::from_le_bytes(le)))
}

pub struct VrfCoordinator {
    secret_key: SecretKey,
    public_key: PublicKey,
    book: RequestBook,
}

impl VrfCoordinator {
    /// Coordinator with a freshly generated key.
    #[must_use]
    pub fn generate(base_fee: Amount) -> Self {
        Self::from_secret_key(SecretKey::generate(OsRng), base_fee)
    }

    #[must_use]
    pub fn from_secret_key(secret_key: SecretKey, base_fee: Amount) -> Self {
        let public_key = PublicKey::from(secret_key);
        Self { secret_key, public_key, book: RequestBook::new(base_fee) }
    }

    /// # Errors
    /// Returns `OracleError::InvalidKey` if the bytes are not a canonical scalar.
    pub fn from_secret_bytes(secret_bytes: &[u8; 32], base_fee: Amount) -> Result<Self, OracleError> {
        let secret_key = SecretKey::from_bytes(*secret_bytes)
            .into_option()
            .ok_or(OracleError::InvalidKey)?;
        Ok(Self::from_secret_key(secret_key, base_fee))
    }

    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        self.public_key.to_bytes()
    }

    #[must_use]
    pub const fn subscriptions(&self) -> &SubscriptionRegistry {
        self.book.subscriptions()
    }

    pub fn subscriptions_mut(&mut self) -> &mut SubscriptionRegistry {
        self.book.subscriptions_mut()
    }

    /// Create, fund and authorize a subscription; returns its id.
    pub fn funded_subscription(&mut self, amount: Amount) -> u64 {
        self.book.funded_subscription(amount)
    }

    #[must_use]
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.book.is_pending(id)
    }

    pub fn pending_ids(&self) -> impl Iterator<Item = RequestId> + '_ {
        self.book.pending_ids()
    }

    /// Prove over the request's α and deliver the derived words.
    pub fn fulfill(&mut self, id: RequestId) -> Result<Fulfillment, OracleError> {
        let req = self.book.payable(id)?;
        let alpha = build_alpha(req, id);
        let n = req.num_words;

        let proof = self.secret_key.prove(&alpha);
        let y = self
            .public_key
            .verify(&alpha, &proof)
            .into_option()
            .ok_or(OracleError::InvalidProof)?;
        let random_words = expand_words(TAG_VRF_WORD, &y, n);

        self.book.settle(id)?;
        debug!(request_id = id.0, words = n, "vrf fulfillment produced");
        Ok(Fulfillment {
            request_id: id,
            random_words,
            proof: Some(FulfillmentProof { alpha, pi: proof.to_bytes() }),
        })
    }
}

impl Default for VrfCoordinator {
    fn default() -> Self {
        Self::generate(DEFAULT_BASE_FEE)
    }
}

impl fmt::Debug for VrfCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VrfCoordinator")
            .field("public_key", &hex::encode(self.public_key()))
            .field("book", &self.book)
            .finish_non_exhaustive()
    }
}

impl RandomnessOracle for VrfCoordinator {
    fn request_random_words(&mut self, request: &RandomnessRequest) -> Result<RequestId, OracleError> {
        self.book.open(request)
    }
}

impl Fulfiller for VrfCoordinator {
    fn fulfill(&mut self, id: RequestId) -> Result<Fulfillment, OracleError> {
        Self::fulfill(self, id)
    }
}

/// Check that `f` was produced by the coordinator holding `public_key`: the
/// proof verifies over α, α names `f.request_id`, and every word is derived
/// from the VRF output.
///
/// # Errors
/// Returns `OracleError::InvalidKey` for a malformed key and
/// `OracleError::InvalidProof` for any other mismatch.
pub fn verify_fulfillment(public_key: &[u8; 32], f: &Fulfillment) -> Result<(), OracleError> {
    let Some(evidence) = f.proof.as_ref() else {
        return Err(OracleError::InvalidProof);
    };
    let Some(pk) = PublicKey::from_bytes(*public_key) else {
        return Err(OracleError::InvalidKey);
    };
    if alpha_request_id(&evidence.alpha) != Some(f.request_id) {
        return Err(OracleError::InvalidProof);
    }

    let mut pi = [0u8; VRF_PROOF_LEN];
    pi.copy_from_slice(&evidence.pi);
    let Some(proof) = Proof::from_bytes(pi) else {
        return Err(OracleError::InvalidProof);
    };
    let Some(y) = pk.verify(&evidence.alpha, &proof).into_option() else {
        return Err(OracleError::InvalidProof);
    };

    let n = u32::try_from(f.random_words.len()).map_err(|_| OracleError::InvalidWordCount(u32::MAX))?;
    if expand_words(TAG_VRF_WORD, &y, n) != f.random_words {
        return Err(OracleError::InvalidProof);
    }
    Ok(())
}
