use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    errors::OracleError,
    types::{Amount, RandomWord, RequestId, KEY_HASH_LEN},
};

pub const MAX_NUM_WORDS: u32 = 500;
pub const VRF_PROOF_LEN: usize = 80; // π = γ(32)||c(16)||s(32)
pub const DEFAULT_BASE_FEE: Amount = 250_000_000_000_000_000;

/// Parameters forwarded to the coordinator with every draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub key_hash: [u8; KEY_HASH_LEN],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

/// Port through which the raffle asks for randomness. Delivery happens later
/// and out of band, keyed by the returned id.
pub trait RandomnessOracle {
    /// # Errors
    /// Returns `OracleError` if the coordinator refuses the request.
    fn request_random_words(&mut self, request: &RandomnessRequest) -> Result<RequestId, OracleError>;
}

impl<O: RandomnessOracle + ?Sized> RandomnessOracle for &mut O {
    fn request_random_words(&mut self, request: &RandomnessRequest) -> Result<RequestId, OracleError> {
        (**self).request_random_words(request)
    }
}

/// Coordinator side of the exchange: produce the delivery for a pending request.
pub trait Fulfiller {
    /// # Errors
    /// Returns `OracleError` if the request is unknown or cannot be billed.
    fn fulfill(&mut self, id: RequestId) -> Result<Fulfillment, OracleError>;
}

impl<F: Fulfiller + ?Sized> Fulfiller for &mut F {
    fn fulfill(&mut self, id: RequestId) -> Result<Fulfillment, OracleError> {
        (**self).fulfill(id)
    }
}

/// VRF evidence attached to a fulfillment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentProof {
    pub alpha: Vec<u8>,
    pub pi: [u8; VRF_PROOF_LEN],
}

/// Randomness delivered for a prior request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fulfillment {
    pub request_id: RequestId,
    pub random_words: Vec<RandomWord>,
    pub proof: Option<FulfillmentProof>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Subscription {
    pub balance: Amount,
    pub consumers: u32,
}

/// Prepaid subscriptions billed once per fulfillment.
#[derive(Debug, Clone)]
pub struct SubscriptionRegistry {
    subs: BTreeMap<u64, Subscription>,
    next_id: u64,
    base_fee: Amount,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_FEE)
    }
}

impl SubscriptionRegistry {
    #[must_use]
    pub const fn new(base_fee: Amount) -> Self {
        Self { subs: BTreeMap::new(), next_id: 1, base_fee }
    }

    #[must_use]
    pub const fn base_fee(&self) -> Amount {
        self.base_fee
    }

    pub fn create_subscription(&mut self) -> u64 {
        self.insert(Subscription::default())
    }

    /// New subscription holding `balance` with one authorized consumer.
    pub fn create_funded_subscription(&mut self, balance: Amount) -> u64 {
        self.insert(Subscription { balance, consumers: 1 })
    }

    fn insert(&mut self, sub: Subscription) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.subs.insert(id, sub);
        debug!(subscription_id = id, balance = sub.balance, "subscription created");
        id
    }

    pub fn fund_subscription(&mut self, id: u64, amount: Amount) -> Result<Amount, OracleError> {
        let sub = self.subs.get_mut(&id).ok_or(OracleError::InvalidSubscription(id))?;
        sub.balance = sub
            .balance
            .checked_add(amount)
            .ok_or(OracleError::SubscriptionOverflow { subscription_id: id })?;
        Ok(sub.balance)
    }

    pub fn add_consumer(&mut self, id: u64) -> Result<(), OracleError> {
        let sub = self.subs.get_mut(&id).ok_or(OracleError::InvalidSubscription(id))?;
        sub.consumers = sub.consumers.saturating_add(1);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<&Subscription> {
        self.subs.get(&id)
    }

    #[must_use]
    pub fn balance_of(&self, id: u64) -> Option<Amount> {
        self.subs.get(&id).map(|s| s.balance)
    }

    fn check_request(&self, req: &RandomnessRequest) -> Result<(), OracleError> {
        let sub = self
            .subs
            .get(&req.subscription_id)
            .ok_or(OracleError::InvalidSubscription(req.subscription_id))?;
        if sub.consumers == 0 {
            return Err(OracleError::InvalidConsumer { subscription_id: req.subscription_id });
        }
        if req.num_words == 0 || req.num_words > MAX_NUM_WORDS {
            return Err(OracleError::InvalidWordCount(req.num_words));
        }
        Ok(())
    }

    fn ensure_payable(&self, id: u64) -> Result<(), OracleError> {
        let sub = self.subs.get(&id).ok_or(OracleError::InvalidSubscription(id))?;
        if sub.balance < self.base_fee {
            return Err(OracleError::InsufficientBalance { balance: sub.balance, required: self.base_fee });
        }
        Ok(())
    }

    fn charge(&mut self, id: u64) -> Result<Amount, OracleError> {
        self.ensure_payable(id)?;
        let fee = self.base_fee;
        let sub = self.subs.get_mut(&id).ok_or(OracleError::InvalidSubscription(id))?;
        sub.balance -= fee;
        Ok(fee)
    }
}

/// Request bookkeeping shared by the coordinators: id allocation, the
/// pending table and subscription billing.
#[derive(Debug, Clone, Default)]
pub struct RequestBook {
    subscriptions: SubscriptionRegistry,
    pending: BTreeMap<RequestId, RandomnessRequest>,
    last_request_id: u64,
}

impl RequestBook {
    #[must_use]
    pub fn new(base_fee: Amount) -> Self {
        Self {
            subscriptions: SubscriptionRegistry::new(base_fee),
            pending: BTreeMap::new(),
            last_request_id: 0,
        }
    }

    #[must_use]
    pub const fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    pub fn subscriptions_mut(&mut self) -> &mut SubscriptionRegistry {
        &mut self.subscriptions
    }

    /// Validate `req` and record it as pending under a fresh id.
    pub fn open(&mut self, req: &RandomnessRequest) -> Result<RequestId, OracleError> {
        self.subscriptions.check_request(req)?;
        self.last_request_id += 1;
        let id = RequestId(self.last_request_id);
        self.pending.insert(id, req.clone());
        debug!(request_id = id.0, subscription_id = req.subscription_id, num_words = req.num_words, "randomness requested");
        Ok(id)
    }

    /// The pending request for `id`, checked to be billable.
    pub fn payable(&self, id: RequestId) -> Result<&RandomnessRequest, OracleError> {
        let req = self.pending.get(&id).ok_or(OracleError::NonexistentRequest(id))?;
        self.subscriptions.ensure_payable(req.subscription_id)?;
        Ok(req)
    }

    /// Bill and retire a pending request.
    pub fn settle(&mut self, id: RequestId) -> Result<RandomnessRequest, OracleError> {
        let sub_id = self.payable(id)?.subscription_id;
        let fee = self.subscriptions.charge(sub_id)?;
        let req = self.pending.remove(&id).ok_or(OracleError::NonexistentRequest(id))?;
        debug!(request_id = id.0, subscription_id = sub_id, fee, "request settled");
        Ok(req)
    }

    #[must_use]
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_ids(&self) -> impl Iterator<Item = RequestId> + '_ {
        self.pending.keys().copied()
    }

    /// Create, fund and authorize a subscription in one step.
    pub fn funded_subscription(&mut self, amount: Amount) -> u64 {
        self.subscriptions.create_funded_subscription(amount)
    }
}

/// Expand seed material into `n` 256-bit words: `BLAKE3(tag || seed || LE32(i))`.
#[must_use]
pub fn expand_words(tag: &str, seed: &[u8], n: u32) -> Vec<RandomWord> {
    (0..n)
        .map(|i| {
            let mut h = blake3::Hasher::new();
            h.update(tag.as_bytes());
            h.update(seed);
            h.update(&i.to_le_bytes());
            RandomWord::from_big_endian(h.finalize().as_bytes())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(sub: u64) -> RandomnessRequest {
        RandomnessRequest {
            key_hash: [0u8; 32],
            subscription_id: sub,
            request_confirmations: 3,
            callback_gas_limit: 500_000,
            num_words: 1,
        }
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut book = RequestBook::new(1);
        let sub = book.funded_subscription(10);
        assert_eq!(book.open(&request(sub)).unwrap(), RequestId(1));
        assert_eq!(book.open(&request(sub)).unwrap(), RequestId(2));
        assert_eq!(book.pending_ids().count(), 2);
    }

    #[test]
    fn unknown_subscription_and_missing_consumer_rejected() {
        let mut book = RequestBook::new(1);
        assert_eq!(book.open(&request(7)), Err(OracleError::InvalidSubscription(7)));
        let sub = book.subscriptions_mut().create_subscription();
        assert_eq!(book.open(&request(sub)), Err(OracleError::InvalidConsumer { subscription_id: sub }));
    }

    #[test]
    fn settle_charges_once_and_retires() {
        let mut book = RequestBook::new(4);
        let sub = book.funded_subscription(10);
        let id = book.open(&request(sub)).unwrap();
        book.settle(id).unwrap();
        assert_eq!(book.subscriptions().balance_of(sub), Some(6));
        assert_eq!(book.settle(id), Err(OracleError::NonexistentRequest(id)));
    }

    #[test]
    fn underfunded_settle_keeps_request() {
        let mut book = RequestBook::new(4);
        let sub = book.funded_subscription(3);
        let id = book.open(&request(sub)).unwrap();
        assert_eq!(book.settle(id), Err(OracleError::InsufficientBalance { balance: 3, required: 4 }));
        assert!(book.is_pending(id));
        book.subscriptions_mut().fund_subscription(sub, 1).unwrap();
        assert!(book.settle(id).is_ok());
    }

    #[test]
    fn funded_subscription_is_ready_to_bill() {
        let mut book = RequestBook::new(4);
        let sub = book.funded_subscription(10);
        let registry = book.subscriptions();
        assert_eq!(registry.base_fee(), 4);
        assert_eq!(registry.get(sub), Some(&Subscription { balance: 10, consumers: 1 }));
        assert_eq!(registry.get(sub + 1), None);
    }

    #[test]
    fn funding_overflow_is_rejected() {
        let mut book = RequestBook::new(1);
        let sub = book.funded_subscription(Amount::MAX);
        assert_eq!(
            book.subscriptions_mut().fund_subscription(sub, 1),
            Err(OracleError::SubscriptionOverflow { subscription_id: sub })
        );
        assert_eq!(book.subscriptions().balance_of(sub), Some(Amount::MAX));
        assert_eq!(book.subscriptions_mut().fund_subscription(sub + 1, 1), Err(OracleError::InvalidSubscription(sub + 1)));
    }

    #[test]
    fn word_expansion_is_deterministic_and_distinct() {
        let a = expand_words("raffle.test", b"seed", 3);
        assert_eq!(a, expand_words("raffle.test", b"seed", 3));
        assert_eq!(a.len(), 3);
        assert_ne!(a[0], a[1]);
        assert_ne!(a, expand_words("raffle.test", b"seeD", 3));
    }
}
