//! In-process stand-in for the randomness coordinator.
//!
//! Words are a pure function of the request id unless the caller supplies
//! them, which makes draws reproducible in tests.

use crate::{
    errors::OracleError,
    oracle::{expand_words, Fulfiller, Fulfillment, RandomnessOracle, RandomnessRequest, RequestBook, SubscriptionRegistry, DEFAULT_BASE_FEE},
    types::{Amount, RandomWord, RequestId},
};

const TAG_MOCK_WORD: &str = "raffle.mock.word";

#[derive(Debug, Clone, Default)]
pub struct MockCoordinator {
    book: RequestBook,
}

impl MockCoordinator {
    #[must_use]
    pub fn new(base_fee: Amount) -> Self {
        Self { book: RequestBook::new(base_fee) }
    }

    /// Coordinator with one subscription already funded and authorized.
    /// Returns the coordinator and the subscription id.
    #[must_use]
    pub fn with_funded_subscription(fund: Amount) -> (Self, u64) {
        let mut c = Self::new(DEFAULT_BASE_FEE);
        let id = c.book.funded_subscription(fund);
        (c, id)
    }

    #[must_use]
    pub const fn subscriptions(&self) -> &SubscriptionRegistry {
        self.book.subscriptions()
    }

    pub fn subscriptions_mut(&mut self) -> &mut SubscriptionRegistry {
        self.book.subscriptions_mut()
    }

    #[must_use]
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.book.is_pending(id)
    }

    pub fn pending_ids(&self) -> impl Iterator<Item = RequestId> + '_ {
        self.book.pending_ids()
    }

    /// Deliver words derived from the request id.
    pub fn fulfill(&mut self, id: RequestId) -> Result<Fulfillment, OracleError> {
        let n = self.book.payable(id)?.num_words;
        let random_words = expand_words(TAG_MOCK_WORD, &id.0.to_le_bytes(), n);
        self.book.settle(id)?;
        Ok(Fulfillment { request_id: id, random_words, proof: None })
    }

    /// Deliver caller-chosen words; the count must match the request.
    pub fn fulfill_with_words(&mut self, id: RequestId, words: Vec<RandomWord>) -> Result<Fulfillment, OracleError> {
        let n = self.book.payable(id)?.num_words;
        if words.len() != n as usize {
            return Err(OracleError::InvalidWordCount(u32::try_from(words.len()).unwrap_or(u32::MAX)));
        }
        self.book.settle(id)?;
        Ok(Fulfillment { request_id: id, random_words: words, proof: None })
    }
}

impl RandomnessOracle for MockCoordinator {
    fn request_random_words(&mut self, request: &RandomnessRequest) -> Result<RequestId, OracleError> {
        self.book.open(request)
    }
}

impl Fulfiller for MockCoordinator {
    fn fulfill(&mut self, id: RequestId) -> Result<Fulfillment, OracleError> {
        Self::fulfill(self, id)
    }
}
