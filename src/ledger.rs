use std::collections::{HashMap, HashSet};

use crate::{errors::PayoutError, types::{Amount, PlayerId}};

/// Destination for prize payouts.
pub trait Ledger {
    /// Move `amount` to `to`. Must either complete fully or leave no trace.
    ///
    /// # Errors
    /// Returns `PayoutError` when the recipient cannot receive the funds.
    fn transfer(&mut self, to: &PlayerId, amount: Amount) -> Result<(), PayoutError>;
}

impl<L: Ledger + ?Sized> Ledger for &mut L {
    fn transfer(&mut self, to: &PlayerId, amount: Amount) -> Result<(), PayoutError> {
        (**self).transfer(to, amount)
    }
}

/// Account balances held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    balances: HashMap<PlayerId, Amount>,
    rejecting: HashSet<PlayerId>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn balance_of(&self, who: &PlayerId) -> Amount {
        self.balances.get(who).copied().unwrap_or(0)
    }

    /// Credit funds outside of a payout, e.g. seeding a test account.
    ///
    /// # Errors
    /// Returns `PayoutError::Overflow` if the balance would overflow.
    pub fn credit(&mut self, who: &PlayerId, amount: Amount) -> Result<(), PayoutError> {
        let bal = self.balances.entry(*who).or_insert(0);
        *bal = bal.checked_add(amount).ok_or(PayoutError::Overflow)?;
        Ok(())
    }

    /// Remove funds, returning `false` without change if the balance is short.
    pub fn debit(&mut self, who: &PlayerId, amount: Amount) -> bool {
        match self.balances.get_mut(who) {
            Some(bal) if *bal >= amount => {
                *bal -= amount;
                true
            }
            _ => amount == 0,
        }
    }

    /// Make every later transfer to `who` fail with `PayoutError::Rejected`.
    pub fn reject_payments_to(&mut self, who: PlayerId) {
        self.rejecting.insert(who);
    }

    pub fn accept_payments_to(&mut self, who: &PlayerId) {
        self.rejecting.remove(who);
    }

    #[must_use]
    pub fn total(&self) -> Amount {
        self.balances.values().fold(0, |acc, b| acc.saturating_add(*b))
    }
}

impl Ledger for InMemoryLedger {
    fn transfer(&mut self, to: &PlayerId, amount: Amount) -> Result<(), PayoutError> {
        if self.rejecting.contains(to) {
            return Err(PayoutError::Rejected);
        }
        self.credit(to, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_credits_recipient() {
        let mut ledger = InMemoryLedger::new();
        let alice = PlayerId([1u8; 32]);
        ledger.transfer(&alice, 40).unwrap();
        ledger.transfer(&alice, 2).unwrap();
        assert_eq!(ledger.balance_of(&alice), 42);
    }

    #[test]
    fn rejecting_recipient_is_untouched() {
        let mut ledger = InMemoryLedger::new();
        let bob = PlayerId([2u8; 32]);
        ledger.reject_payments_to(bob);
        assert_eq!(ledger.transfer(&bob, 10), Err(PayoutError::Rejected));
        assert_eq!(ledger.balance_of(&bob), 0);
        ledger.accept_payments_to(&bob);
        assert!(ledger.transfer(&bob, 10).is_ok());
    }

    #[test]
    fn overflow_is_reported() {
        let mut ledger = InMemoryLedger::new();
        let carol = PlayerId([3u8; 32]);
        ledger.credit(&carol, Amount::MAX).unwrap();
        assert_eq!(ledger.transfer(&carol, 1), Err(PayoutError::Overflow));
        assert_eq!(ledger.balance_of(&carol), Amount::MAX);
    }

    #[test]
    fn debit_requires_funds() {
        let mut ledger = InMemoryLedger::new();
        let dave = PlayerId([4u8; 32]);
        ledger.credit(&dave, 5).unwrap();
        assert!(!ledger.debit(&dave, 6));
        assert!(ledger.debit(&dave, 5));
        assert_eq!(ledger.balance_of(&dave), 0);
    }
}
