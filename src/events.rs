//! Notifications published by the raffle after each committed transition.

use std::sync::{mpsc, Arc, Mutex, PoisonError};

use crate::types::{PlayerId, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaffleEvent {
    EntranceRecorded { player: PlayerId },
    RequestedRaffleWinner { request_id: RequestId },
    WinnerPicked { winner: PlayerId },
}

/// Receiver of raffle notifications.
pub trait EventSink {
    fn publish(&mut self, event: &RaffleEvent);
}

impl EventSink for Vec<RaffleEvent> {
    fn publish(&mut self, event: &RaffleEvent) {
        self.push(*event);
    }
}

impl EventSink for mpsc::Sender<RaffleEvent> {
    fn publish(&mut self, event: &RaffleEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.send(*event);
    }
}

/// Shared, cloneable event recorder.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    inner: Arc<Mutex<Vec<RaffleEvent>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<RaffleEvent> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn last(&self) -> Option<RaffleEvent> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).last().copied()
    }

    /// Drain and return everything recorded so far.
    #[must_use]
    pub fn take(&self) -> Vec<RaffleEvent> {
        std::mem::take(&mut *self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for EventLog {
    fn publish(&mut self, event: &RaffleEvent) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).push(*event);
    }
}
