//! Last-request-wins sequencing for a single render target.
//!
//! Every request for the target gets a ticket stamped with a fresh
//! generation. Starting a new request cancels the previous ticket, and a
//! result is committed only if its ticket still carries the current
//! generation. A late result for an older request therefore never replaces
//! newer content, and the target keeps its last committed value until the
//! newest request settles.

use crate::CancellationToken;

#[derive(Debug, Clone)]
pub struct RenderTicket<K> {
    generation: u64,
    key: K,
    token: CancellationToken,
}

impl<K> RenderTicket<K> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The result became the slot's committed value.
    Committed,
    /// A newer request (or a reset) made this result stale; it was dropped.
    Superseded,
    /// The current request failed; the previous committed value is kept.
    Failed,
}

#[derive(Debug)]
pub struct RenderSlot<K, T> {
    generation: u64,
    pending: Option<CancellationToken>,
    committed: Option<(K, T)>,
}

impl<K: Clone, T> RenderSlot<K, T> {
    pub fn new() -> Self {
        Self { generation: 0, pending: None, committed: None }
    }

    /// Starts a new request, cancelling whichever one was outstanding.
    pub fn begin(&mut self, key: K) -> RenderTicket<K> {
        self.cancel_pending();
        self.generation += 1;

        let token = CancellationToken::new();
        self.pending = Some(token.clone());
        RenderTicket { generation: self.generation, key, token }
    }

    /// Offers a finished result. Only the newest live ticket commits.
    pub fn complete(&mut self, ticket: RenderTicket<K>, value: T) -> RenderOutcome {
        if !self.is_current(&ticket) {
            return RenderOutcome::Superseded;
        }

        self.pending = None;
        self.committed = Some((ticket.key, value));
        RenderOutcome::Committed
    }

    /// Reports that the request behind `ticket` failed.
    pub fn fail(&mut self, ticket: &RenderTicket<K>) -> RenderOutcome {
        if !self.is_current(ticket) {
            return RenderOutcome::Superseded;
        }

        self.pending = None;
        RenderOutcome::Failed
    }

    /// Cancels the outstanding request, if any, without touching the
    /// committed value. Results still in flight become stale.
    pub fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
            self.generation += 1;
        }
    }

    /// Cancels everything and forgets the committed value.
    pub fn reset(&mut self) {
        self.cancel_pending();
        self.generation += 1;
        self.committed = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn committed(&self) -> Option<(&K, &T)> {
        self.committed.as_ref().map(|(key, value)| (key, value))
    }

    fn is_current(&self, ticket: &RenderTicket<K>) -> bool {
        ticket.generation == self.generation && !ticket.token.is_cancelled()
    }
}

impl<K: Clone, T> Default for RenderSlot<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
