//! Generation and cancellation state of a query session

use crate::results::ResultAggregator;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Lifecycle of the current dispatch round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Dispatching,
    Completed,
    Cancelled,
}

struct ActiveRound {
    token: CancellationToken,
    state: DispatchState,
}

struct SessionInner {
    aggregator: Arc<ResultAggregator>,
    round: Mutex<ActiveRound>,
}

/// Owns the cancellation token of the current round.
///
/// The generation counter lives in the aggregator the session feeds, so
/// advancing a generation and closing the aggregator to older batches is
/// one step. Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct QuerySession {
    inner: Arc<SessionInner>,
}

impl QuerySession {
    pub fn new(aggregator: Arc<ResultAggregator>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                aggregator,
                round: Mutex::new(ActiveRound {
                    token: CancellationToken::new(),
                    state: DispatchState::Idle,
                }),
            }),
        }
    }

    fn round(&self) -> MutexGuard<'_, ActiveRound> {
        self.inner.round.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new generation and cancel the previous one.
    ///
    /// Returns the new generation and its cancellation token. Batches of
    /// older generations are rejected by the aggregator from here on.
    pub fn advance(&self) -> (u64, CancellationToken) {
        let mut round = self.round();
        let generation = self.inner.aggregator.advance();
        let token = CancellationToken::new();
        let previous = std::mem::replace(&mut round.token, token.clone());
        previous.cancel();
        round.state = DispatchState::Idle;
        (generation, token)
    }

    pub fn current_generation(&self) -> u64 {
        self.inner.aggregator.current_generation()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == generation
    }

    pub fn state(&self) -> DispatchState {
        self.round().state
    }

    /// Update the round state; ignored unless `generation` is current
    pub(crate) fn set_state(&self, generation: u64, state: DispatchState) -> bool {
        let mut round = self.round();
        if !self.is_current(generation) {
            return false;
        }
        round.state = state;
        true
    }

    /// Cancel the current round without starting a new one
    pub fn cancel(&self) {
        let mut round = self.round();
        round.token.cancel();
        if round.state == DispatchState::Dispatching {
            round.state = DispatchState::Cancelled;
        }
    }
}

impl std::fmt::Debug for QuerySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySession")
            .field("generation", &self.current_generation())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> QuerySession {
        QuerySession::new(Arc::new(ResultAggregator::new()))
    }

    #[test]
    fn test_advance_cancels_previous() {
        let session = session();
        let (g1, t1) = session.advance();
        let (g2, t2) = session.advance();

        assert_eq!(g1, 1);
        assert_eq!(g2, 2);
        assert!(t1.is_cancelled());
        assert!(!t2.is_cancelled());
        assert!(session.is_current(2));
    }

    #[test]
    fn test_stale_state_update_ignored() {
        let session = session();
        let (g1, _) = session.advance();
        assert!(session.set_state(g1, DispatchState::Dispatching));

        let (g2, _) = session.advance();
        assert!(!session.set_state(g1, DispatchState::Completed));
        assert_eq!(session.state(), DispatchState::Idle);

        assert!(session.set_state(g2, DispatchState::Completed));
        assert_eq!(session.state(), DispatchState::Completed);
    }

    #[test]
    fn test_clones_share_generation() {
        let session = session();
        let other = session.clone();
        session.advance();
        assert_eq!(other.current_generation(), 1);
    }

    #[test]
    fn test_advance_moves_aggregator_generation() {
        let aggregator = Arc::new(ResultAggregator::new());
        let session = QuerySession::new(aggregator.clone());
        let (g1, _) = session.advance();
        let (g2, _) = session.advance();

        assert_eq!(aggregator.current_generation(), g2);
        assert!(!aggregator.publish("a", g1, vec![crate::results::ResultItem::new("late")]));
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_cancel() {
        let session = session();
        let (g, token) = session.advance();
        session.set_state(g, DispatchState::Dispatching);

        session.cancel();
        assert!(token.is_cancelled());
        assert_eq!(session.state(), DispatchState::Cancelled);
    }
}
