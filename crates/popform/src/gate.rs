use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{oneshot, watch};

use crate::form::FormResponse;

/// Terminal outcome of one session, delivered through the gate exactly once.
#[derive(Debug)]
pub enum SessionOutcome {
    /// A user action: a real submission or a synthesized skip.
    Resolved(FormResponse),
    /// Fatal listener error before anything resolved.
    TransportFailed(String),
    /// Externally force-closed without a pending result.
    Closed,
}

/// Single-fire latch shared by every trigger path: the disconnect stream,
/// the submission endpoint, browser-launch failure, listener errors, and
/// external force-close. The first claim wins; everything after is a no-op.
///
/// Claiming and delivering are split so the submission path can reserve the
/// outcome synchronously, acknowledge the HTTP client, and deliver (which
/// also triggers listener shutdown) after a short grace delay.
pub struct ResolutionGate {
    claimed: AtomicBool,
    outcome_tx: Mutex<Option<oneshot::Sender<SessionOutcome>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl ResolutionGate {
    pub fn new() -> (Self, oneshot::Receiver<SessionOutcome>) {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, _) = watch::channel(false);
        let gate = Self {
            claimed: AtomicBool::new(false),
            outcome_tx: Mutex::new(Some(outcome_tx)),
            shutdown_tx,
        };
        (gate, outcome_rx)
    }

    /// Reserves the right to deliver the outcome. Returns false if another
    /// trigger already won.
    pub fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Sends the outcome and triggers listener shutdown. Only meaningful
    /// after a successful `try_claim`.
    pub fn deliver(&self, outcome: SessionOutcome) {
        let sender = self
            .outcome_tx
            .lock()
            .expect("gate outcome lock poisoned")
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(outcome);
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Claim-and-deliver in one step. Returns true if this call resolved the
    /// session, false if it was already resolved.
    pub fn resolve(&self, outcome: SessionOutcome) -> bool {
        if !self.try_claim() {
            return false;
        }
        self.deliver(outcome);
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Receiver that flips to true when the session resolves; long-lived
    /// streams and timers end themselves on it.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::form::FormResponse;

    #[tokio::test]
    async fn first_resolve_wins_and_later_calls_are_noops() {
        let (gate, outcome_rx) = ResolutionGate::new();
        assert!(!gate.is_resolved());
        assert!(gate.resolve(SessionOutcome::Resolved(FormResponse::skipped())));
        assert!(gate.is_resolved());
        assert!(!gate.resolve(SessionOutcome::TransportFailed("late".to_string())));

        match outcome_rx.await.unwrap() {
            SessionOutcome::Resolved(response) => assert_eq!(response, FormResponse::skipped()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_racers_resolve_exactly_once() {
        let (gate, outcome_rx) = ResolutionGate::new();
        let gate = Arc::new(gate);

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let gate = gate.clone();
            tasks.push(tokio::spawn(async move {
                gate.resolve(SessionOutcome::Resolved(FormResponse::skipped()))
            }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(outcome_rx.await.is_ok());
    }

    #[tokio::test]
    async fn claim_defers_delivery_until_explicit() {
        let (gate, mut outcome_rx) = ResolutionGate::new();
        let mut shutdown = gate.shutdown_signal();

        assert!(gate.try_claim());
        assert!(gate.is_resolved());
        assert!(outcome_rx.try_recv().is_err());
        assert!(!*shutdown.borrow());

        gate.deliver(SessionOutcome::Resolved(FormResponse::skipped()));
        assert!(outcome_rx.try_recv().is_ok());
        shutdown.changed().await.unwrap();
        assert!(*shutdown.borrow());
    }
}
