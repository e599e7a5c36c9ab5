//! Pending-response registry.
//!
//! Every outbound message that wants a reply — an `Ack`, a `ConnectResponse`,
//! or a Stump JSON-RPC response keyed by its own `msgid` — registers a
//! oneshot future under a correlation key before sending. Resolution
//! happens at most once; a key nobody's waiting on (a late retransmit's
//! ack, say) is simply dropped.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::{Result, SessionError};

/// Outcome of a plain sequence-number ack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckOutcome {
    Processed,
    Rejected,
}

/// The correlation key an `AckWaiter` entry is registered under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WaitKey {
    Sequence(u32),
    Connect,
    Json(String),
}

impl WaitKey {
    pub fn ack(sequence: u32) -> Self {
        WaitKey::Sequence(sequence)
    }
}

/// A value resolved into an `AckWaiter` entry, generic over what the
/// caller expects back (an `AckOutcome`, a decoded `SimplePacket`, a
/// `serde_json::Value`, ...).
pub struct AckWaiter<T> {
    pending: Mutex<HashMap<WaitKey, oneshot::Sender<T>>>,
}

impl<T> Default for AckWaiter<T> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> AckWaiter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key`, returning a receiver that resolves when
    /// [`AckWaiter::resolve`] is called with the same key, or after
    /// `timeout` elapses.
    pub fn register(&self, key: WaitKey) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().expect("ack waiter mutex poisoned").insert(key, tx);
        rx
    }

    /// Resolve a pending registration. A no-op if nothing is registered
    /// under `key` (already resolved, timed out, or never registered).
    pub fn resolve(&self, key: &WaitKey, value: T) {
        if let Some(tx) = self.pending.lock().expect("ack waiter mutex poisoned").remove(key) {
            let _ = tx.send(value);
        }
    }

    /// Drop a registration without resolving it (used when giving up after
    /// retry exhaustion).
    pub fn cancel(&self, key: &WaitKey) {
        self.pending.lock().expect("ack waiter mutex poisoned").remove(key);
    }

    /// Drop every pending registration, dropping each entry's sender so any
    /// in-flight `wait` call observes `Cancelled` rather than `Timeout`.
    /// Used on disconnect, where no further resolution will ever arrive.
    pub fn cancel_all(&self) {
        self.pending.lock().expect("ack waiter mutex poisoned").clear();
    }

    pub async fn wait(&self, key: WaitKey, timeout: Duration) -> Result<T> {
        let rx = self.register(key.clone());
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(SessionError::Cancelled(format!("{key:?}"))),
            Err(_) => {
                self.cancel(&key);
                Err(SessionError::Timeout(format!("{key:?}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_delivers_to_waiter() {
        let waiter: AckWaiter<AckOutcome> = AckWaiter::new();
        let key = WaitKey::ack(42);
        let rx = waiter.register(key.clone());
        waiter.resolve(&key, AckOutcome::Processed);
        assert_eq!(rx.await.unwrap(), AckOutcome::Processed);
    }

    #[tokio::test]
    async fn duplicate_resolution_is_a_no_op() {
        let waiter: AckWaiter<AckOutcome> = AckWaiter::new();
        let key = WaitKey::ack(1);
        waiter.resolve(&key, AckOutcome::Processed); // nobody waiting, dropped
        let rx = waiter.register(key.clone());
        waiter.resolve(&key, AckOutcome::Rejected);
        waiter.resolve(&key, AckOutcome::Processed); // already consumed, ignored
        assert_eq!(rx.await.unwrap(), AckOutcome::Rejected);
    }

    #[tokio::test]
    async fn wait_times_out_when_never_resolved() {
        let waiter: AckWaiter<AckOutcome> = AckWaiter::new();
        let result = waiter.wait(WaitKey::ack(7), Duration::from_millis(20)).await;
        assert!(matches!(result, Err(SessionError::Timeout(_))));
    }

    #[tokio::test]
    async fn cancel_all_resolves_waiters_as_cancelled_not_timed_out() {
        let waiter: std::sync::Arc<AckWaiter<AckOutcome>> = std::sync::Arc::new(AckWaiter::new());
        let w = waiter.clone();
        let handle = tokio::spawn(async move { w.wait(WaitKey::ack(1), Duration::from_secs(5)).await });

        tokio::task::yield_now().await;
        waiter.cancel_all();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(SessionError::Cancelled(_))));
    }
}

impl std::fmt::Debug for WaitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitKey::Sequence(n) => write!(f, "ack_{n}"),
            WaitKey::Connect => write!(f, "connect"),
            WaitKey::Json(id) => write!(f, "json:{id}"),
        }
    }
}
