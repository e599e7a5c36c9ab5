//! Typed observer lists.
//!
//! Each event name on `Console`/`SessionEngine` gets its own
//! `EventEmitter<T>` carrying a fixed payload type, rather than a single
//! stringly-typed bus. Handlers are invoked synchronously, in subscription
//! order, on whatever task calls `emit`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// An opaque identifier returned by [`EventEmitter::subscribe`], used to
/// remove a handler later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Handler<T> = Box<dyn Fn(&T) + Send + Sync>;

/// A list of handlers for one event, each invoked with a reference to the
/// event payload when [`emit`](EventEmitter::emit) is called.
pub struct EventEmitter<T> {
    handlers: Mutex<Vec<(SubscriptionToken, Handler<T>)>>,
    next_token: AtomicU64,
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }
}

impl<T> EventEmitter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`, returning a token that can later be passed to
    /// [`unsubscribe`](EventEmitter::unsubscribe).
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionToken
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .expect("event emitter mutex poisoned")
            .push((token, Box::new(handler)));
        token
    }

    /// Remove a previously registered handler. A no-op if `token` was
    /// already removed or never existed.
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.handlers
            .lock()
            .expect("event emitter mutex poisoned")
            .retain(|(t, _)| *t != token);
    }

    /// Invoke every registered handler with `value`, in subscription order.
    pub fn emit(&self, value: &T) {
        for (_, handler) in self.handlers.lock().expect("event emitter mutex poisoned").iter() {
            handler(value);
        }
    }
}

impl<T> std::fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.handlers.lock().map(|h| h.len()).unwrap_or(0);
        f.debug_struct("EventEmitter").field("handlers", &count).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[test]
    fn emit_calls_every_subscriber() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let total = Arc::new(AtomicU32::new(0));

        let t1 = total.clone();
        emitter.subscribe(move |v| {
            t1.fetch_add(*v, Ordering::SeqCst);
        });
        let t2 = total.clone();
        emitter.subscribe(move |v| {
            t2.fetch_add(*v * 10, Ordering::SeqCst);
        });

        emitter.emit(&3);
        assert_eq!(total.load(Ordering::SeqCst), 33);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let total = Arc::new(AtomicU32::new(0));
        let t = total.clone();
        let token = emitter.subscribe(move |v| {
            t.fetch_add(*v, Ordering::SeqCst);
        });
        emitter.unsubscribe(token);
        emitter.emit(&5);
        assert_eq!(total.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribing_twice_is_a_no_op() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let token = emitter.subscribe(|_| {});
        emitter.unsubscribe(token);
        emitter.unsubscribe(token);
    }
}
