//! Stream Registry
//!
//! Maps a [`StreamKey`] to the live consumer sink and the cancellation flag
//! of the session that owns it. Registration is an atomic swap: installing
//! a new session for a key cancels whatever was there — this is how a seek
//! supersedes an in-progress stream on the same logical path, and when two
//! requests race, the last writer wins.
//!
//! # Thread Safety
//!
//! The map lives behind a single `parking_lot::RwLock` held only for the
//! lookup or swap itself, never across a channel send or a remote read.
//! Emission clones the sender out of the lock and performs the blocking
//! send outside it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::streaming::events::{StreamEvent, StreamKey, StreamSessionId};

/// Result of attempting to emit through the registry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitOutcome {
    /// The consumer accepted the event
    Delivered,
    /// No sink is registered for the key, or the session was superseded;
    /// the event was discarded
    NoSink,
    /// The consumer dropped its receiver; the session should stop
    Disconnected,
}

struct RegisteredSink {
    session_id: StreamSessionId,
    sink: mpsc::Sender<StreamEvent>,
    cancel: Arc<AtomicBool>,
}

/// Registry of active streams by key
///
/// Cloning is cheap and shares the underlying map.
#[derive(Clone, Default)]
pub struct StreamRegistry {
    inner: Arc<RwLock<HashMap<StreamKey, RegisteredSink>>>,
}

impl StreamRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session as the owner of `key`
    ///
    /// Any existing owner is cancelled first (best-effort immediate
    /// detach: its cancel flag is raised and its sink entry replaced).
    /// Returns true if an existing session was superseded.
    pub fn register(
        &self,
        key: StreamKey,
        session_id: StreamSessionId,
        sink: mpsc::Sender<StreamEvent>,
        cancel: Arc<AtomicBool>,
    ) -> bool {
        let mut inner = self.inner.write();
        let superseded = inner.insert(
            key.clone(),
            RegisteredSink {
                session_id,
                sink,
                cancel,
            },
        );
        if let Some(old) = &superseded {
            old.cancel.store(true, Ordering::SeqCst);
            info!(
                key = %key,
                old = %old.session_id,
                new = %session_id,
                "superseding active stream"
            );
        }
        superseded.is_some()
    }

    /// Remove `key` only if `session_id` is still its registered owner
    ///
    /// A session that lost a registration race must not tear down the newer
    /// entry that replaced it.
    pub fn unregister(&self, key: &StreamKey, session_id: StreamSessionId) -> bool {
        let mut inner = self.inner.write();
        if inner
            .get(key)
            .is_some_and(|entry| entry.session_id == session_id)
        {
            inner.remove(key);
            debug!(key = %key, session = %session_id, "stream unregistered");
            true
        } else {
            false
        }
    }

    /// Cancel the stream registered for `key` (consumer detach)
    ///
    /// Raises the owner's cancel flag and removes the sink so no further
    /// events reach the consumer. Returns whether a stream was active.
    pub fn cancel(&self, key: &StreamKey) -> bool {
        let mut inner = self.inner.write();
        if let Some(entry) = inner.remove(key) {
            entry.cancel.store(true, Ordering::SeqCst);
            info!(key = %key, session = %entry.session_id, "stream cancelled");
            true
        } else {
            false
        }
    }

    /// Whether `session_id` is still the registered owner of `key`
    #[must_use]
    pub fn is_current(&self, key: &StreamKey, session_id: StreamSessionId) -> bool {
        self.inner
            .read()
            .get(key)
            .is_some_and(|entry| entry.session_id == session_id)
    }

    /// Number of active streams
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.read().len()
    }

    /// Deliver an event on behalf of a session, blocking until the consumer
    /// accepts it
    ///
    /// The send only happens while `session_id` still owns the key; a
    /// late-arriving emit after supersession or detach is a no-op. Must be
    /// called from a blocking worker, never from an async context.
    pub fn emit_blocking(
        &self,
        key: &StreamKey,
        session_id: StreamSessionId,
        event: StreamEvent,
    ) -> EmitOutcome {
        let sink = {
            let inner = self.inner.read();
            match inner.get(key) {
                Some(entry) if entry.session_id == session_id => entry.sink.clone(),
                _ => return EmitOutcome::NoSink,
            }
        };
        match sink.blocking_send(event) {
            Ok(()) => EmitOutcome::Delivered,
            Err(_) => EmitOutcome::Disconnected,
        }
    }
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("StreamRegistry")
            .field("active", &inner.len())
            .field("keys", &inner.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::events::StreamEventKind;

    fn entry() -> (
        StreamSessionId,
        mpsc::Sender<StreamEvent>,
        mpsc::Receiver<StreamEvent>,
        Arc<AtomicBool>,
    ) {
        let (tx, rx) = mpsc::channel(1);
        (
            StreamSessionId::next(),
            tx,
            rx,
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn end_event(key: &StreamKey) -> StreamEvent {
        StreamEvent {
            key: key.clone(),
            kind: StreamEventKind::EndOfStream { bytes_delivered: 0 },
        }
    }

    #[test]
    fn test_register_and_supersede_cancels_old() {
        let registry = StreamRegistry::new();
        let key = StreamKey::from_path("/media/a.mkv");

        let (old_id, old_tx, _old_rx, old_cancel) = entry();
        assert!(!registry.register(key.clone(), old_id, old_tx, old_cancel.clone()));
        assert!(registry.is_current(&key, old_id));

        let (new_id, new_tx, _new_rx, new_cancel) = entry();
        assert!(registry.register(key.clone(), new_id, new_tx, new_cancel));

        assert!(old_cancel.load(Ordering::SeqCst));
        assert!(!registry.is_current(&key, old_id));
        assert!(registry.is_current(&key, new_id));
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_unregister_only_removes_owner() {
        let registry = StreamRegistry::new();
        let key = StreamKey::from_path("/media/a.mkv");

        let (old_id, old_tx, _old_rx, old_cancel) = entry();
        registry.register(key.clone(), old_id, old_tx, old_cancel);
        let (new_id, new_tx, _new_rx, new_cancel) = entry();
        registry.register(key.clone(), new_id, new_tx, new_cancel);

        // The superseded session cannot remove the entry that raced past it
        assert!(!registry.unregister(&key, old_id));
        assert_eq!(registry.active_count(), 1);

        assert!(registry.unregister(&key, new_id));
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_emit_to_missing_key_is_noop() {
        let registry = StreamRegistry::new();
        let key = StreamKey::from_path("/gone");
        let outcome = registry.emit_blocking(&key, StreamSessionId::next(), end_event(&key));
        assert_eq!(outcome, EmitOutcome::NoSink);
    }

    #[test]
    fn test_emit_from_superseded_session_is_noop() {
        let registry = StreamRegistry::new();
        let key = StreamKey::from_path("/media/a.mkv");

        let (old_id, old_tx, mut old_rx, old_cancel) = entry();
        registry.register(key.clone(), old_id, old_tx, old_cancel);
        let (new_id, new_tx, _new_rx, new_cancel) = entry();
        registry.register(key.clone(), new_id, new_tx, new_cancel);

        let outcome = registry.emit_blocking(&key, old_id, end_event(&key));
        assert_eq!(outcome, EmitOutcome::NoSink);
        assert!(old_rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_disconnected_when_receiver_dropped() {
        let registry = StreamRegistry::new();
        let key = StreamKey::from_path("/media/a.mkv");

        let (id, tx, rx, cancel) = entry();
        registry.register(key.clone(), id, tx, cancel);
        drop(rx);

        let outcome = registry.emit_blocking(&key, id, end_event(&key));
        assert_eq!(outcome, EmitOutcome::Disconnected);
    }

    #[test]
    fn test_cancel_detaches_and_raises_flag() {
        let registry = StreamRegistry::new();
        let key = StreamKey::from_path("/media/a.mkv");

        let (id, tx, _rx, cancel) = entry();
        registry.register(key.clone(), id, tx, cancel.clone());

        assert!(registry.cancel(&key));
        assert!(cancel.load(Ordering::SeqCst));
        assert_eq!(registry.active_count(), 0);

        // Second cancel is a no-op
        assert!(!registry.cancel(&key));
    }

    #[test]
    fn test_delivered_event_reaches_sink() {
        let registry = StreamRegistry::new();
        let key = StreamKey::from_path("/media/a.mkv");

        let (id, tx, mut rx, cancel) = entry();
        registry.register(key.clone(), id, tx, cancel);

        let outcome = registry.emit_blocking(&key, id, end_event(&key));
        assert_eq!(outcome, EmitOutcome::Delivered);
        assert!(matches!(
            rx.try_recv().expect("event queued").kind,
            StreamEventKind::EndOfStream { .. }
        ));
    }
}
