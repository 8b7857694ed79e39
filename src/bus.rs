//! Named pub/sub event bus with snapshot dispatch.
//!
//! Subscriptions are kept in registration order per event name. `send`
//! dispatches synchronously against a snapshot of the subscriber list taken
//! at call time: a callback that registers or unregisters subscribers during
//! dispatch changes what the *next* send sees, never the pass in flight.

use crate::observability::record_events_dispatched;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Handler invoked with the event name and opaque payload.
pub type EventHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Identity of a subscribed callback.
///
/// A given `(event, CallbackId)` pair is unique on the bus; re-registering
/// it replaces the handler in its existing slot. For callbacks crossing the
/// C ABI the id is the function address, so the same extern fn registered
/// twice is the same subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackId(u64);

impl CallbackId {
    /// Identity of a raw ABI callback: its function address.
    pub fn from_raw_callback(callback: crate::abi::RawEventCallback) -> Self {
        Self(callback as usize as u64)
    }

    /// Allocate a fresh id for a host-side closure.
    ///
    /// Allocated ids carry the top bit, keeping them disjoint from function
    /// addresses.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed) | (1 << 63))
    }
}

struct Subscription {
    id: CallbackId,
    handler: EventHandler,
}

/// The host's event bus.
///
/// Interior-locked; every mutating operation is atomic with respect to the
/// others, and the lock is never held across handler invocations.
pub struct EventBus {
    listeners: Mutex<HashMap<String, Vec<Subscription>>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe `handler` to `event` under the identity `id`.
    ///
    /// Idempotent per `(event, id)`: an existing subscription keeps its slot
    /// in registration order and only its handler is replaced.
    pub fn register(&self, event: &str, id: CallbackId, handler: EventHandler) {
        let mut listeners = self.listeners.lock().unwrap();
        let subs = listeners.entry(event.to_string()).or_default();
        if let Some(existing) = subs.iter_mut().find(|s| s.id == id) {
            existing.handler = handler;
        } else {
            subs.push(Subscription { id, handler });
        }
    }

    /// Remove `id` from every event it is subscribed to.
    ///
    /// Returns whether any subscription was removed.
    pub fn unregister(&self, id: CallbackId) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        let mut removed = false;
        for subs in listeners.values_mut() {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            removed |= subs.len() != before;
        }
        removed
    }

    /// Dispatch an event synchronously, in subscription order.
    ///
    /// Unknown event names are a silent no-op. Returns the number of
    /// handlers invoked.
    pub fn send(&self, event: &str, payload: &str) -> usize {
        // Snapshot under the lock, dispatch outside it: handlers may
        // re-enter the bus.
        let snapshot: Vec<EventHandler> = {
            let listeners = self.listeners.lock().unwrap();
            match listeners.get(event) {
                Some(subs) => subs.iter().map(|s| s.handler.clone()).collect(),
                None => return 0,
            }
        };

        for handler in &snapshot {
            handler(event, payload);
        }
        record_events_dispatched(snapshot.len() as u64);
        snapshot.len()
    }

    /// Number of subscriptions for an event name.
    pub fn subscriber_count(&self, event: &str) -> usize {
        let listeners = self.listeners.lock().unwrap();
        listeners.get(event).map_or(0, Vec::len)
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.listeners.lock().unwrap().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.lock().unwrap();
        f.debug_struct("EventBus")
            .field("events", &listeners.len())
            .field(
                "subscriptions",
                &listeners.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn recording_handler(log: Arc<StdMutex<Vec<String>>>, tag: &str) -> EventHandler {
        let tag = tag.to_string();
        Arc::new(move |event, payload| {
            log.lock().unwrap().push(format!("{tag}:{event}:{payload}"));
        })
    }

    #[test]
    fn test_send_invokes_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        bus.register("x", CallbackId::next(), recording_handler(log.clone(), "a"));
        bus.register("x", CallbackId::next(), recording_handler(log.clone(), "b"));

        assert_eq!(bus.send("x", "p"), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:x:p", "b:x:p"]);
    }

    #[test]
    fn test_unknown_event_is_noop() {
        let bus = EventBus::new();
        assert_eq!(bus.send("nobody-home", "p"), 0);
    }

    #[test]
    fn test_register_is_idempotent_per_identity() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let id = CallbackId::next();

        bus.register("x", id, recording_handler(log.clone(), "first"));
        bus.register("x", CallbackId::next(), recording_handler(log.clone(), "other"));
        // Re-registering keeps the original slot.
        bus.register("x", id, recording_handler(log.clone(), "second"));

        assert_eq!(bus.subscriber_count("x"), 2);
        bus.send("x", "p");
        assert_eq!(*log.lock().unwrap(), vec!["second:x:p", "other:x:p"]);
    }

    #[test]
    fn test_unregister_strips_all_events() {
        let bus = EventBus::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let id = CallbackId::next();

        bus.register("x", id, recording_handler(log.clone(), "cb"));
        bus.register("y", id, recording_handler(log.clone(), "cb"));

        assert!(bus.unregister(id));
        assert_eq!(bus.send("x", "p"), 0);
        assert_eq!(bus.send("y", "p"), 0);
        assert!(!bus.unregister(id));
    }

    #[test]
    fn test_dispatch_uses_snapshot() {
        let bus = Arc::new(EventBus::new());
        let log = Arc::new(StdMutex::new(Vec::new()));
        let victim = CallbackId::next();

        // First handler in order unregisters the second mid-dispatch; the
        // in-flight pass must still reach it.
        let saboteur = {
            let bus = bus.clone();
            let log = log.clone();
            Arc::new(move |event: &str, payload: &str| {
                log.lock().unwrap().push(format!("saboteur:{event}:{payload}"));
                bus.unregister(victim);
            }) as EventHandler
        };
        bus.register("x", CallbackId::next(), saboteur);
        bus.register("x", victim, recording_handler(log.clone(), "victim"));

        assert_eq!(bus.send("x", "p"), 2);
        assert_eq!(*log.lock().unwrap(), vec!["saboteur:x:p", "victim:x:p"]);

        // The unregistration takes effect for the next send.
        log.lock().unwrap().clear();
        assert_eq!(bus.send("x", "p2"), 1);
        assert_eq!(*log.lock().unwrap(), vec!["saboteur:x:p2"]);
    }

    #[test]
    fn test_reentrant_registration_affects_next_send_only() {
        let bus = Arc::new(EventBus::new());
        let log = Arc::new(StdMutex::new(Vec::new()));

        let late_id = CallbackId::next();
        let registrar = {
            let bus = bus.clone();
            let log = log.clone();
            Arc::new(move |_: &str, _: &str| {
                let log = log.clone();
                bus.register(
                    "x",
                    late_id,
                    Arc::new(move |e: &str, p: &str| {
                        log.lock().unwrap().push(format!("late:{e}:{p}"));
                    }),
                );
            }) as EventHandler
        };
        bus.register("x", CallbackId::next(), registrar);

        assert_eq!(bus.send("x", "p1"), 1);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.send("x", "p2"), 2);
        assert_eq!(*log.lock().unwrap(), vec!["late:x:p2"]);
    }
}
