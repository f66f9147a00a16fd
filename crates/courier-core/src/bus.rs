//! Synchronous in-process event bus.
//!
//! Subscribers register a handler for a concrete event type; publishing
//! fans out synchronously to every handler registered for that type, on
//! the publishing thread. The broker dispatcher relies on this: a decoded
//! packet is delivered to local subscribers before the delivery callback
//! returns.
//!
//! Handlers are cloned out of the registration lock before invocation, so
//! a handler may itself subscribe or unsubscribe without deadlocking, and
//! a slow handler only stalls the publishing call.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

type Handler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    type_id: TypeId,
    token: u64,
}

/// Synchronous typed publish/subscribe.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<TypeId, Vec<(u64, Handler)>>>,
    next_token: AtomicU64,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of type `E`.
    pub fn subscribe<E, F>(&self, handler: F) -> Subscription
    where
        E: Any,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let type_id = TypeId::of::<E>();
        let erased: Handler = Arc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });

        let mut handlers = self.handlers.write().expect("event bus lock poisoned");
        handlers.entry(type_id).or_default().push((token, erased));
        Subscription { type_id, token }
    }

    /// Removes a previously registered handler.
    ///
    /// Unsubscribing twice is a no-op.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut handlers = self.handlers.write().expect("event bus lock poisoned");
        if let Some(list) = handlers.get_mut(&subscription.type_id) {
            list.retain(|(token, _)| *token != subscription.token);
            if list.is_empty() {
                handlers.remove(&subscription.type_id);
            }
        }
    }

    /// Publishes `event` to every handler registered for `E`.
    pub fn publish<E: Any>(&self, event: &E) {
        self.publish_dyn(event);
    }

    /// Publishes a type-erased event.
    ///
    /// The handlers invoked are those registered for the event's concrete
    /// type, as reported by `event.type_id()`.
    pub fn publish_dyn(&self, event: &dyn Any) {
        let matching: Vec<Handler> = {
            let handlers = self.handlers.read().expect("event bus lock poisoned");
            match handlers.get(&event.type_id()) {
                Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return,
            }
        };

        for handler in matching {
            handler(event);
        }
    }

    /// Returns the number of handlers registered for `E`.
    pub fn subscriber_count<E: Any>(&self) -> usize {
        let handlers = self.handlers.read().expect("event bus lock poisoned");
        handlers.get(&TypeId::of::<E>()).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().expect("event bus lock poisoned");
        f.debug_struct("EventBus")
            .field("event_types", &handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, PartialEq)]
    struct Ping(u32);

    #[derive(Debug)]
    struct Pong;

    #[test]
    fn fan_out_to_all_subscribers() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let seen = Arc::clone(&seen);
            bus.subscribe::<Ping, _>(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.publish(&Ping(1));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn events_are_isolated_by_type() {
        let bus = EventBus::new();
        let pings = Arc::new(AtomicUsize::new(0));
        let pongs = Arc::new(AtomicUsize::new(0));

        {
            let pings = Arc::clone(&pings);
            bus.subscribe::<Ping, _>(move |_| {
                pings.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let pongs = Arc::clone(&pongs);
            bus.subscribe::<Pong, _>(move |_| {
                pongs.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.publish(&Ping(7));
        assert_eq!(pings.load(Ordering::SeqCst), 1);
        assert_eq!(pongs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_receives_payload() {
        let bus = EventBus::new();
        let values = Arc::new(Mutex::new(Vec::new()));

        {
            let values = Arc::clone(&values);
            bus.subscribe::<Ping, _>(move |p| {
                values.lock().unwrap().push(p.0);
            });
        }

        bus.publish(&Ping(1));
        bus.publish(&Ping(2));
        assert_eq!(*values.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let sub = {
            let seen = Arc::clone(&seen);
            bus.subscribe::<Ping, _>(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        };

        bus.publish(&Ping(1));
        bus.unsubscribe(&sub);
        bus.publish(&Ping(2));
        bus.unsubscribe(&sub);

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count::<Ping>(), 0);
    }

    #[test]
    fn publish_dyn_uses_concrete_type() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        {
            let seen = Arc::clone(&seen);
            bus.subscribe::<Ping, _>(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }

        let erased: Box<dyn Any> = Box::new(Ping(9));
        bus.publish_dyn(erased.as_ref());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_may_subscribe_during_publish() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(AtomicUsize::new(0));

        {
            let bus2 = Arc::clone(&bus);
            let seen = Arc::clone(&seen);
            bus.subscribe::<Ping, _>(move |_| {
                let seen = Arc::clone(&seen);
                bus2.subscribe::<Pong, _>(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                });
            });
        }

        bus.publish(&Ping(1));
        bus.publish(&Pong);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
