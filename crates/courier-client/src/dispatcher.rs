//! Delivery dispatcher.
//!
//! One dispatcher serves every subscription of a client. Each delivery is
//! handled independently: filter by author, decode, stamp the
//! authoritative author, fan out on the local event bus. Broker lifecycle
//! signals become local events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace, warn};

use courier_broker::BrokerConsumer;
use courier_core::{AUTHOR_KEY, EventBus, Metadata};
use courier_protocol::{PacketRegistry, decode_packet};

use crate::destination::QueueSpec;
use crate::events::{ConsumerReadyEvent, ShutdownEvent};

/// The client's local bookkeeping, shared with the dispatcher.
#[derive(Default)]
pub(crate) struct RoutingTable {
    /// Destinations keyed by name; last bind wins.
    pub(crate) destinations: HashMap<String, QueueSpec>,
    /// Consumer tag → destination name, recorded at bind time.
    pub(crate) consumers: HashMap<String, String>,
}

/// Routes raw broker deliveries into the local event bus.
pub(crate) struct Dispatcher {
    identity: String,
    registry: Arc<PacketRegistry>,
    bus: Arc<EventBus>,
    table: Arc<Mutex<RoutingTable>>,
}

impl Dispatcher {
    pub(crate) fn new(
        identity: String,
        registry: Arc<PacketRegistry>,
        bus: Arc<EventBus>,
        table: Arc<Mutex<RoutingTable>>,
    ) -> Self {
        Self {
            identity,
            registry,
            bus,
            table,
        }
    }
}

impl BrokerConsumer for Dispatcher {
    fn on_consume_ok(&self, consumer_tag: &str) {
        trace!(consumer_tag, "consumer ready");
        self.bus.publish(&ConsumerReadyEvent {
            consumer_tag: consumer_tag.to_string(),
        });
    }

    fn on_delivery(&self, _consumer_tag: &str, headers: &Metadata, body: &[u8]) {
        let Some(author) = headers.get_str(AUTHOR_KEY) else {
            trace!("delivery without author header discarded");
            return;
        };

        if author == self.identity {
            trace!("own echo discarded");
            return;
        }

        let Some(mut packet) = decode_packet(&self.registry, body) else {
            return;
        };

        // The delivery header is the authoritative sender identity, not
        // whatever the sender embedded in the packet.
        packet.metadata_mut().set(AUTHOR_KEY, author);
        self.bus.publish_dyn(packet.as_any());
    }

    fn on_shutdown(&self, consumer_tag: &str, cause: &str) {
        warn!(consumer_tag, cause, "consumer shut down");
        self.bus.publish(&ShutdownEvent {
            consumer_tag: consumer_tag.to_string(),
            cause: cause.to_string(),
        });

        let mut table = self.table.lock().expect("routing table lock poisoned");
        if let Some(name) = table.consumers.remove(consumer_tag) {
            table.destinations.remove(&name);
            debug!(destination = %name, "local destination entry dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use courier_protocol::Packet;

    use crate::testing::Note;

    fn fixture() -> (Dispatcher, Arc<EventBus>, Arc<Mutex<RoutingTable>>) {
        let registry = Arc::new(PacketRegistry::new());
        registry.register::<Note>();
        let bus = Arc::new(EventBus::new());
        let table = Arc::new(Mutex::new(RoutingTable::default()));
        let dispatcher = Dispatcher::new(
            "svc-a".to_string(),
            registry,
            Arc::clone(&bus),
            Arc::clone(&table),
        );
        (dispatcher, bus, table)
    }

    fn frame(text: &str) -> Vec<u8> {
        let registry = PacketRegistry::new();
        registry.register::<Note>();
        let packet = Note {
            text: text.into(),
            ..Default::default()
        };
        courier_protocol::encode_packet(&registry, &packet).unwrap()
    }

    fn headers_from(author: &str) -> Metadata {
        let mut headers = Metadata::new();
        headers.set(AUTHOR_KEY, author);
        headers
    }

    #[test]
    fn delivery_without_author_is_discarded() {
        let (dispatcher, bus, _table) = fixture();
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let seen = Arc::clone(&seen);
            bus.subscribe::<Note, _>(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }

        dispatcher.on_delivery("ctag-1", &Metadata::new(), &frame("x"));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn own_echo_is_discarded() {
        let (dispatcher, bus, _table) = fixture();
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let seen = Arc::clone(&seen);
            bus.subscribe::<Note, _>(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }

        dispatcher.on_delivery("ctag-1", &headers_from("svc-a"), &frame("x"));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn foreign_delivery_reaches_subscribers_with_header_author() {
        let (dispatcher, bus, _table) = fixture();
        let authors = Arc::new(Mutex::new(Vec::new()));
        {
            let authors = Arc::clone(&authors);
            bus.subscribe::<Note, _>(move |note| {
                authors
                    .lock()
                    .unwrap()
                    .push((note.text.clone(), note.author().map(String::from)));
            });
        }

        // The sender embedded a spoofed author in its metadata; the header
        // value must win.
        let registry = PacketRegistry::new();
        registry.register::<Note>();
        let mut packet = Note {
            text: "hi".into(),
            ..Default::default()
        };
        packet.metadata.set(AUTHOR_KEY, "spoofed");
        let body = courier_protocol::encode_packet(&registry, &packet).unwrap();

        dispatcher.on_delivery("ctag-1", &headers_from("svc-b"), &body);

        let authors = authors.lock().unwrap();
        assert_eq!(
            authors.as_slice(),
            &[("hi".to_string(), Some("svc-b".to_string()))]
        );
    }

    #[test]
    fn undecodable_delivery_is_dropped_but_consumer_survives() {
        let (dispatcher, bus, _table) = fixture();
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let seen = Arc::clone(&seen);
            bus.subscribe::<Note, _>(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }

        // Unknown id, then garbage, then a valid frame.
        let mut unknown = Vec::new();
        courier_protocol::wire::write_str(&mut unknown, "Unknown").unwrap();
        dispatcher.on_delivery("ctag-1", &headers_from("svc-b"), &unknown);
        dispatcher.on_delivery("ctag-1", &headers_from("svc-b"), &[0xde, 0xad]);
        dispatcher.on_delivery("ctag-1", &headers_from("svc-b"), &frame("ok"));

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn consume_ok_becomes_ready_event() {
        let (dispatcher, bus, _table) = fixture();
        let tags = Arc::new(Mutex::new(Vec::new()));
        {
            let tags = Arc::clone(&tags);
            bus.subscribe::<ConsumerReadyEvent, _>(move |event| {
                tags.lock().unwrap().push(event.consumer_tag.clone());
            });
        }

        dispatcher.on_consume_ok("ctag-7");
        assert_eq!(tags.lock().unwrap().as_slice(), &["ctag-7".to_string()]);
    }

    #[test]
    fn shutdown_prunes_table_and_publishes_event() {
        let (dispatcher, bus, table) = fixture();
        {
            let mut table = table.lock().unwrap();
            table
                .destinations
                .insert("room".into(), QueueSpec::direct("room"));
            table.consumers.insert("ctag-1".into(), "room".into());
        }
        let events = Arc::new(Mutex::new(Vec::new()));
        {
            let events = Arc::clone(&events);
            bus.subscribe::<ShutdownEvent, _>(move |event| {
                events.lock().unwrap().push(event.clone());
            });
        }

        dispatcher.on_shutdown("ctag-1", "connection closed");

        let table = table.lock().unwrap();
        assert!(table.destinations.is_empty());
        assert!(table.consumers.is_empty());
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].consumer_tag, "ctag-1");
        assert_eq!(events[0].cause, "connection closed");
    }
}
