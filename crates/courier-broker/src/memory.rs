//! Process-local broker implementation.
//!
//! Backs the test suites and single-process deployments. Topology lives
//! in one mutex-guarded table; deliveries run inline on the publishing
//! task, after the table lock is released, so consumer callbacks may call
//! back into the broker.
//!
//! Fidelity notes: `auto_ack` is accepted and ignored (all deliveries are
//! fire-and-forget), headers exchanges route like fanout (binding
//! arguments are not modeled), and auto-delete queues disappear when
//! their last consumer goes away.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use courier_core::Metadata;

use crate::broker::{
    BoxFuture, Broker, BrokerConsumer, Channel, ConnectOptions, Connection, ExchangeKind,
};
use crate::error::{BrokerError, BrokerResult};

#[derive(Clone)]
struct ConsumerEntry {
    tag: String,
    consumer: Arc<dyn BrokerConsumer>,
}

struct QueueState {
    auto_delete: bool,
    consumers: Vec<ConsumerEntry>,
}

struct Binding {
    queue: String,
    routing_key: String,
}

struct ExchangeState {
    kind: ExchangeKind,
    bindings: Vec<Binding>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    exchanges: HashMap<String, ExchangeState>,
    next_generated: u64,
    next_tag: u64,
}

/// An in-process broker.
///
/// Cloning handles is cheap: connections and channels opened from one
/// broker share its topology.
#[derive(Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when a queue with `name` exists.
    pub fn queue_exists(&self, name: &str) -> bool {
        self.state.lock().expect("broker lock poisoned").queues.contains_key(name)
    }

    /// Returns true when an exchange with `name` exists.
    pub fn has_exchange(&self, name: &str) -> bool {
        self.state
            .lock()
            .expect("broker lock poisoned")
            .exchanges
            .contains_key(name)
    }

    /// Returns the number of consumers subscribed to `name`.
    pub fn consumer_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .expect("broker lock poisoned")
            .queues
            .get(name)
            .map_or(0, |q| q.consumers.len())
    }
}

impl Broker for InMemoryBroker {
    fn connect(&self, options: ConnectOptions) -> BoxFuture<'_, BrokerResult<Box<dyn Connection>>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            debug!(identity = %options.identity, uri = %options.uri, "in-memory connection opened");
            Ok(Box::new(InMemoryConnection {
                state,
                open: Arc::new(AtomicBool::new(true)),
                own_tags: Arc::new(Mutex::new(Vec::new())),
            }) as Box<dyn Connection>)
        })
    }
}

struct InMemoryConnection {
    state: Arc<Mutex<BrokerState>>,
    open: Arc<AtomicBool>,
    /// Consumer tags registered through this connection's channels.
    own_tags: Arc<Mutex<Vec<String>>>,
}

impl Connection for InMemoryConnection {
    fn open_channel(&self) -> BoxFuture<'_, BrokerResult<Box<dyn Channel>>> {
        Box::pin(async move {
            if !self.is_open() {
                return Err(BrokerError::channel_closed("connection is closed"));
            }
            Ok(Box::new(InMemoryChannel {
                state: Arc::clone(&self.state),
                open: Arc::clone(&self.open),
                own_tags: Arc::clone(&self.own_tags),
            }) as Box<dyn Channel>)
        })
    }

    fn close(&self) -> BoxFuture<'_, BrokerResult<()>> {
        Box::pin(async move {
            if !self.open.swap(false, Ordering::SeqCst) {
                return Ok(());
            }

            let tags: Vec<String> = std::mem::take(&mut *self.own_tags.lock().expect("broker lock poisoned"));
            let dropped = {
                let mut state = self.state.lock().expect("broker lock poisoned");
                remove_consumers(&mut state, &tags)
            };
            for entry in dropped {
                entry.consumer.on_shutdown(&entry.tag, "connection closed");
            }
            debug!("in-memory connection closed");
            Ok(())
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Removes the consumers with the given tags, deleting auto-delete queues
/// that lose their last consumer. Returns the removed entries.
fn remove_consumers(state: &mut BrokerState, tags: &[String]) -> Vec<ConsumerEntry> {
    let mut removed = Vec::new();
    let mut emptied = Vec::new();

    for (name, queue) in state.queues.iter_mut() {
        let before = queue.consumers.len();
        queue.consumers.retain(|entry| {
            if tags.contains(&entry.tag) {
                removed.push(entry.clone());
                false
            } else {
                true
            }
        });
        if queue.auto_delete && before > 0 && queue.consumers.is_empty() {
            emptied.push(name.clone());
        }
    }

    for name in emptied {
        state.queues.remove(&name);
        drop_bindings(state, &name);
        trace!(queue = %name, "auto-delete queue removed");
    }

    removed
}

fn drop_bindings(state: &mut BrokerState, queue: &str) {
    for exchange in state.exchanges.values_mut() {
        exchange.bindings.retain(|binding| binding.queue != queue);
    }
}

struct InMemoryChannel {
    state: Arc<Mutex<BrokerState>>,
    open: Arc<AtomicBool>,
    own_tags: Arc<Mutex<Vec<String>>>,
}

impl InMemoryChannel {
    fn ensure_open(&self) -> BrokerResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::channel_closed("connection is closed"))
        }
    }
}

impl Channel for InMemoryChannel {
    fn declare_queue(
        &self,
        name: String,
        _durable: bool,
        auto_delete: bool,
    ) -> BoxFuture<'_, BrokerResult<String>> {
        Box::pin(async move {
            self.ensure_open()?;
            let mut state = self.state.lock().expect("broker lock poisoned");

            let name = if name.is_empty() {
                state.next_generated += 1;
                format!("amq.gen-{}", state.next_generated)
            } else {
                name
            };

            state.queues.entry(name.clone()).or_insert_with(|| {
                trace!(queue = %name, "queue declared");
                QueueState {
                    auto_delete,
                    consumers: Vec::new(),
                }
            });
            Ok(name)
        })
    }

    fn declare_exchange(
        &self,
        name: String,
        kind: ExchangeKind,
        _durable: bool,
        _auto_delete: bool,
    ) -> BoxFuture<'_, BrokerResult<()>> {
        Box::pin(async move {
            self.ensure_open()?;
            let mut state = self.state.lock().expect("broker lock poisoned");
            state.exchanges.entry(name.clone()).or_insert_with(|| {
                trace!(exchange = %name, kind = %kind, "exchange declared");
                ExchangeState {
                    kind,
                    bindings: Vec::new(),
                }
            });
            Ok(())
        })
    }

    fn bind_queue(
        &self,
        queue: String,
        exchange: String,
        routing_key: String,
    ) -> BoxFuture<'_, BrokerResult<()>> {
        Box::pin(async move {
            self.ensure_open()?;
            let mut state = self.state.lock().expect("broker lock poisoned");

            if !state.queues.contains_key(&queue) {
                return Err(BrokerError::not_found(format!("queue {queue}")));
            }
            let Some(entry) = state.exchanges.get_mut(&exchange) else {
                return Err(BrokerError::not_found(format!("exchange {exchange}")));
            };

            let already = entry
                .bindings
                .iter()
                .any(|b| b.queue == queue && b.routing_key == routing_key);
            if !already {
                entry.bindings.push(Binding { queue, routing_key });
            }
            Ok(())
        })
    }

    fn publish(
        &self,
        exchange: String,
        routing_key: String,
        headers: Metadata,
        body: Vec<u8>,
    ) -> BoxFuture<'_, BrokerResult<()>> {
        Box::pin(async move {
            self.ensure_open()?;
            let targets = {
                let state = self.state.lock().expect("broker lock poisoned");
                route(&state, &exchange, &routing_key)?
            };

            // Deliver outside the lock so consumers can use the broker.
            for entry in targets {
                entry.consumer.on_delivery(&entry.tag, &headers, &body);
            }
            Ok(())
        })
    }

    fn consume(
        &self,
        queue: String,
        _auto_ack: bool,
        consumer: Arc<dyn BrokerConsumer>,
    ) -> BoxFuture<'_, BrokerResult<String>> {
        Box::pin(async move {
            self.ensure_open()?;
            let tag = {
                let mut state = self.state.lock().expect("broker lock poisoned");
                state.next_tag += 1;
                let tag = format!("ctag-{}", state.next_tag);

                let Some(entry) = state.queues.get_mut(&queue) else {
                    return Err(BrokerError::not_found(format!("queue {queue}")));
                };
                entry.consumers.push(ConsumerEntry {
                    tag: tag.clone(),
                    consumer: Arc::clone(&consumer),
                });
                tag
            };

            self.own_tags.lock().expect("broker lock poisoned").push(tag.clone());
            consumer.on_consume_ok(&tag);
            Ok(tag)
        })
    }

    fn delete_queue(&self, name: String) -> BoxFuture<'_, BrokerResult<()>> {
        Box::pin(async move {
            self.ensure_open()?;
            let dropped = {
                let mut state = self.state.lock().expect("broker lock poisoned");
                let Some(queue) = state.queues.remove(&name) else {
                    return Err(BrokerError::not_found(format!("queue {name}")));
                };
                drop_bindings(&mut state, &name);
                queue.consumers
            };

            for entry in dropped {
                entry.consumer.on_shutdown(&entry.tag, "queue deleted");
            }
            trace!(queue = %name, "queue deleted");
            Ok(())
        })
    }
}

/// Resolves the consumers a message addressed to `exchange`/`routing_key`
/// reaches. Unroutable messages resolve to no consumers.
fn route(
    state: &BrokerState,
    exchange: &str,
    routing_key: &str,
) -> BrokerResult<Vec<ConsumerEntry>> {
    if exchange.is_empty() {
        return Ok(match state.queues.get(routing_key) {
            Some(queue) => queue.consumers.clone(),
            None => {
                trace!(queue = %routing_key, "unroutable message dropped");
                Vec::new()
            }
        });
    }

    let Some(entry) = state.exchanges.get(exchange) else {
        return Err(BrokerError::not_found(format!("exchange {exchange}")));
    };

    let mut seen: Vec<&str> = Vec::new();
    let mut targets = Vec::new();
    for binding in &entry.bindings {
        let matched = match entry.kind {
            ExchangeKind::Fanout | ExchangeKind::Headers => true,
            ExchangeKind::Direct => binding.routing_key == routing_key,
            ExchangeKind::Topic => topic_matches(&binding.routing_key, routing_key),
        };
        if matched && !seen.contains(&binding.queue.as_str()) {
            seen.push(&binding.queue);
            if let Some(queue) = state.queues.get(&binding.queue) {
                targets.extend(queue.consumers.iter().cloned());
            }
        }
    }
    Ok(targets)
}

/// AMQP topic matching: `*` matches exactly one dot-separated segment,
/// `#` matches zero or more.
fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    fn rec(pattern: &[&str], key: &[&str]) -> bool {
        match pattern.split_first() {
            None => key.is_empty(),
            Some((&"#", rest)) => {
                rec(rest, key) || (!key.is_empty() && rec(pattern, &key[1..]))
            }
            Some((&"*", rest)) => !key.is_empty() && rec(rest, &key[1..]),
            Some((segment, rest)) => {
                key.first() == Some(segment) && rec(rest, &key[1..])
            }
        }
    }

    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    rec(&pattern, &key)
}
