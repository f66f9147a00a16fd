//! Broker abstraction for the courier messaging stack.
//!
//! The messaging client talks to a message broker only through the traits
//! in this crate: [`Broker`] opens a [`Connection`], a connection opens
//! [`Channel`]s, and a channel declares topology, publishes frames and
//! registers [`BrokerConsumer`]s. Reconnection, heartbeats and topology
//! recovery are the implementation's business; the [`ConnectOptions`]
//! knobs express what the client asks for.
//!
//! [`InMemoryBroker`] is a process-local implementation backing the test
//! suites and single-process deployments.

mod broker;
mod error;
mod memory;

pub use broker::{
    BoxFuture, Broker, BrokerConsumer, Channel, ConnectOptions, Connection, ExchangeKind,
};
pub use error::{BrokerError, BrokerErrorCode, BrokerResult};
pub use memory::InMemoryBroker;
