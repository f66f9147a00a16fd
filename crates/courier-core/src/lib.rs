//! Core types shared across the courier crates.
//!
//! This crate holds the leaf building blocks the messaging stack is
//! assembled from:
//!
//! - [`Metadata`] / [`MetaValue`]: the ordered key/value bag carried by
//!   packets and stamped into broker headers.
//! - [`EventBus`]: synchronous in-process publish/subscribe, used to fan
//!   decoded packets and broker lifecycle events out to local subscribers.
//! - [`init_tracing`]: logging setup for applications embedding the stack.

pub mod bus;
pub mod metadata;
pub mod tracing;

pub use bus::{EventBus, Subscription};
pub use metadata::{AUTHOR_KEY, MetaValue, Metadata};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
