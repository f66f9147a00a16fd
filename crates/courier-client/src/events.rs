//! Broker lifecycle notifications, republished on the local event bus.

/// A consumer subscription became live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerReadyEvent {
    /// The broker-assigned consumer tag.
    pub consumer_tag: String,
}

/// A consumer subscription ended.
///
/// The dispatcher also drops the local destination entry recorded for the
/// tag; the broker-side queue is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownEvent {
    /// The broker-assigned consumer tag.
    pub consumer_tag: String,
    /// Why the subscription ended.
    pub cause: String,
}
