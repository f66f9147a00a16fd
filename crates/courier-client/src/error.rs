//! Client error types.

use thiserror::Error;

use courier_broker::BrokerError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the messaging client.
///
/// Only construction can fail; every later broker interaction is
/// best-effort and reported through logs instead.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Opening the broker connection failed.
    #[error("failed to connect to broker: {0}")]
    Connect(#[source] BrokerError),

    /// Opening the shared channel failed.
    #[error("failed to open channel: {0}")]
    OpenChannel(#[source] BrokerError),
}
