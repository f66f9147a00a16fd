//! Error types for broker operations.

use std::fmt;
use thiserror::Error;

/// The category of a broker error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerErrorCode {
    /// Opening the connection failed.
    ConnectionFailed,
    /// The connection or channel is no longer usable.
    ChannelClosed,
    /// The named queue or exchange does not exist.
    NotFound,
    /// Publishing a message failed.
    PublishFailed,
    /// Starting a consumer failed.
    ConsumeFailed,
    /// Underlying transport error.
    Io,
    /// Unexpected broker-side state.
    Internal,
}

impl BrokerErrorCode {
    /// Returns true if the operation may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed | Self::Io)
    }

    /// Returns a stable lowercase name for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionFailed => "connection_failed",
            Self::ChannelClosed => "channel_closed",
            Self::NotFound => "not_found",
            Self::PublishFailed => "publish_failed",
            Self::ConsumeFailed => "consume_failed",
            Self::Io => "io",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for BrokerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error from a broker operation.
#[derive(Debug, Error)]
pub struct BrokerError {
    code: BrokerErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BrokerError {
    /// Creates a new error with the given code and message.
    pub fn new(code: BrokerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a connection failure.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(BrokerErrorCode::ConnectionFailed, message)
    }

    /// Creates a closed-channel error.
    pub fn channel_closed(message: impl Into<String>) -> Self {
        Self::new(BrokerErrorCode::ChannelClosed, message)
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BrokerErrorCode::NotFound, message)
    }

    /// Creates a publish failure.
    pub fn publish_failed(message: impl Into<String>) -> Self {
        Self::new(BrokerErrorCode::PublishFailed, message)
    }

    /// Creates a consume failure.
    pub fn consume_failed(message: impl Into<String>) -> Self {
        Self::new(BrokerErrorCode::ConsumeFailed, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(BrokerErrorCode::Internal, message)
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> BrokerErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if the operation may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<std::io::Error> for BrokerError {
    fn from(err: std::io::Error) -> Self {
        Self::new(BrokerErrorCode::Io, err.to_string()).with_source(err)
    }
}

/// A specialized Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;
