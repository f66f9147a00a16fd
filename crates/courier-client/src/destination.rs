//! Destination descriptions.

use serde::{Deserialize, Serialize};

use courier_broker::ExchangeKind;

/// Binds a destination to an exchange instead of a plain named queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeBinding {
    /// The exchange to bind to.
    pub exchange: String,
    /// Routing semantics of the exchange.
    pub kind: ExchangeKind,
}

/// A named routing target: a plain queue, or a queue bound to an exchange.
///
/// Purely descriptive: declaring and binding broker-side objects is the
/// messaging client's job. For the plain variant the broker queue carries
/// the spec's name; for the exchange variant the client declares a
/// server-named queue and binds it to the exchange with the spec's name as
/// routing key.
///
/// # Example
///
/// ```
/// use courier_client::{ExchangeKind, QueueSpec};
///
/// let orders = QueueSpec::direct("orders").with_durable(true);
/// assert!(orders.binding().is_none());
///
/// let chat = QueueSpec::bound("room.lobby", "chat", ExchangeKind::Fanout);
/// assert_eq!(chat.binding().unwrap().exchange, "chat");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSpec {
    name: String,
    #[serde(default)]
    durable: bool,
    #[serde(default = "default_auto_delete")]
    auto_delete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    binding: Option<ExchangeBinding>,
}

fn default_auto_delete() -> bool {
    true
}

impl QueueSpec {
    /// Creates a plain queue destination: non-durable, auto-delete.
    pub fn direct(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: false,
            auto_delete: true,
            binding: None,
        }
    }

    /// Creates an exchange-bound destination.
    ///
    /// `routing_key` is the destination's name and doubles as the binding
    /// key on `exchange`.
    pub fn bound(
        routing_key: impl Into<String>,
        exchange: impl Into<String>,
        kind: ExchangeKind,
    ) -> Self {
        Self {
            name: routing_key.into(),
            durable: false,
            auto_delete: true,
            binding: Some(ExchangeBinding {
                exchange: exchange.into(),
                kind,
            }),
        }
    }

    /// Sets the durable flag.
    #[must_use]
    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Sets the auto-delete flag.
    #[must_use]
    pub fn with_auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }

    /// The destination name, unique within a client's table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the broker-side object should survive a broker restart.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Whether the broker-side object goes away when unused.
    pub fn is_auto_delete(&self) -> bool {
        self.auto_delete
    }

    /// The exchange binding, when this is the exchange variant.
    pub fn binding(&self) -> Option<&ExchangeBinding> {
        self.binding.as_ref()
    }
}
