//! The messaging client.

use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info};

use courier_broker::{
    Broker, BrokerConsumer, BrokerResult, Channel, ConnectOptions, Connection,
};
use courier_core::{AUTHOR_KEY, EventBus, Metadata};
use courier_protocol::{Packet, PacketRegistry, encode_packet};

use crate::destination::QueueSpec;
use crate::dispatcher::{Dispatcher, RoutingTable};
use crate::error::{ClientError, ClientResult};

/// Typed messaging over a broker.
///
/// Owns one broker connection and one shared channel, the local
/// destination table, the packet registry and the local event bus. All
/// broker interaction after construction is best-effort: failures are
/// logged, never returned.
///
/// Packet types register before traffic starts:
///
/// ```ignore
/// let client = MessagingClient::connect(&broker, options).await?;
/// client.registry().register::<ChatMessage>();
/// client.bind_destination(QueueSpec::direct("chat")).await;
/// client.bus().subscribe::<ChatMessage, _>(|msg| println!("{}", msg.text));
/// ```
pub struct MessagingClient {
    identity: String,
    connection: Box<dyn Connection>,
    /// Broker channels are not safe for unsynchronized concurrent use;
    /// every publish and declare goes through this mutex.
    channel: AsyncMutex<Box<dyn Channel>>,
    registry: Arc<PacketRegistry>,
    bus: Arc<EventBus>,
    table: Arc<Mutex<RoutingTable>>,
    dispatcher: Arc<Dispatcher>,
}

impl MessagingClient {
    /// Opens a connection and the shared channel.
    ///
    /// # Errors
    ///
    /// Construction is the only fatal path: a connect or channel failure
    /// is returned and the client must not be used.
    pub async fn connect(broker: &dyn Broker, options: ConnectOptions) -> ClientResult<Self> {
        let identity = options.identity.clone();
        let connection = broker.connect(options).await.map_err(ClientError::Connect)?;
        let channel = connection
            .open_channel()
            .await
            .map_err(ClientError::OpenChannel)?;

        let registry = Arc::new(PacketRegistry::new());
        let bus = Arc::new(EventBus::new());
        let table = Arc::new(Mutex::new(RoutingTable::default()));
        let dispatcher = Arc::new(Dispatcher::new(
            identity.clone(),
            Arc::clone(&registry),
            Arc::clone(&bus),
            Arc::clone(&table),
        ));

        info!(identity = %identity, "messaging client connected");
        Ok(Self {
            identity,
            connection,
            channel: AsyncMutex::new(channel),
            registry,
            bus,
            table,
            dispatcher,
        })
    }

    /// Connects with the identity taken from `spec`'s name and binds
    /// `spec` immediately.
    pub async fn connect_bound(
        broker: &dyn Broker,
        uri: impl Into<String>,
        spec: QueueSpec,
    ) -> ClientResult<Self> {
        let options = ConnectOptions::new(uri, spec.name());
        let client = Self::connect(broker, options).await?;
        client.bind_destination(spec).await;
        Ok(client)
    }

    /// Registers `spec` locally and starts consuming from it.
    ///
    /// Binding the same name again overwrites the previous entry (its
    /// flags are lost). Broker-level failures are logged and swallowed.
    pub async fn bind_destination(&self, spec: QueueSpec) {
        {
            let mut table = self.table.lock().expect("routing table lock poisoned");
            table
                .destinations
                .insert(spec.name().to_string(), spec.clone());
        }

        if let Err(err) = self.try_bind(&spec).await {
            error!(destination = spec.name(), error = %err, "failed to bind destination");
        }
    }

    async fn try_bind(&self, spec: &QueueSpec) -> BrokerResult<()> {
        let consumer: Arc<dyn BrokerConsumer> = self.dispatcher.clone();

        let tag = {
            let channel = self.channel.lock().await;
            if let Some(binding) = spec.binding() {
                // Exchange variant: a server-named queue bound with the
                // destination name as routing key.
                let queue = channel.declare_queue(String::new(), false, true).await?;
                channel
                    .declare_exchange(
                        binding.exchange.clone(),
                        binding.kind,
                        spec.is_durable(),
                        spec.is_auto_delete(),
                    )
                    .await?;
                channel
                    .bind_queue(
                        queue.clone(),
                        binding.exchange.clone(),
                        spec.name().to_string(),
                    )
                    .await?;
                channel.consume(queue, true, consumer).await?
            } else {
                channel
                    .declare_queue(
                        spec.name().to_string(),
                        spec.is_durable(),
                        spec.is_auto_delete(),
                    )
                    .await?;
                channel
                    .consume(spec.name().to_string(), true, consumer)
                    .await?
            }
        };

        self.table
            .lock()
            .expect("routing table lock poisoned")
            .consumers
            .insert(tag, spec.name().to_string());
        debug!(destination = spec.name(), "destination bound");
        Ok(())
    }

    /// Publishes through the destination registered under `name`,
    /// lazily creating a default direct destination when none exists.
    pub async fn publish_to(&self, name: &str, packet: &dyn Packet) {
        let spec = {
            let mut table = self.table.lock().expect("routing table lock poisoned");
            table
                .destinations
                .entry(name.to_string())
                .or_insert_with(|| QueueSpec::direct(name))
                .clone()
        };
        self.publish(&spec, packet, false).await;
    }

    /// Publishes `packet` to `spec`.
    ///
    /// An unregistered packet type makes this a silent no-op. Headers are
    /// the client identity under `author`, then every entry of the
    /// packet's own metadata. With `send_to_self` the packet is also
    /// handed to the local event bus, independent of the broker
    /// round-trip; together with loop prevention this yields exactly one
    /// local delivery.
    pub async fn publish(&self, spec: &QueueSpec, packet: &dyn Packet, send_to_self: bool) {
        let Some(frame) = encode_packet(&self.registry, packet) else {
            return;
        };

        let mut headers = Metadata::new();
        headers.set(AUTHOR_KEY, self.identity.as_str());
        headers.merge(packet.metadata());

        let exchange = spec
            .binding()
            .map_or_else(String::new, |binding| binding.exchange.clone());

        {
            let channel = self.channel.lock().await;
            if let Err(err) = channel
                .publish(exchange, spec.name().to_string(), headers, frame)
                .await
            {
                error!(destination = spec.name(), error = %err, "failed to publish packet");
            }
        }

        if send_to_self {
            self.bus.publish_dyn(packet.as_any());
        }
    }

    /// Deletes the broker-side queue, then drops the local entry.
    ///
    /// On broker failure the local entry is kept, so bookkeeping only
    /// diverges from the broker when the broker actually changed.
    pub async fn delete_destination(&self, name: &str) {
        let result = {
            let channel = self.channel.lock().await;
            channel.delete_queue(name.to_string()).await
        };

        match result {
            Ok(()) => {
                let mut table = self.table.lock().expect("routing table lock poisoned");
                table.destinations.remove(name);
                table.consumers.retain(|_, destination| destination != name);
                debug!(destination = name, "destination deleted");
            }
            Err(err) => {
                error!(destination = name, error = %err, "failed to delete queue");
            }
        }
    }

    /// Drops the local entry for `name`; the broker-side queue, if any,
    /// continues to exist.
    pub fn remove_destination(&self, name: &str) {
        let mut table = self.table.lock().expect("routing table lock poisoned");
        table.destinations.remove(name);
        table.consumers.retain(|_, destination| destination != name);
        debug!(destination = name, "local destination entry removed");
    }

    /// Drops the local entry for `spec`'s name.
    pub fn remove_destination_spec(&self, spec: &QueueSpec) {
        self.remove_destination(spec.name());
    }

    /// Closes the connection. A second call is a no-op; close failures
    /// are logged, not returned.
    pub async fn close(&self) {
        if !self.connection.is_open() {
            debug!("connection already closed");
            return;
        }
        match self.connection.close().await {
            Ok(()) => info!("messaging client closed"),
            Err(err) => error!(error = %err, "error while closing connection"),
        }
    }

    /// The identity stamped into every outbound `author` header.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The local event bus receiving decoded packets and lifecycle events.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The packet registry; register every packet type here at startup.
    pub fn registry(&self) -> &Arc<PacketRegistry> {
        &self.registry
    }

    /// Returns true while the broker connection is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    /// Returns the registered destination for `name`, if any.
    pub fn destination(&self, name: &str) -> Option<QueueSpec> {
        self.table
            .lock()
            .expect("routing table lock poisoned")
            .destinations
            .get(name)
            .cloned()
    }

    /// Returns the names in the local destination table, sorted.
    pub fn destination_names(&self) -> Vec<String> {
        let table = self.table.lock().expect("routing table lock poisoned");
        let mut names: Vec<_> = table.destinations.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for MessagingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingClient")
            .field("identity", &self.identity)
            .field("connected", &self.is_connected())
            .finish()
    }
}
