//! Typed messaging client over a pub/sub broker.
//!
//! Processes exchange strongly-typed packets instead of raw bytes. The
//! client frames packets through the
//! [`PacketRegistry`](courier_protocol::PacketRegistry), publishes them to
//! broker destinations, and fans received packets out on a local
//! [`EventBus`](courier_core::EventBus), filtering out the process's own
//! echoes so a publisher never re-receives its own traffic unless it opts
//! in with `send_to_self`.
//!
//! ```text
//! publish:  caller ──▶ MessagingClient ──▶ encode ──▶ broker
//! consume:  broker ──▶ Dispatcher ──▶ decode ──▶ EventBus ──▶ subscriber
//! ```

mod client;
mod destination;
mod dispatcher;
mod error;
mod events;

pub use client::MessagingClient;
pub use destination::{ExchangeBinding, QueueSpec};
pub use error::{ClientError, ClientResult};
pub use events::{ConsumerReadyEvent, ShutdownEvent};

pub use courier_broker::{ConnectOptions, ExchangeKind};

#[cfg(test)]
pub(crate) mod testing {
    //! Packet types shared by the unit tests in this crate.

    use std::any::Any;
    use std::io::{Read, Write};

    use courier_core::Metadata;
    use courier_protocol::{Packet, wire};

    #[derive(Debug, Default)]
    pub struct Note {
        pub metadata: Metadata,
        pub text: String,
    }

    impl Note {
        pub fn with_text(text: impl Into<String>) -> Self {
            Self {
                text: text.into(),
                ..Default::default()
            }
        }
    }

    impl Packet for Note {
        fn write(&self, out: &mut dyn Write) -> std::io::Result<()> {
            wire::write_str(out, &self.text)
        }

        fn read(&mut self, input: &mut dyn Read) -> std::io::Result<()> {
            self.text = wire::read_str(input)?;
            Ok(())
        }

        fn metadata(&self) -> &Metadata {
            &self.metadata
        }

        fn metadata_mut(&mut self) -> &mut Metadata {
            &mut self.metadata
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }
}
