//! The packet contract.

use std::any::Any;
use std::io::{Read, Write};

use courier_core::{AUTHOR_KEY, Metadata};

/// A typed unit of data exchanged over the broker.
///
/// Each packet type owns its binary layout: [`Packet::write`] and
/// [`Packet::read`] must be exact inverses for a given type and schema
/// version. The frame codec prepends the wire id and treats the rest as
/// opaque bytes.
///
/// Decoding constructs instances through [`Default`], then fills them via
/// `read`; packet types register with the
/// [`PacketRegistry`](crate::PacketRegistry) before any traffic flows.
///
/// # Example
///
/// ```
/// use std::any::Any;
/// use std::io::{Read, Write};
/// use courier_core::Metadata;
/// use courier_protocol::{Packet, wire};
///
/// #[derive(Debug, Default)]
/// struct Greeting {
///     metadata: Metadata,
///     text: String,
/// }
///
/// impl Packet for Greeting {
///     fn write(&self, out: &mut dyn Write) -> std::io::Result<()> {
///         wire::write_str(out, &self.text)
///     }
///
///     fn read(&mut self, input: &mut dyn Read) -> std::io::Result<()> {
///         self.text = wire::read_str(input)?;
///         Ok(())
///     }
///
///     fn metadata(&self) -> &Metadata {
///         &self.metadata
///     }
///
///     fn metadata_mut(&mut self) -> &mut Metadata {
///         &mut self.metadata
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
pub trait Packet: Any + Send + Sync {
    /// Serializes this packet's own fields.
    fn write(&self, out: &mut dyn Write) -> std::io::Result<()>;

    /// Deserializes this packet's own fields from `input`.
    fn read(&mut self, input: &mut dyn Read) -> std::io::Result<()>;

    /// The metadata bag carried alongside the payload.
    fn metadata(&self) -> &Metadata;

    /// Mutable access to the metadata bag.
    fn metadata_mut(&mut self) -> &mut Metadata;

    /// Runtime type identity, for registry lookup and event-bus dispatch.
    fn as_any(&self) -> &dyn Any;

    /// The logical identity of the producing process.
    ///
    /// Reads `metadata()["author"]`; on received packets the dispatcher
    /// has overwritten this with the delivery's author header.
    fn author(&self) -> Option<&str> {
        self.metadata().get_str(AUTHOR_KEY)
    }
}
