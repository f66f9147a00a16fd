//! Packet trait, wire framing and the packet type registry.
//!
//! A packet is a user-defined typed unit of data with a stable string wire
//! id and self-owned binary encoding. On the wire a packet becomes a frame:
//!
//! ```text
//! +----------------+------------+----------------------+
//! | id length (u16 | id (UTF-8) | per-type payload     |
//! |   big-endian)  |            | (owned by the type)  |
//! +----------------+------------+----------------------+
//! ```
//!
//! The [`PacketRegistry`] maps wire ids to constructible packet types;
//! [`encode_packet`] and [`decode_packet`] translate between packet
//! instances and frames through it. Everything past the id is opaque to
//! this crate: each type's [`Packet::write`] and [`Packet::read`] must be
//! exact inverses.

mod error;
mod framing;
mod packet;
mod registry;
pub mod wire;

pub use error::{WireError, WireResult};
pub use framing::{MAX_ID_LEN, decode_packet, encode_packet};
pub use packet::Packet;
pub use registry::PacketRegistry;

pub use courier_core::AUTHOR_KEY;
