//! Frame codec: packet instance ↔ wire bytes.
//!
//! A frame is the u16 big-endian length-prefixed UTF-8 wire id followed
//! by the packet's own payload bytes. Both directions are total: encoding
//! an unregistered type yields `None` ("nothing to send"), and a frame
//! that cannot be decoded is dropped with a log, never an error to the
//! caller.

use std::io::Cursor;

use tracing::{debug, error, warn};

use crate::error::{WireError, WireResult};
use crate::packet::Packet;
use crate::registry::PacketRegistry;
use crate::wire;

/// Maximum wire id length in bytes, bounded by the u16 length prefix.
pub const MAX_ID_LEN: usize = u16::MAX as usize;

/// Encodes `packet` into a frame.
///
/// Returns `None` when the packet's type is not registered (the caller
/// must treat this as "nothing to send", not as an error) or when the
/// packet's own write routine fails (logged).
pub fn encode_packet(registry: &PacketRegistry, packet: &dyn Packet) -> Option<Vec<u8>> {
    let Some(id) = registry.id_of_packet(packet) else {
        debug!("packet type not registered, nothing to send");
        return None;
    };

    match try_encode(&id, packet) {
        Ok(frame) => Some(frame),
        Err(err) => {
            error!(id = %id, error = %err, "failed to encode packet");
            None
        }
    }
}

/// Decodes a frame back into a packet instance.
///
/// Unknown ids and failing payload reads drop the frame with a log and
/// yield `None`; the partially populated instance is discarded.
pub fn decode_packet(registry: &PacketRegistry, bytes: &[u8]) -> Option<Box<dyn Packet>> {
    match try_decode(registry, bytes) {
        Ok(packet) => Some(packet),
        Err(WireError::UnknownId(id)) => {
            warn!(id = %id, "dropping frame with unknown packet id");
            None
        }
        Err(err) => {
            error!(error = %err, "dropping undecodable frame");
            None
        }
    }
}

fn try_encode(id: &str, packet: &dyn Packet) -> WireResult<Vec<u8>> {
    if id.len() > MAX_ID_LEN {
        return Err(WireError::IdTooLong {
            len: id.len(),
            max: MAX_ID_LEN,
        });
    }

    let mut frame = Vec::with_capacity(2 + id.len() + 64);
    wire::write_str(&mut frame, id)?;
    packet.write(&mut frame)?;
    Ok(frame)
}

fn try_decode(registry: &PacketRegistry, bytes: &[u8]) -> WireResult<Box<dyn Packet>> {
    if bytes.len() < 2 {
        return Err(WireError::Truncated {
            expected: 2,
            received: bytes.len(),
        });
    }

    let id_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    if bytes.len() < 2 + id_len {
        return Err(WireError::Truncated {
            expected: 2 + id_len,
            received: bytes.len(),
        });
    }

    let id = std::str::from_utf8(&bytes[2..2 + id_len])?;
    let mut packet = registry
        .create(id)
        .ok_or_else(|| WireError::UnknownId(id.to_string()))?;

    let mut payload = Cursor::new(&bytes[2 + id_len..]);
    packet.read(&mut payload)?;
    Ok(packet)
}
