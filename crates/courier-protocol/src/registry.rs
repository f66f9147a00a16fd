//! Bidirectional id ↔ packet-type table with cached factories.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, error};

use crate::packet::Packet;

type Factory = Box<dyn Fn() -> Box<dyn Packet> + Send + Sync>;

struct Registration {
    type_id: TypeId,
    type_name: &'static str,
    factory: Factory,
}

#[derive(Default)]
struct Tables {
    by_id: HashMap<String, Registration>,
    by_type: HashMap<TypeId, String>,
}

/// Maps stable wire ids to constructible packet types.
///
/// Registration is explicit and expected to run during single-threaded
/// startup, before publish/consume traffic begins. Steady-state lookups
/// take a read lock only, so any number of threads may encode and decode
/// concurrently.
///
/// A registration is all-or-nothing: the `Default` bound supplies the
/// factory up front, so an id can never appear in the table without one.
/// The first successful registrant for an id wins; later attempts are
/// rejected and logged.
#[derive(Default)]
pub struct PacketRegistry {
    tables: RwLock<Tables>,
}

impl PacketRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `P` under its short type name.
    ///
    /// Returns false (and logs) when the id is already taken.
    pub fn register<P: Packet + Default>(&self) -> bool {
        self.register_as::<P>("")
    }

    /// Registers `P` under an explicit wire id.
    ///
    /// An empty `label` falls back to the short type name. Returns false
    /// (and logs) when the resolved id is already taken by another type.
    pub fn register_as<P: Packet + Default>(&self, label: &str) -> bool {
        let type_name = short_type_name::<P>();
        let id = if label.is_empty() { type_name } else { label };

        let mut tables = self.tables.write().expect("registry lock poisoned");
        if let Some(existing) = tables.by_id.get(id) {
            error!(
                id,
                packet = type_name,
                taken_by = existing.type_name,
                "wire id already used by another packet"
            );
            return false;
        }

        let type_id = TypeId::of::<P>();
        tables.by_id.insert(
            id.to_string(),
            Registration {
                type_id,
                type_name,
                factory: Box::new(|| Box::new(P::default())),
            },
        );
        tables.by_type.insert(type_id, id.to_string());
        debug!(id, packet = type_name, "registered packet");
        true
    }

    /// Instantiates a fresh packet for `id` via the cached factory.
    pub fn create(&self, id: &str) -> Option<Box<dyn Packet>> {
        let tables = self.tables.read().expect("registry lock poisoned");
        match tables.by_id.get(id) {
            Some(registration) => Some((registration.factory)()),
            None => {
                debug!(id, "no packet registered for id");
                None
            }
        }
    }

    /// Returns the wire id registered for `P`.
    pub fn id_of<P: Packet>(&self) -> Option<String> {
        let tables = self.tables.read().expect("registry lock poisoned");
        tables.by_type.get(&TypeId::of::<P>()).cloned()
    }

    /// Returns the wire id registered for `packet`'s runtime type.
    pub fn id_of_packet(&self, packet: &dyn Packet) -> Option<String> {
        let tables = self.tables.read().expect("registry lock poisoned");
        tables.by_type.get(&packet.as_any().type_id()).cloned()
    }

    /// Returns true when `id` has a registered type.
    pub fn contains_id(&self, id: &str) -> bool {
        let tables = self.tables.read().expect("registry lock poisoned");
        tables.by_id.contains_key(id)
    }

    /// Returns an owned copy of the id → type table.
    ///
    /// The snapshot does not change with later registrations.
    pub fn snapshot(&self) -> HashMap<String, TypeId> {
        let tables = self.tables.read().expect("registry lock poisoned");
        tables
            .by_id
            .iter()
            .map(|(id, registration)| (id.clone(), registration.type_id))
            .collect()
    }

    /// Returns the registered wire ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let tables = self.tables.read().expect("registry lock poisoned");
        let mut ids: Vec<_> = tables.by_id.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.tables.read().expect("registry lock poisoned").by_id.len()
    }

    /// Returns true when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PacketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketRegistry")
            .field("packets", &self.len())
            .finish()
    }
}

/// The last path segment of `P`'s type name.
fn short_type_name<P>() -> &'static str {
    let full = std::any::type_name::<P>();
    full.rsplit("::").next().unwrap_or(full)
}
