//! Instance registry
//!
//! Id-keyed store of realized I/O instances. Creation is two-phase: an id
//! is reserved before the provider runs and filled in afterwards, so two
//! threads racing on the same id see exactly one success and the loser
//! gets [`Error::AlreadyExists`] without its provider ever running.
//! Closing the registry empties it and refuses every later reservation or
//! fill.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::io::IoInstance;

#[derive(Debug)]
enum Slot {
    /// Reserved; the provider is still building the instance
    Pending,
    Ready(IoInstance),
}

#[derive(Debug, Default)]
struct Slots {
    map: HashMap<String, Slot>,
    closed: bool,
}

/// Id → instance map with atomic insert-if-absent
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    slots: RwLock<Slots>,
}

/// A reserved id; dropping it without [`Reservation::fill`] frees the id
#[derive(Debug)]
#[must_use = "a reservation frees its id when dropped"]
pub struct Reservation<'a> {
    registry: &'a InstanceRegistry,
    id: String,
    filled: bool,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `id`, failing if it is reserved or present
    pub fn reserve(&self, id: &str) -> Result<Reservation<'_>> {
        let mut slots = self.slots.write();
        if slots.closed {
            return Err(Error::Shutdown);
        }
        if slots.map.contains_key(id) {
            return Err(Error::AlreadyExists(id.to_string()));
        }
        slots.map.insert(id.to_string(), Slot::Pending);
        Ok(Reservation {
            registry: self,
            id: id.to_string(),
            filled: false,
        })
    }

    /// Instance registered under `id`
    pub fn get(&self, id: &str) -> Result<IoInstance> {
        match self.slots.read().map.get(id) {
            Some(Slot::Ready(instance)) => Ok(instance.clone()),
            _ => Err(Error::IoNotFound(id.to_string())),
        }
    }

    /// Check if a finished instance exists under `id`
    pub fn contains(&self, id: &str) -> bool {
        matches!(self.slots.read().map.get(id), Some(Slot::Ready(_)))
    }

    /// Ids of finished instances, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .slots
            .read()
            .map
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.slots
            .read()
            .map
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.slots.read().closed
    }

    /// Refuse further reservations and return every finished instance,
    /// sorted by id
    pub fn close(&self) -> Vec<IoInstance> {
        let mut slots = self.slots.write();
        slots.closed = true;
        let mut drained: Vec<(String, IoInstance)> = slots
            .map
            .drain()
            .filter_map(|(id, slot)| match slot {
                Slot::Ready(instance) => Some((id, instance)),
                Slot::Pending => None,
            })
            .collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        drained.into_iter().map(|(_, instance)| instance).collect()
    }
}

impl Reservation<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Store `instance` under the reserved id
    ///
    /// Fails with [`Error::Shutdown`] if the registry was closed while the
    /// instance was being built.
    pub fn fill(mut self, instance: IoInstance) -> Result<IoInstance> {
        let mut slots = self.registry.slots.write();
        if slots.closed {
            return Err(Error::Shutdown);
        }
        slots
            .map
            .insert(self.id.clone(), Slot::Ready(instance.clone()));
        self.filled = true;
        Ok(instance)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.filled {
            let mut slots = self.registry.slots.write();
            if matches!(slots.map.get(&self.id), Some(Slot::Pending)) {
                slots.map.remove(&self.id);
            }
        }
    }
}
