//! Identity tables for shared and cyclic references.
//!
//! The first time an object is written it gets the next id and its content is
//! written in full; later occurrences write only the id. The reader registers
//! each instance under its id before reading its content, so a reference back
//! to an object still being read resolves to the same instance.

use std::collections::HashMap;

/// Write-side table, keyed by object address.
///
/// Addresses are only stable while the graph being written is alive, so a
/// table must not outlive one traversal.
#[derive(Debug, Default)]
pub struct WriteIdentities {
    ids: HashMap<usize, u32>,
}

impl WriteIdentities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_id(&self, address: usize) -> Option<u32> {
        self.ids.get(&address).copied()
    }

    /// Registers `address` and returns its new id.
    pub fn put(&mut self, address: usize) -> u32 {
        let id = self.ids.len() as u32;
        self.ids.insert(address, id);
        id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Read-side table mapping ids back to instances.
#[derive(Debug)]
pub struct ReadIdentities<T> {
    instances: HashMap<u32, T>,
}

impl<T> Default for ReadIdentities<T> {
    fn default() -> Self {
        Self {
            instances: HashMap::new(),
        }
    }
}

impl<T: Clone> ReadIdentities<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_instance(&self, id: u32) -> Option<T> {
        self.instances.get(&id).cloned()
    }

    pub fn put_instance(&mut self, id: u32, instance: T) {
        self.instances.insert(id, instance);
    }
}
