//! The service registry: a fixed arena of write-once slots indexed by id.
//!
//! Slots are `OnceLock` cells, which gives the registry its contract for
//! free: write-once before start, lock-free reads afterward, and every
//! instance lives exactly as long as the dispatcher. Admission rules
//! (range, uniqueness, pre-start only) surface as `RegistryError`.

use std::sync::atomic::AtomicBool;
use std::sync::OnceLock;

use parking_lot::Mutex;

use types::{ServiceId, BRIDGE_ID, MAX_SERVICE_ID};

use crate::error::RegistryError;
use crate::mailbox::Mailbox;
use crate::service::Service;

/// One registry slot: the owned service instance plus its scheduling
/// state. The service mutex serializes drains; the pending flag keeps
/// the id in the queue at most once.
pub(crate) struct ServiceCell {
    pub(crate) mailbox: Mailbox,
    /// True while this id sits in the pending queue.
    pub(crate) pending: AtomicBool,
    pub(crate) service: Mutex<Box<dyn Service>>,
}

pub(crate) struct Registry {
    slots: Box<[OnceLock<ServiceCell>]>,
    local: Mutex<Vec<ServiceId>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        let slots = (0..=MAX_SERVICE_ID as usize)
            .map(|_| OnceLock::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            local: Mutex::new(Vec::new()),
        }
    }

    /// Admit a user service. The id joins the local id list broadcast in
    /// join notifications.
    pub(crate) fn insert(
        &self,
        id: ServiceId,
        service: Box<dyn Service>,
    ) -> Result<(), RegistryError> {
        if id == BRIDGE_ID || id > MAX_SERVICE_ID {
            return Err(RegistryError::IdOutOfRange {
                id,
                max: MAX_SERVICE_ID,
            });
        }
        self.insert_at(id, service)?;
        self.local.lock().push(id);
        Ok(())
    }

    /// Provision the reserved bridge slot. Not part of the local id list.
    pub(crate) fn insert_bridge(&self, service: Box<dyn Service>) -> Result<(), RegistryError> {
        self.insert_at(BRIDGE_ID, service)
    }

    fn insert_at(&self, id: ServiceId, service: Box<dyn Service>) -> Result<(), RegistryError> {
        let cell = ServiceCell {
            mailbox: Mailbox::new(),
            pending: AtomicBool::new(false),
            service: Mutex::new(service),
        };
        self.slots[id as usize]
            .set(cell)
            .map_err(|_| RegistryError::DuplicateId { id })
    }

    pub(crate) fn get(&self, id: ServiceId) -> Option<&ServiceCell> {
        self.slots.get(id as usize)?.get()
    }

    pub(crate) fn contains(&self, id: ServiceId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn local_ids(&self) -> Vec<ServiceId> {
        self.local.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Context;
    use types::Envelope;

    struct Nop;
    impl Service for Nop {
        fn handle(&mut self, _ctx: &Context<'_>, _env: Envelope) {}
    }

    #[test]
    fn admission_rules() {
        let registry = Registry::new();
        assert!(registry.insert(1, Box::new(Nop)).is_ok());

        // Duplicate id.
        assert_eq!(
            registry.insert(1, Box::new(Nop)),
            Err(RegistryError::DuplicateId { id: 1 })
        );

        // Range: 0 is reserved, MAX is the last valid id.
        assert!(matches!(
            registry.insert(0, Box::new(Nop)),
            Err(RegistryError::IdOutOfRange { .. })
        ));
        assert!(registry.insert(MAX_SERVICE_ID, Box::new(Nop)).is_ok());
        assert!(matches!(
            registry.insert(MAX_SERVICE_ID + 1, Box::new(Nop)),
            Err(RegistryError::IdOutOfRange { .. })
        ));
    }

    #[test]
    fn bridge_slot_is_separate_from_local_ids() {
        let registry = Registry::new();
        registry.insert_bridge(Box::new(Nop)).unwrap();
        registry.insert(3, Box::new(Nop)).unwrap();
        assert!(registry.contains(BRIDGE_ID));
        assert_eq!(registry.local_ids(), vec![3]);
    }

    #[test]
    fn lookup_misses() {
        let registry = Registry::new();
        assert!(registry.get(5).is_none());
        assert!(registry.get(MAX_SERVICE_ID + 1).is_none());
    }
}
