//! Per-component serialization of update and version operations

use crate::component::ComponentId;
use crate::error::{FirmwareUpdateError, FirmwareUpdateResult};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use tracing::warn;

/// Set of components with an operation in flight.
#[derive(Debug, Default)]
pub struct ComponentLocks {
    in_flight: Mutex<BTreeSet<ComponentId>>,
}

impl ComponentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or fail with [`FirmwareUpdateError::Busy`] if it is
    /// already claimed.
    pub fn try_acquire(&self, id: ComponentId) -> FirmwareUpdateResult<ComponentLease<'_>> {
        if !self.in_flight.lock().insert(id) {
            warn!(component_id = %id, "Rejecting request, component busy");
            return Err(FirmwareUpdateError::Busy(id));
        }
        Ok(ComponentLease { locks: self, id })
    }

    pub fn is_busy(&self, id: ComponentId) -> bool {
        self.in_flight.lock().contains(&id)
    }

    pub fn in_flight(&self) -> Vec<ComponentId> {
        self.in_flight.lock().iter().copied().collect()
    }
}

/// Releases its component when dropped.
#[derive(Debug)]
#[must_use = "the component is released as soon as the lease is dropped"]
pub struct ComponentLease<'a> {
    locks: &'a ComponentLocks,
    id: ComponentId,
}

impl ComponentLease<'_> {
    pub fn component_id(&self) -> ComponentId {
        self.id
    }
}

impl Drop for ComponentLease<'_> {
    fn drop(&mut self) {
        self.locks.in_flight.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_busy() -> FirmwareUpdateResult<()> {
        let locks = ComponentLocks::new();
        let lease = locks.try_acquire(ComponentId(2))?;

        assert!(matches!(
            locks.try_acquire(ComponentId(2)),
            Err(FirmwareUpdateError::Busy(ComponentId(2)))
        ));
        let other = locks.try_acquire(ComponentId(3))?;
        assert_eq!(locks.in_flight(), vec![ComponentId(2), ComponentId(3)]);

        drop(lease);
        drop(other);
        assert!(!locks.is_busy(ComponentId(2)));
        let _again = locks.try_acquire(ComponentId(2))?;
        Ok(())
    }
}
