//! Connection Registry
//!
//! The set of centrals that are currently connected, keyed by the
//! connection handle the radio stack assigned at connect time.
//!
//! A handle is present iff its central is connected. The stack is the
//! authority on that, so a connect for a handle we already hold or a
//! disconnect for one we never saw means our view and the stack's have
//! diverged. Both are reported to the caller and logged; neither changes
//! the set.

use heapless::Vec;

use crate::config::MAX_CONNECTIONS;

/// Connection handle assigned by the radio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionHandle(pub u16);

/// Owned copy of the registry contents
pub type HandleSnapshot = Vec<ConnectionHandle, MAX_CONNECTIONS>;

/// Connection registry errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionError {
    /// Connect for a handle that is already registered
    AlreadyConnected,
    /// Disconnect for a handle that is not registered
    NotConnected,
    /// More simultaneous connections than `MAX_CONNECTIONS`
    RegistryFull,
}

/// Set of currently connected centrals
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    handles: Vec<ConnectionHandle, MAX_CONNECTIONS>,
}

impl ConnectionRegistry {
    pub const fn new() -> Self {
        Self { handles: Vec::new() }
    }

    /// Register a newly connected central
    pub fn add(&mut self, handle: ConnectionHandle) -> Result<(), ConnectionError> {
        if self.contains(handle) {
            error!("REGISTRY: Duplicate connect for handle {}", handle.0);
            return Err(ConnectionError::AlreadyConnected);
        }

        if self.handles.push(handle).is_err() {
            error!("REGISTRY: Cannot add handle {} - registry full", handle.0);
            return Err(ConnectionError::RegistryFull);
        }

        debug!("REGISTRY: Added handle {} ({} connected)", handle.0, self.handles.len());
        Ok(())
    }

    /// Forget a central that has disconnected
    pub fn remove(&mut self, handle: ConnectionHandle) -> Result<(), ConnectionError> {
        let Some(index) = self.handles.iter().position(|h| *h == handle) else {
            error!("REGISTRY: Disconnect for unknown handle {}", handle.0);
            return Err(ConnectionError::NotConnected);
        };

        self.handles.swap_remove(index);
        debug!("REGISTRY: Removed handle {} ({} connected)", handle.0, self.handles.len());
        Ok(())
    }

    /// Visit every connected handle.
    ///
    /// The visit runs over a snapshot, so the set may be changed while it is
    /// in progress without affecting which handles are visited.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(ConnectionHandle),
    {
        self.snapshot().into_iter().for_each(f);
    }

    /// Copy of the current handle set
    pub fn snapshot(&self) -> HandleSnapshot {
        self.handles.clone()
    }

    pub fn contains(&self, handle: ConnectionHandle) -> bool {
        self.handles.contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Drop every handle (peripheral shutdown)
    pub fn clear(&mut self) {
        self.handles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.add(ConnectionHandle(1)).is_ok());
        assert!(registry.contains(ConnectionHandle(1)));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(ConnectionHandle(1)).is_ok());
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_connect_is_rejected_without_duplicating() {
        let mut registry = ConnectionRegistry::new();
        registry.add(ConnectionHandle(7)).unwrap();

        assert_eq!(registry.add(ConnectionHandle(7)), Err(ConnectionError::AlreadyConnected));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn disconnect_without_connect_is_reported() {
        let mut registry = ConnectionRegistry::new();
        registry.add(ConnectionHandle(1)).unwrap();

        assert_eq!(registry.remove(ConnectionHandle(2)), Err(ConnectionError::NotConnected));
        assert!(registry.contains(ConnectionHandle(1)));
    }

    #[test]
    fn full_registry_rejects_new_handles() {
        let mut registry = ConnectionRegistry::new();
        for h in 0..MAX_CONNECTIONS as u16 {
            registry.add(ConnectionHandle(h)).unwrap();
        }

        assert_eq!(registry.add(ConnectionHandle(100)), Err(ConnectionError::RegistryFull));
        assert_eq!(registry.len(), MAX_CONNECTIONS);

        // A slot frees up after a disconnect
        registry.remove(ConnectionHandle(0)).unwrap();
        assert!(registry.add(ConnectionHandle(100)).is_ok());
    }

    #[test]
    fn for_each_visits_every_handle_once() {
        let mut registry = ConnectionRegistry::new();
        registry.add(ConnectionHandle(3)).unwrap();
        registry.add(ConnectionHandle(1)).unwrap();
        registry.add(ConnectionHandle(2)).unwrap();

        let mut seen = std::vec::Vec::new();
        registry.for_each(|h| seen.push(h));
        seen.sort();

        assert_eq!(seen, [ConnectionHandle(1), ConnectionHandle(2), ConnectionHandle(3)]);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_removal() {
        let mut registry = ConnectionRegistry::new();
        registry.add(ConnectionHandle(1)).unwrap();
        registry.add(ConnectionHandle(2)).unwrap();

        let snapshot = registry.snapshot();
        registry.remove(ConnectionHandle(1)).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&ConnectionHandle(1)));
        assert!(!registry.contains(ConnectionHandle(1)));
    }

    #[test]
    fn clear_empties_registry() {
        let mut registry = ConnectionRegistry::new();
        registry.add(ConnectionHandle(1)).unwrap();
        registry.clear();

        assert!(registry.is_empty());
    }
}
