//! Provisioning store interface and the in-memory implementation.

use crate::config::NetworkDescriptor;
use crate::error::StorageError;
use std::sync::{Arc, Mutex, MutexGuard};

/// Persistence for the station provision.
///
/// Calls are synchronous and may fail.
pub trait ProvisioningStore: Send {
    /// Load the stored network, if any.
    fn load(&mut self) -> Result<Option<NetworkDescriptor>, StorageError>;

    fn save(&mut self, network: &NetworkDescriptor) -> Result<(), StorageError>;

    /// Remove the stored network. Clearing an empty store succeeds.
    fn clear(&mut self) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    network: Option<NetworkDescriptor>,
    fail_writes: bool,
}

/// In-memory store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `network`.
    pub fn with_network(network: NetworkDescriptor) -> Self {
        let store = Self::new();
        store.lock().network = Some(network);
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current contents.
    pub fn network(&self) -> Option<NetworkDescriptor> {
        self.lock().network.clone()
    }

    /// Make `save` and `clear` fail until reset.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }
}

impl ProvisioningStore for MemoryStore {
    fn load(&mut self) -> Result<Option<NetworkDescriptor>, StorageError> {
        Ok(self.lock().network.clone())
    }

    fn save(&mut self, network: &NetworkDescriptor) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(StorageError::Backend("write refused".to_string()));
        }
        inner.network = Some(network.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(StorageError::Backend("write refused".to_string()));
        }
        inner.network = None;
        Ok(())
    }
}
