//! Provisioning persistence for host (development) builds.
//!
//! Stores the station provision in a file so it persists across runs.
//! Uses `~/.connectivity-esp32/network.bin` by default, in the same byte
//! format the device keeps in NVS.

use super::store::ProvisioningStore;
use crate::config::NetworkDescriptor;
use crate::error::StorageError;
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Get the default provision file path.
///
/// Returns `~/.connectivity-esp32/network.bin`
pub fn default_provision_path() -> io::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home)
        .join(".connectivity-esp32")
        .join("network.bin"))
}

/// File-backed provisioning store.
#[derive(Debug, Clone)]
pub struct FileProvisioningStore {
    path: PathBuf,
}

impl FileProvisioningStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at [`default_provision_path`].
    pub fn open_default() -> Result<Self, StorageError> {
        Ok(Self::new(default_provision_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProvisioningStore for FileProvisioningStore {
    fn load(&mut self) -> Result<Option<NetworkDescriptor>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No provision file found at {:?}", self.path);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        NetworkDescriptor::from_bytes(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    fn save(&mut self, network: &NetworkDescriptor) -> Result<(), StorageError> {
        // Create parent directory if needed
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = network.to_bytes();
        fs::write(&self.path, &bytes)?;

        // Verify write by reading back
        let read_back = fs::read(&self.path)?;
        if read_back != bytes {
            return Err(StorageError::Io(format!(
                "provision verification failed: wrote {} bytes, read {} bytes",
                bytes.len(),
                read_back.len()
            )));
        }

        info!("Provision saved to {:?}", self.path);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Provision removed from {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
