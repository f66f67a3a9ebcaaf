//! NVS persistence for the station provision.
//!
//! Stores the provisioned network in ESP32's Non-Volatile Storage (NVS)
//! so it persists across reboots.

use super::store::ProvisioningStore;
use crate::config::{NetworkDescriptor, MAX_PASSWORD_LEN, MAX_SSID_LEN};
use crate::error::StorageError;
use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use esp_idf_sys::EspError;
use log::debug;

/// NVS namespace for WiFi configuration.
const NVS_NAMESPACE: &str = "wifi_config";

/// NVS key for the stored network.
const NVS_KEY: &str = "network";

/// Format: [security:1][ssid_len:1][ssid:32][password_len:1][password:64].
const MAX_NETWORK_BUFFER_SIZE: usize = 1 + 1 + MAX_SSID_LEN + 1 + MAX_PASSWORD_LEN;

fn backend(e: EspError) -> StorageError {
    StorageError::Backend(format!("{:?}", e))
}

/// NVS-backed provisioning store.
pub struct NvsProvisioningStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsProvisioningStore {
    pub fn new(partition: EspNvsPartition<NvsDefault>) -> Result<Self, StorageError> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true).map_err(backend)?;
        Ok(Self { nvs })
    }

    /// Open the store on the default NVS partition.
    pub fn take_default() -> Result<Self, StorageError> {
        let partition = EspNvsPartition::<NvsDefault>::take().map_err(backend)?;
        Self::new(partition)
    }
}

impl ProvisioningStore for NvsProvisioningStore {
    fn load(&mut self) -> Result<Option<NetworkDescriptor>, StorageError> {
        let mut buf = [0u8; MAX_NETWORK_BUFFER_SIZE];
        let Some(bytes) = self.nvs.get_raw(NVS_KEY, &mut buf).map_err(backend)? else {
            return Ok(None);
        };
        NetworkDescriptor::from_bytes(bytes)
            .map(Some)
            .map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    fn save(&mut self, network: &NetworkDescriptor) -> Result<(), StorageError> {
        self.nvs
            .set_raw(NVS_KEY, &network.to_bytes())
            .map_err(backend)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        let removed = self.nvs.remove(NVS_KEY).map_err(backend)?;
        if !removed {
            debug!("No stored network to clear");
        }
        Ok(())
    }
}
