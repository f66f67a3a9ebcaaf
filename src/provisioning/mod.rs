//! Network provisioning.
//!
//! # Components
//!
//! - [`delegate`] - Scan / add / remove / test-connectivity request handling
//! - [`store`] - Persistence interface and in-memory store
//! - [`file_store`] - File-backed store for host builds
//! - `nvs` - NVS-backed store (requires `esp32` feature)

pub mod delegate;
pub mod file_store;
#[cfg(feature = "esp32")]
pub mod nvs;
pub mod store;

pub use delegate::{
    ProvisionedNetwork, ProvisioningDelegate, ProvisioningState, StationControl,
    RENDEZVOUS_MODE_WIFI_NETWORK,
};
pub use file_store::{default_provision_path, FileProvisioningStore};
#[cfg(feature = "esp32")]
pub use nvs::NvsProvisioningStore;
pub use store::{MemoryStore, ProvisioningStore};
