//! Connectivity configuration.
//!
//! # Components
//!
//! - [`network`] - Station network descriptor and its validation (host-testable)
//! - [`settings`] - Initial modes and timer durations

mod network;
mod settings;

pub use network::{
    ConfigError, NetworkDescriptor, NetworkType, SecurityMode, MAX_PASSWORD_LEN, MAX_SSID_LEN,
    MIN_PASSWORD_LEN, STATION_NETWORK_ID,
};
pub use settings::{
    ConnectivityConfig, DEFAULT_AP_IDLE_TIMEOUT_MS, DEFAULT_CONNECTIVITY_TEST_TIMEOUT_MS,
    DEFAULT_RECONNECT_INTERVAL_MS, DEFAULT_SCAN_TIMEOUT_MS,
};
