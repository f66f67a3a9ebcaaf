//! ESP-IDF WiFi integration.
//!
//! # Components
//!
//! - [`connection`] - [`WifiDriver`](crate::driver::WifiDriver) over `EspWifi`
//! - [`events`] - System event loop bridge into the dispatcher
//!
//! Provision persistence lives in [`crate::provisioning`].

pub mod connection;
pub mod events;

pub use connection::EspWifiDriver;
pub use events::EventBridge;
