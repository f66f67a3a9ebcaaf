//! Connectivity state-machine engine for ESP32 devices.
//!
//! Keeps a WiFi station, a WiFi access point and a service tunnel in the
//! modes the application asks for, handles network provisioning requests,
//! and derives connectivity facts from the resulting state.
//!
//! Everything except the [`wifi`] module is platform-independent and can be
//! tested on the host machine without ESP32 hardware.
//!
//! # Modules
//!
//! - [`manager`] - Owns the state machines and runs the settle pass
//! - [`runtime`] - Dispatcher task, timers and the application handle
//! - [`station`], [`ap`], [`tunnel`] - Per-surface state machines
//! - [`provisioning`] - Provisioning delegate and persistence
//! - [`aggregator`] - Address tracking and fact derivation
//! - [`status_server`] - JSON status over HTTP
//! - [`sim`] - Simulated radio and console for host runs

pub mod aggregator;
pub mod ap;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod facts;
pub mod manager;
pub mod provisioning;
pub mod runtime;
pub mod sim;
pub mod station;
pub mod status_server;
pub mod timer;
pub mod tunnel;
#[cfg(feature = "esp32")]
pub mod wifi;

// Re-export commonly used items
pub use ap::{ApMode, ApState};
pub use config::{ConnectivityConfig, NetworkDescriptor, NetworkType, SecurityMode};
pub use error::{ConnectivityError, DriverError, StorageError};
pub use event::{Command, CommandOutput, Event, Notification, ProvisioningRequest};
pub use facts::{ConnectivityFacts, SharedStatus, StatusSnapshot};
pub use manager::{ConnectivityManager, Platform};
pub use runtime::{ConnectivityHandle, Dispatcher, EventSender, TokioTimers};
pub use station::{StationMode, StationState};
pub use tunnel::TunnelMode;
