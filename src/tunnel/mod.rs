//! Service tunnel.
//!
//! [`ServiceTunnel`] decides when the tunnel should run: tunnel mode
//! `Enabled` and the station `Connected`. The transport behind
//! [`TunnelTransport`] owns the connection and its retry cadence, and reports
//! back with [`TunnelNotification`]s.
//!
//! # Platform Support
//!
//! | Transport | Host | ESP32 |
//! |-----------|------|-------|
//! | [`TcpTunnel`] | Works | Works once the station has an address |
//! | [`RecordingTunnel`] | Tests | Tests |
//!
//! # Example
//!
//! ```
//! use connectivity_esp32::driver::CommandLog;
//! use connectivity_esp32::tunnel::{RecordingTunnel, ServiceTunnel, TunnelMode};
//!
//! let mut tunnel = ServiceTunnel::new(TunnelMode::Enabled);
//! let mut transport = RecordingTunnel::new(CommandLog::new());
//!
//! // Starts only once the station is connected
//! assert!(!tunnel.drive(&mut transport, false));
//! assert!(tunnel.drive(&mut transport, true));
//! assert!(tunnel.is_started());
//! ```

mod endpoint;
mod machine;
mod tcp;

pub use endpoint::{ServiceEndpoint, DEFAULT_SERVICE_PORT};
pub use machine::{
    RecordingTunnel, ServiceTunnel, TunnelMode, TunnelNotification, TunnelReason, TunnelStatus,
    TunnelTransport,
};
pub use tcp::{TcpTunnel, MAX_CONNECT_ATTEMPTS};
