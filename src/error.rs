//! Error types shared by the connectivity state machines.
//!
//! Configuration errors from mutator calls are returned synchronously to the
//! caller. Asynchronous failures (driver callbacks, tunnel notifications) are
//! folded into state transitions and never surface through these types.

use crate::config::ConfigError;
use std::fmt;

/// A collaborator command that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    StartStation,
    StopStation,
    Connect,
    Disconnect,
    Scan,
    StartAp,
    StopAp,
    StartTunnel,
    StopTunnel,
}

impl DriverOp {
    /// Short name used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartStation => "start-station",
            Self::StopStation => "stop-station",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Scan => "scan",
            Self::StartAp => "start-ap",
            Self::StopAp => "stop-ap",
            Self::StartTunnel => "start-tunnel",
            Self::StopTunnel => "stop-tunnel",
        }
    }
}

impl fmt::Display for DriverOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A driver or tunnel command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverError {
    /// The command that failed.
    pub op: DriverOp,
    /// Platform error code (ESP-IDF `esp_err_t` on device).
    pub code: i32,
}

impl DriverError {
    pub fn new(op: DriverOp, code: i32) -> Self {
        Self { op, code }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed (code {})", self.op, self.code)
    }
}

impl std::error::Error for DriverError {}

/// Provisioning persistence failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Filesystem I/O failure (host).
    Io(String),
    /// Storage backend failure (NVS on device).
    Backend(String),
    /// Stored data could not be decoded.
    Corrupt(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "storage I/O error: {}", msg),
            Self::Backend(msg) => write!(f, "storage backend error: {}", msg),
            Self::Corrupt(msg) => write!(f, "stored data corrupt: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Errors returned by connectivity mutators and provisioning handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    /// Operation is illegal in the current mode or state.
    InvalidState,
    /// The surface is application-controlled, or the station is busy connecting.
    NotAllowed,
    /// A scan or connectivity test is already running.
    Busy,
    /// Malformed network descriptor or setting.
    InvalidConfiguration(ConfigError),
    /// The underlying driver command failed.
    Driver(DriverError),
    /// A scan or connectivity test exceeded its deadline.
    Timeout,
    /// Provisioning persistence failed.
    Storage(StorageError),
    /// The dispatcher is no longer running.
    DispatcherStopped,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState => write!(f, "operation invalid in current state"),
            Self::NotAllowed => write!(f, "operation not allowed"),
            Self::Busy => write!(f, "operation already in progress"),
            Self::InvalidConfiguration(e) => write!(f, "invalid configuration: {}", e),
            Self::Driver(e) => write!(f, "driver error: {}", e),
            Self::Timeout => write!(f, "operation timed out"),
            Self::Storage(e) => write!(f, "{}", e),
            Self::DispatcherStopped => write!(f, "connectivity dispatcher stopped"),
        }
    }
}

impl std::error::Error for ConnectivityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidConfiguration(e) => Some(e),
            Self::Driver(e) => Some(e),
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for ConnectivityError {
    fn from(e: ConfigError) -> Self {
        Self::InvalidConfiguration(e)
    }
}

impl From<DriverError> for ConnectivityError {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}

impl From<StorageError> for ConnectivityError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::new(DriverOp::StartAp, -1);
        assert_eq!(err.to_string(), "start-ap failed (code -1)");
    }

    #[test]
    fn test_connectivity_error_source() {
        let err: ConnectivityError = DriverError::new(DriverOp::Connect, 3).into();
        assert!(err.source().is_some());
        assert!(ConnectivityError::Busy.source().is_none());
    }

    #[test]
    fn test_storage_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = StorageError::from(io);
        assert!(matches!(err, StorageError::Io(_)));
    }
}
