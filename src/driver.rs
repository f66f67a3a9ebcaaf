//! WiFi driver collaborator interface.
//!
//! Commands are issued synchronously and return as soon as the driver has
//! accepted them. Their outcome arrives later as an
//! [`Event`](crate::event::Event) posted into the dispatcher context.
//!
//! [`RecordingDriver`] logs every command and can be told to fail specific
//! operations. Tests use it to observe what the state machines asked for.

use crate::config::{NetworkDescriptor, SecurityMode};
use crate::error::{DriverError, DriverOp};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// One access point reported by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub ssid: String,
    pub bssid: [u8; 6],
    /// Signal strength in dBm.
    pub rssi: i8,
    pub channel: u8,
    pub security: SecurityMode,
}

/// Station and AP commands.
pub trait WifiDriver: Send {
    /// Bring the station interface up. Completion: `StationStarted`.
    fn start_station(&mut self) -> Result<(), DriverError>;

    /// Take the station interface down. Completion: `StationStopped`.
    fn stop_station(&mut self) -> Result<(), DriverError>;

    /// Join `network`. Completion: `StationConnected` or `StationDisconnected`.
    fn connect(&mut self, network: &NetworkDescriptor) -> Result<(), DriverError>;

    /// Leave the current network. Completion: `StationDisconnected`.
    fn disconnect(&mut self) -> Result<(), DriverError>;

    /// Start a scan. Completion: `ScanDone` or `ScanFailed`.
    fn start_scan(&mut self) -> Result<(), DriverError>;

    /// Bring the AP up. Completion: `ApStarted` or `ApStartFailed`.
    fn start_ap(&mut self) -> Result<(), DriverError>;

    /// Take the AP down. Completion: `ApStopped`.
    fn stop_ap(&mut self) -> Result<(), DriverError>;
}

/// A command observed by [`RecordingDriver`] or
/// [`RecordingTunnel`](crate::tunnel::RecordingTunnel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    StartStation,
    StopStation,
    Connect(String),
    Disconnect,
    Scan,
    StartAp,
    StopAp,
    StartTunnel,
    StopTunnel,
}

impl DriverCommand {
    pub fn op(&self) -> DriverOp {
        match self {
            Self::StartStation => DriverOp::StartStation,
            Self::StopStation => DriverOp::StopStation,
            Self::Connect(_) => DriverOp::Connect,
            Self::Disconnect => DriverOp::Disconnect,
            Self::Scan => DriverOp::Scan,
            Self::StartAp => DriverOp::StartAp,
            Self::StopAp => DriverOp::StopAp,
            Self::StartTunnel => DriverOp::StartTunnel,
            Self::StopTunnel => DriverOp::StopTunnel,
        }
    }
}

#[derive(Debug, Default)]
struct LogInner {
    commands: Vec<DriverCommand>,
    failures: HashMap<DriverOp, i32>,
}

/// Shared command log with failure injection.
///
/// Clones share the same log, so a test keeps one handle while the manager
/// owns the driver.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    inner: Arc<Mutex<LogInner>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `command`, failing it if its operation has an injected failure.
    ///
    /// Failed commands are still recorded.
    pub fn record(&self, command: DriverCommand) -> Result<(), DriverError> {
        let mut inner = self.lock();
        let op = command.op();
        inner.commands.push(command);
        match inner.failures.get(&op) {
            Some(&code) => Err(DriverError::new(op, code)),
            None => Ok(()),
        }
    }

    /// Make every later `op` command fail with `code`.
    pub fn fail(&self, op: DriverOp, code: i32) {
        self.lock().failures.insert(op, code);
    }

    pub fn clear_failure(&self, op: DriverOp) {
        self.lock().failures.remove(&op);
    }

    pub fn commands(&self) -> Vec<DriverCommand> {
        self.lock().commands.clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<DriverCommand> {
        std::mem::take(&mut self.lock().commands)
    }

    /// Number of recorded commands for `op`.
    pub fn count(&self, op: DriverOp) -> usize {
        self.lock().commands.iter().filter(|c| c.op() == op).count()
    }
}

/// Driver that only records commands.
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    log: CommandLog,
}

impl RecordingDriver {
    pub fn new(log: CommandLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }
}

impl WifiDriver for RecordingDriver {
    fn start_station(&mut self) -> Result<(), DriverError> {
        self.log.record(DriverCommand::StartStation)
    }

    fn stop_station(&mut self) -> Result<(), DriverError> {
        self.log.record(DriverCommand::StopStation)
    }

    fn connect(&mut self, network: &NetworkDescriptor) -> Result<(), DriverError> {
        self.log.record(DriverCommand::Connect(network.ssid.clone()))
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        self.log.record(DriverCommand::Disconnect)
    }

    fn start_scan(&mut self) -> Result<(), DriverError> {
        self.log.record(DriverCommand::Scan)
    }

    fn start_ap(&mut self) -> Result<(), DriverError> {
        self.log.record(DriverCommand::StartAp)
    }

    fn stop_ap(&mut self) -> Result<(), DriverError> {
        self.log.record(DriverCommand::StopAp)
    }
}
