//! Service tunnel lifecycle machine.
//!
//! Decides when the tunnel transport should be running and mirrors its
//! health. Retry cadence belongs to the transport; this machine only asks
//! for start and stop.

use crate::config::ConfigError;
use crate::driver::{CommandLog, DriverCommand};
use crate::error::{ConnectivityError, DriverError};
use log::{debug, info, warn};
use std::fmt;
use std::str::FromStr;

/// Whether the service tunnel may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelMode {
    NotSupported,
    Disabled,
    Enabled,
}

impl fmt::Display for TunnelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotSupported => "not-supported",
            Self::Disabled => "disabled",
            Self::Enabled => "enabled",
        })
    }
}

impl FromStr for TunnelMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "not-supported" => Self::NotSupported,
            "disabled" => Self::Disabled,
            "enabled" => Self::Enabled,
            other => return Err(ConfigError::UnknownValue(other.to_string())),
        })
    }
}

/// Tunnel status reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelStatus {
    /// Tunnel is up and carrying traffic.
    Connected,
    /// Tunnel is down; the transport keeps retrying.
    Failed,
    /// Tunnel is down and the transport has given up.
    Closed,
}

impl fmt::Display for TunnelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connected => "connected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        })
    }
}

/// Why the transport reported a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelReason {
    Established,
    ConnectError,
    PeerClosed,
    Timeout,
    Shutdown,
}

/// Notification from the tunnel transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelNotification {
    /// Session the transport was started with.
    pub session: u32,
    pub status: TunnelStatus,
    pub reason: TunnelReason,
    /// Transport error code (0 when none).
    pub error_code: i32,
}

impl TunnelNotification {
    pub fn connected(session: u32) -> Self {
        Self {
            session,
            status: TunnelStatus::Connected,
            reason: TunnelReason::Established,
            error_code: 0,
        }
    }

    pub fn failed(session: u32, reason: TunnelReason, error_code: i32) -> Self {
        Self {
            session,
            status: TunnelStatus::Failed,
            reason,
            error_code,
        }
    }

    pub fn closed(session: u32, reason: TunnelReason, error_code: i32) -> Self {
        Self {
            session,
            status: TunnelStatus::Closed,
            reason,
            error_code,
        }
    }
}

/// Tunnel transport collaborator.
///
/// Both commands return immediately; the outcome arrives as a
/// [`TunnelNotification`] stamped with the session passed to `start`.
pub trait TunnelTransport: Send {
    fn start(&mut self, session: u32) -> Result<(), DriverError>;
    fn stop(&mut self) -> Result<(), DriverError>;
}

/// Transport that only records commands.
#[derive(Debug, Clone, Default)]
pub struct RecordingTunnel {
    log: CommandLog,
}

impl RecordingTunnel {
    pub fn new(log: CommandLog) -> Self {
        Self { log }
    }
}

impl TunnelTransport for RecordingTunnel {
    fn start(&mut self, _session: u32) -> Result<(), DriverError> {
        self.log.record(DriverCommand::StartTunnel)
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        self.log.record(DriverCommand::StopTunnel)
    }
}

/// Service tunnel lifecycle machine.
#[derive(Debug)]
pub struct ServiceTunnel {
    mode: TunnelMode,
    started: bool,
    healthy: bool,
    /// Set on `Closed` or a refused start; cleared when station
    /// connectivity or the mode changes.
    latched_down: bool,
    station_connected: bool,
    /// Bumped on every start; notifications from older sessions are dropped.
    session: u32,
}

impl ServiceTunnel {
    pub fn new(mode: TunnelMode) -> Self {
        Self {
            mode,
            started: false,
            healthy: false,
            latched_down: false,
            station_connected: false,
            session: 0,
        }
    }

    pub fn mode(&self) -> TunnelMode {
        self.mode
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Session of the most recent start.
    pub fn session(&self) -> u32 {
        self.session
    }

    /// Started and reported healthy by the transport.
    pub fn is_healthy(&self) -> bool {
        self.started && self.healthy
    }

    /// Change the tunnel mode. Returns `true` if the mode changed.
    pub fn set_mode(&mut self, mode: TunnelMode) -> Result<bool, ConnectivityError> {
        if mode == self.mode {
            return Ok(false);
        }
        if mode == TunnelMode::NotSupported || self.mode == TunnelMode::NotSupported {
            return Err(ConnectivityError::InvalidState);
        }
        info!("Service tunnel mode change: {} -> {}", self.mode, mode);
        self.mode = mode;
        self.latched_down = false;
        Ok(true)
    }

    /// Start or stop the transport to match mode and station connectivity.
    ///
    /// Returns `true` if the started flag changed.
    pub fn drive(&mut self, transport: &mut dyn TunnelTransport, station_connected: bool) -> bool {
        if station_connected != self.station_connected {
            self.station_connected = station_connected;
            self.latched_down = false;
        }

        let wanted = self.mode == TunnelMode::Enabled && station_connected && !self.latched_down;
        if wanted && !self.started {
            self.session = self.session.wrapping_add(1);
            match transport.start(self.session) {
                Ok(()) => {
                    info!("Service tunnel started (session {})", self.session);
                    self.started = true;
                    self.healthy = false;
                    true
                }
                Err(e) => {
                    warn!("Service tunnel start failed: {}", e);
                    self.latched_down = true;
                    false
                }
            }
        } else if !wanted && self.started {
            if let Err(e) = transport.stop() {
                warn!("Service tunnel stop failed: {}", e);
            }
            info!("Service tunnel stopped");
            self.started = false;
            self.healthy = false;
            true
        } else {
            false
        }
    }

    /// Apply a transport notification. Returns `true` if anything changed.
    pub fn on_notification(&mut self, notification: TunnelNotification) -> bool {
        if notification.session != self.session {
            debug!(
                "Service tunnel {} notification from session {} dropped (current {})",
                notification.status, notification.session, self.session
            );
            return false;
        }
        if !self.started {
            debug!(
                "Service tunnel {} notification ignored: tunnel not started",
                notification.status
            );
            return false;
        }

        info!(
            "Service tunnel {} ({:?}, code {})",
            notification.status, notification.reason, notification.error_code
        );
        match notification.status {
            TunnelStatus::Connected => {
                let changed = !self.healthy;
                self.healthy = true;
                changed
            }
            TunnelStatus::Failed => {
                let changed = self.healthy;
                self.healthy = false;
                changed
            }
            TunnelStatus::Closed => {
                self.started = false;
                self.healthy = false;
                self.latched_down = true;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverOp;

    fn rig(mode: TunnelMode) -> (ServiceTunnel, RecordingTunnel, CommandLog) {
        let log = CommandLog::new();
        (ServiceTunnel::new(mode), RecordingTunnel::new(log.clone()), log)
    }

    #[test]
    fn test_mode_strings() {
        assert_eq!("enabled".parse::<TunnelMode>(), Ok(TunnelMode::Enabled));
        assert_eq!(TunnelMode::NotSupported.to_string(), "not-supported");
        assert!("on-demand".parse::<TunnelMode>().is_err());
    }

    #[test]
    fn test_starts_with_station_connectivity() {
        let (mut tunnel, mut transport, log) = rig(TunnelMode::Enabled);

        assert!(!tunnel.drive(&mut transport, false));
        assert!(tunnel.drive(&mut transport, true));
        assert!(tunnel.is_started());
        assert!(!tunnel.is_healthy());

        assert!(tunnel.on_notification(TunnelNotification::connected(tunnel.session())));
        assert!(tunnel.is_healthy());

        assert!(tunnel.drive(&mut transport, false));
        assert!(!tunnel.is_started());
        assert_eq!(
            log.commands(),
            vec![DriverCommand::StartTunnel, DriverCommand::StopTunnel]
        );
    }

    #[test]
    fn test_disabled_mode_stops_tunnel() {
        let (mut tunnel, mut transport, _log) = rig(TunnelMode::Enabled);
        tunnel.drive(&mut transport, true);
        tunnel.set_mode(TunnelMode::Disabled).unwrap();
        assert!(tunnel.drive(&mut transport, true));
        assert!(!tunnel.is_started());
    }

    #[test]
    fn test_failed_keeps_started() {
        let (mut tunnel, mut transport, _log) = rig(TunnelMode::Enabled);
        tunnel.drive(&mut transport, true);
        let session = tunnel.session();
        tunnel.on_notification(TunnelNotification::connected(session));

        assert!(tunnel.on_notification(TunnelNotification::failed(
            session,
            TunnelReason::Timeout,
            110
        )));
        assert!(tunnel.is_started());
        assert!(!tunnel.is_healthy());
    }

    #[test]
    fn test_closed_latches_until_connectivity_changes() {
        let (mut tunnel, mut transport, log) = rig(TunnelMode::Enabled);
        tunnel.drive(&mut transport, true);
        assert!(tunnel.on_notification(TunnelNotification::closed(
            tunnel.session(),
            TunnelReason::ConnectError,
            111
        )));
        assert!(!tunnel.is_started());

        assert!(!tunnel.drive(&mut transport, true));
        assert_eq!(log.count(DriverOp::StartTunnel), 1);

        // Connectivity bounce releases the latch
        tunnel.drive(&mut transport, false);
        assert!(tunnel.drive(&mut transport, true));
        assert_eq!(log.count(DriverOp::StartTunnel), 2);
    }

    #[test]
    fn test_refused_start_latches() {
        let (mut tunnel, mut transport, log) = rig(TunnelMode::Enabled);
        log.fail(DriverOp::StartTunnel, -1);
        assert!(!tunnel.drive(&mut transport, true));
        log.clear_failure(DriverOp::StartTunnel);
        assert!(!tunnel.drive(&mut transport, true));

        tunnel.set_mode(TunnelMode::Disabled).unwrap();
        tunnel.set_mode(TunnelMode::Enabled).unwrap();
        assert!(tunnel.drive(&mut transport, true));
    }

    #[test]
    fn test_stale_notification_ignored() {
        let (mut tunnel, _transport, _log) = rig(TunnelMode::Enabled);
        assert!(!tunnel.on_notification(TunnelNotification::connected(tunnel.session())));
        assert!(!tunnel.is_healthy());
    }

    #[test]
    fn test_old_session_notifications_dropped() {
        let (mut tunnel, mut transport, log) = rig(TunnelMode::Enabled);
        tunnel.drive(&mut transport, true);
        let first = tunnel.session();

        // Link bounce restarts the transport under a new session
        tunnel.drive(&mut transport, false);
        tunnel.drive(&mut transport, true);
        assert_ne!(tunnel.session(), first);
        assert_eq!(log.count(DriverOp::StartTunnel), 2);

        // Late reports from the first worker change nothing
        assert!(!tunnel.on_notification(TunnelNotification::connected(first)));
        assert!(!tunnel.is_healthy());
        assert!(!tunnel.on_notification(TunnelNotification::closed(
            first,
            TunnelReason::PeerClosed,
            0
        )));
        assert!(tunnel.is_started());

        // The current session still gets through
        assert!(tunnel.on_notification(TunnelNotification::connected(tunnel.session())));
        assert!(tunnel.is_healthy());
    }

    #[test]
    fn test_not_supported_is_sticky() {
        let mut tunnel = ServiceTunnel::new(TunnelMode::NotSupported);
        assert_eq!(
            tunnel.set_mode(TunnelMode::Enabled),
            Err(ConnectivityError::InvalidState)
        );
    }
}
