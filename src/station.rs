//! WiFi station state machine.
//!
//! The station owns the client interface lifecycle and reconnect backoff:
//!
//! ```text
//! Disabled -> Enabling -> NotConnected -> Connecting -> ConnectSucceeded -> Connected
//!                              ^              |                               |
//!                              |              v                               v
//!                              +------- ConnectFailed                   Disconnecting
//! ```
//!
//! Driver callbacks move the machine through the transient states;
//! [`Station::drive`] issues the next driver command. Backoff after a failed
//! connect uses a fixed interval. The last failure time suppresses attempts
//! until the reconnect timer fires.

use crate::config::{ConfigError, NetworkDescriptor, STATION_NETWORK_ID};
use crate::driver::WifiDriver;
use crate::error::ConnectivityError;
use crate::timer::{TimerPurpose, TimerService};
use log::{debug, info, warn};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Who controls the station interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationMode {
    /// Hardware has no station interface.
    NotSupported,
    /// The application drives the radio; the manager only observes.
    ApplicationControlled,
    Disabled,
    Enabled,
}

impl fmt::Display for StationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotSupported => "not-supported",
            Self::ApplicationControlled => "application-controlled",
            Self::Disabled => "disabled",
            Self::Enabled => "enabled",
        })
    }
}

impl FromStr for StationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "not-supported" => Self::NotSupported,
            "application-controlled" => Self::ApplicationControlled,
            "disabled" => Self::Disabled,
            "enabled" => Self::Enabled,
            other => return Err(ConfigError::UnknownValue(other.to_string())),
        })
    }
}

/// Station interface lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationState {
    Disabled,
    Enabling,
    NotConnected,
    Connecting,
    ConnectSucceeded,
    ConnectFailed,
    Connected,
    Disconnecting,
}

impl fmt::Display for StationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "disabled",
            Self::Enabling => "enabling",
            Self::NotConnected => "not-connected",
            Self::Connecting => "connecting",
            Self::ConnectSucceeded => "connect-succeeded",
            Self::ConnectFailed => "connect-failed",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        })
    }
}

impl FromStr for StationState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "disabled" => Self::Disabled,
            "enabling" => Self::Enabling,
            "not-connected" => Self::NotConnected,
            "connecting" => Self::Connecting,
            "connect-succeeded" => Self::ConnectSucceeded,
            "connect-failed" => Self::ConnectFailed,
            "connected" => Self::Connected,
            "disconnecting" => Self::Disconnecting,
            other => return Err(ConfigError::UnknownValue(other.to_string())),
        })
    }
}

/// A `(from, to)` state change.
pub type StationTransition = (StationState, StationState);

/// WiFi station state machine.
#[derive(Debug)]
pub struct Station {
    mode: StationMode,
    state: StationState,
    reconnect_interval_ms: u32,
    provision: Option<NetworkDescriptor>,
    last_connect_fail_ms: Option<u64>,
    /// A stop-station command is outstanding; disconnect events are part of it.
    stop_pending: bool,
}

impl Station {
    pub fn new(
        mode: StationMode,
        reconnect_interval_ms: u32,
        provision: Option<NetworkDescriptor>,
    ) -> Self {
        Self {
            mode,
            state: StationState::Disabled,
            reconnect_interval_ms,
            provision,
            last_connect_fail_ms: None,
            stop_pending: false,
        }
    }

    pub fn mode(&self) -> StationMode {
        self.mode
    }

    pub fn state(&self) -> StationState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.mode == StationMode::Enabled
    }

    pub fn is_application_controlled(&self) -> bool {
        self.mode == StationMode::ApplicationControlled
    }

    pub fn is_connected(&self) -> bool {
        self.state == StationState::Connected
    }

    pub fn is_provisioned(&self) -> bool {
        self.provision.is_some()
    }

    pub fn provision(&self) -> Option<&NetworkDescriptor> {
        self.provision.as_ref()
    }

    /// Id of the provisioned network, if any.
    pub fn network_id(&self) -> Option<u32> {
        self.provision.as_ref().map(|_| STATION_NETWORK_ID)
    }

    pub fn reconnect_interval_ms(&self) -> u32 {
        self.reconnect_interval_ms
    }

    /// Time of the last failed connect attempt, cleared once the backoff
    /// expires or a connect succeeds.
    pub fn last_connect_fail_ms(&self) -> Option<u64> {
        self.last_connect_fail_ms
    }

    pub fn set_reconnect_interval_ms(&mut self, ms: u32) -> Result<(), ConnectivityError> {
        if ms == 0 {
            return Err(ConfigError::InvalidSetting("reconnect interval must be > 0").into());
        }
        self.reconnect_interval_ms = ms;
        Ok(())
    }

    /// Change the station mode.
    ///
    /// Returns `true` if the mode changed. Runtime backoff state is reset and
    /// the reconnect timer is cancelled when the station leaves `Enabled`.
    pub fn set_mode(
        &mut self,
        mode: StationMode,
        timers: &mut dyn TimerService,
    ) -> Result<bool, ConnectivityError> {
        if mode == self.mode {
            return Ok(false);
        }
        if mode == StationMode::NotSupported || self.mode == StationMode::NotSupported {
            return Err(ConnectivityError::InvalidState);
        }

        info!("WiFi station mode change: {} -> {}", self.mode, mode);
        if self.mode == StationMode::Enabled {
            timers.cancel(TimerPurpose::StationReconnect);
        }
        self.mode = mode;
        self.last_connect_fail_ms = None;
        Ok(true)
    }

    /// Replace the provisioned network.
    ///
    /// New credentials get an immediate attempt, so any backoff is dropped.
    /// Call [`force_reconnect`](Self::force_reconnect) afterwards to move an
    /// existing association onto the new network.
    pub fn set_provision(&mut self, network: NetworkDescriptor, timers: &mut dyn TimerService) {
        info!("WiFi station provisioned: {:?}", network);
        self.provision = Some(network);
        self.last_connect_fail_ms = None;
        timers.cancel(TimerPurpose::StationReconnect);
    }

    /// Forget the provisioned network unconditionally.
    ///
    /// A connected station is disconnected by the next [`drive`](Self::drive).
    pub fn forget_provision(&mut self, timers: &mut dyn TimerService) {
        if self.provision.take().is_some() {
            info!("WiFi station provision cleared");
        }
        self.last_connect_fail_ms = None;
        timers.cancel(TimerPurpose::StationReconnect);
    }

    /// Clear the provision on behalf of the application.
    ///
    /// Refused with `NotAllowed` while a connection is being made or held.
    pub fn clear_provision(&mut self, timers: &mut dyn TimerService) -> Result<(), ConnectivityError> {
        self.check_clear_provision()?;
        self.forget_provision(timers);
        Ok(())
    }

    /// `NotAllowed` while a connection is being made or held.
    pub fn check_clear_provision(&self) -> Result<(), ConnectivityError> {
        if matches!(
            self.state,
            StationState::Connecting | StationState::ConnectSucceeded | StationState::Connected
        ) {
            return Err(ConnectivityError::NotAllowed);
        }
        Ok(())
    }

    /// Drop an association so the next attempt uses the current provision.
    pub fn force_reconnect(&mut self, driver: &mut dyn WifiDriver) -> Option<StationTransition> {
        if !self.is_enabled()
            || !matches!(self.state, StationState::Connecting | StationState::Connected)
        {
            return None;
        }
        match driver.disconnect() {
            Ok(()) => Some(self.change_state(StationState::Disconnecting)),
            Err(e) => {
                warn!("WiFi station disconnect failed: {}", e);
                None
            }
        }
    }

    /// Advance the machine by at most one transition.
    ///
    /// `scan_in_progress` defers connect attempts while the radio is scanning.
    pub fn drive(
        &mut self,
        driver: &mut dyn WifiDriver,
        timers: &mut dyn TimerService,
        now_ms: u64,
        scan_in_progress: bool,
    ) -> Option<StationTransition> {
        // Connect outcomes resolve in every mode
        match self.state {
            StationState::ConnectSucceeded => {
                self.last_connect_fail_ms = None;
                timers.cancel(TimerPurpose::StationReconnect);
                return Some(self.change_state(StationState::Connected));
            }
            StationState::ConnectFailed => {
                self.record_connect_failure(timers, now_ms);
                return Some(self.change_state(StationState::NotConnected));
            }
            _ => {}
        }

        match self.mode {
            StationMode::NotSupported | StationMode::ApplicationControlled => None,
            StationMode::Disabled => self.drive_disabled(driver),
            StationMode::Enabled => self.drive_enabled(driver, timers, now_ms, scan_in_progress),
        }
    }

    fn drive_disabled(&mut self, driver: &mut dyn WifiDriver) -> Option<StationTransition> {
        match self.state {
            StationState::Enabling
            | StationState::NotConnected
            | StationState::Connecting
            | StationState::Connected => match driver.stop_station() {
                Ok(()) => {
                    self.stop_pending = true;
                    Some(self.change_state(StationState::Disconnecting))
                }
                Err(e) => {
                    warn!("WiFi station stop failed: {}", e);
                    None
                }
            },
            _ => None,
        }
    }

    fn drive_enabled(
        &mut self,
        driver: &mut dyn WifiDriver,
        timers: &mut dyn TimerService,
        now_ms: u64,
        scan_in_progress: bool,
    ) -> Option<StationTransition> {
        match self.state {
            StationState::Disabled => match driver.start_station() {
                Ok(()) => Some(self.change_state(StationState::Enabling)),
                Err(e) => {
                    warn!("WiFi station start failed: {}", e);
                    None
                }
            },
            StationState::NotConnected => {
                let network = self.provision.as_ref()?;
                if scan_in_progress {
                    debug!("WiFi station connect deferred: scan in progress");
                    return None;
                }
                if let Some(failed_at) = self.last_connect_fail_ms {
                    let elapsed = now_ms.saturating_sub(failed_at);
                    let interval = u64::from(self.reconnect_interval_ms);
                    if elapsed < interval {
                        timers.arm(
                            TimerPurpose::StationReconnect,
                            Duration::from_millis(interval - elapsed),
                        );
                        return None;
                    }
                }

                timers.cancel(TimerPurpose::StationReconnect);
                info!("WiFi station connecting to {}", network.ssid);
                match driver.connect(network) {
                    Ok(()) => Some(self.change_state(StationState::Connecting)),
                    Err(e) => {
                        warn!("WiFi station connect failed: {}", e);
                        self.record_connect_failure(timers, now_ms);
                        None
                    }
                }
            }
            StationState::Connected if self.provision.is_none() => match driver.disconnect() {
                Ok(()) => Some(self.change_state(StationState::Disconnecting)),
                Err(e) => {
                    warn!("WiFi station disconnect failed: {}", e);
                    None
                }
            },
            _ => None,
        }
    }

    /// The reconnect backoff has expired.
    pub fn on_reconnect_timer(&mut self) {
        debug!("WiFi station reconnect interval expired");
        self.last_connect_fail_ms = None;
    }

    /// Driver: station interface is up.
    pub fn on_started(&mut self) -> Option<StationTransition> {
        match self.state {
            StationState::Disabled | StationState::Enabling => {
                Some(self.change_state(StationState::NotConnected))
            }
            _ => {
                debug!("WiFi station start event ignored in state {}", self.state);
                None
            }
        }
    }

    /// Driver: station interface is down.
    pub fn on_stopped(&mut self) -> Option<StationTransition> {
        self.stop_pending = false;
        if self.state == StationState::Disabled {
            return None;
        }
        Some(self.change_state(StationState::Disabled))
    }

    /// Driver: association and authentication succeeded.
    pub fn on_connected(&mut self) -> Option<StationTransition> {
        match self.state {
            StationState::Connecting | StationState::NotConnected => {
                Some(self.change_state(StationState::ConnectSucceeded))
            }
            _ => {
                debug!("WiFi station connect event ignored in state {}", self.state);
                None
            }
        }
    }

    /// Driver: association lost or attempt rejected.
    pub fn on_disconnected(&mut self) -> Option<StationTransition> {
        match self.state {
            StationState::Connecting => Some(self.change_state(StationState::ConnectFailed)),
            StationState::Connected | StationState::ConnectSucceeded => {
                Some(self.change_state(StationState::NotConnected))
            }
            StationState::Disconnecting if !self.stop_pending => {
                Some(self.change_state(StationState::NotConnected))
            }
            _ => {
                debug!("WiFi station disconnect event ignored in state {}", self.state);
                None
            }
        }
    }

    fn record_connect_failure(&mut self, timers: &mut dyn TimerService, now_ms: u64) {
        self.last_connect_fail_ms = Some(now_ms);
        if self.is_enabled() {
            timers.arm(
                TimerPurpose::StationReconnect,
                Duration::from_millis(self.reconnect_interval_ms.into()),
            );
        }
    }

    fn change_state(&mut self, to: StationState) -> StationTransition {
        let from = self.state;
        info!("WiFi station state change: {} -> {}", from, to);
        self.state = to;
        (from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityMode;
    use crate::driver::{CommandLog, DriverCommand, RecordingDriver};
    use crate::error::DriverOp;
    use crate::timer::{Clock, ManualClock, ManualTimers};

    struct Rig {
        station: Station,
        driver: RecordingDriver,
        log: CommandLog,
        clock: ManualClock,
        timers: ManualTimers,
    }

    impl Rig {
        fn new(mode: StationMode, provisioned: bool) -> Self {
            let log = CommandLog::new();
            let clock = ManualClock::new();
            let provision = provisioned.then(|| {
                NetworkDescriptor::new("HomeNet", SecurityMode::Wpa2Personal, "password123")
                    .unwrap()
            });
            Self {
                station: Station::new(mode, 5_000, provision),
                driver: RecordingDriver::new(log.clone()),
                log,
                timers: ManualTimers::new(clock.clone()),
                clock,
            }
        }

        fn drive(&mut self) -> Option<StationTransition> {
            let now = self.clock.now_ms();
            self.station
                .drive(&mut self.driver, &mut self.timers, now, false)
        }

        /// Drive until the machine waits on the driver.
        fn settle(&mut self) {
            while self.drive().is_some() {}
        }

        fn bring_to_not_connected(&mut self) {
            self.settle();
            self.station.on_started();
        }
    }

    // ==================== Mode Tests ====================

    #[test]
    fn test_mode_strings() {
        for mode in [
            StationMode::NotSupported,
            StationMode::ApplicationControlled,
            StationMode::Disabled,
            StationMode::Enabled,
        ] {
            assert_eq!(mode.to_string().parse::<StationMode>(), Ok(mode));
        }
        assert!("on".parse::<StationMode>().is_err());
        assert_eq!(StationState::NotConnected.to_string(), "not-connected");
    }

    #[test]
    fn test_not_supported_is_sticky() {
        let mut rig = Rig::new(StationMode::NotSupported, false);
        let result = rig.station.set_mode(StationMode::Enabled, &mut rig.timers);
        assert_eq!(result, Err(ConnectivityError::InvalidState));

        let mut rig = Rig::new(StationMode::Disabled, false);
        let result = rig.station.set_mode(StationMode::NotSupported, &mut rig.timers);
        assert_eq!(result, Err(ConnectivityError::InvalidState));
    }

    #[test]
    fn test_set_same_mode_is_noop() {
        let mut rig = Rig::new(StationMode::Enabled, false);
        assert_eq!(
            rig.station.set_mode(StationMode::Enabled, &mut rig.timers),
            Ok(false)
        );
    }

    #[test]
    fn test_zero_reconnect_interval_rejected() {
        let mut rig = Rig::new(StationMode::Enabled, false);
        assert!(matches!(
            rig.station.set_reconnect_interval_ms(0),
            Err(ConnectivityError::InvalidConfiguration(_))
        ));
        assert!(rig.station.set_reconnect_interval_ms(2_000).is_ok());
        assert_eq!(rig.station.reconnect_interval_ms(), 2_000);
    }

    // ==================== Lifecycle Tests ====================

    #[test]
    fn test_enable_connect_sequence() {
        let mut rig = Rig::new(StationMode::Enabled, true);

        assert_eq!(
            rig.drive(),
            Some((StationState::Disabled, StationState::Enabling))
        );
        assert_eq!(rig.drive(), None);

        rig.station.on_started();
        assert_eq!(
            rig.drive(),
            Some((StationState::NotConnected, StationState::Connecting))
        );

        rig.station.on_connected();
        assert_eq!(rig.station.state(), StationState::ConnectSucceeded);
        assert_eq!(
            rig.drive(),
            Some((StationState::ConnectSucceeded, StationState::Connected))
        );
        assert!(rig.station.is_connected());

        assert_eq!(
            rig.log.commands(),
            vec![
                DriverCommand::StartStation,
                DriverCommand::Connect("HomeNet".to_string())
            ]
        );
    }

    #[test]
    fn test_unprovisioned_station_waits() {
        let mut rig = Rig::new(StationMode::Enabled, false);
        rig.bring_to_not_connected();
        assert_eq!(rig.drive(), None);
        assert_eq!(rig.log.count(DriverOp::Connect), 0);
    }

    #[test]
    fn test_application_controlled_issues_nothing() {
        let mut rig = Rig::new(StationMode::ApplicationControlled, true);
        assert_eq!(rig.drive(), None);

        // Observes the application's radio activity
        rig.station.on_started();
        rig.station.on_connected();
        rig.drive();
        assert!(rig.station.is_connected());
        assert!(rig.log.commands().is_empty());
    }

    #[test]
    fn test_disable_while_connected() {
        let mut rig = Rig::new(StationMode::Enabled, true);
        rig.bring_to_not_connected();
        rig.drive();
        rig.station.on_connected();
        rig.drive();

        rig.station
            .set_mode(StationMode::Disabled, &mut rig.timers)
            .unwrap();
        assert_eq!(
            rig.drive(),
            Some((StationState::Connected, StationState::Disconnecting))
        );

        // The disconnect that accompanies a stop does not reopen the machine
        assert_eq!(rig.station.on_disconnected(), None);
        assert_eq!(
            rig.station.on_stopped(),
            Some((StationState::Disconnecting, StationState::Disabled))
        );
        assert_eq!(rig.log.count(DriverOp::StopStation), 1);
    }

    #[test]
    fn test_link_loss_returns_to_not_connected() {
        let mut rig = Rig::new(StationMode::Enabled, true);
        rig.bring_to_not_connected();
        rig.drive();
        rig.station.on_connected();
        rig.drive();

        assert_eq!(
            rig.station.on_disconnected(),
            Some((StationState::Connected, StationState::NotConnected))
        );
        // Link loss is not a connect failure: reconnect immediately
        assert_eq!(
            rig.drive(),
            Some((StationState::NotConnected, StationState::Connecting))
        );
    }

    #[test]
    fn test_connected_without_provision_disconnects() {
        let mut rig = Rig::new(StationMode::Enabled, true);
        rig.bring_to_not_connected();
        rig.drive();
        rig.station.on_connected();
        rig.drive();

        rig.station.forget_provision(&mut rig.timers);
        assert_eq!(
            rig.drive(),
            Some((StationState::Connected, StationState::Disconnecting))
        );
        assert_eq!(
            rig.station.on_disconnected(),
            Some((StationState::Disconnecting, StationState::NotConnected))
        );
        assert_eq!(rig.drive(), None);
    }

    // ==================== Backoff Tests ====================

    #[test]
    fn test_connect_failure_arms_backoff() {
        let mut rig = Rig::new(StationMode::Enabled, true);
        rig.bring_to_not_connected();
        rig.drive();

        rig.clock.set(1_000);
        rig.station.on_disconnected();
        assert_eq!(rig.station.state(), StationState::ConnectFailed);
        assert_eq!(
            rig.drive(),
            Some((StationState::ConnectFailed, StationState::NotConnected))
        );
        assert_eq!(rig.station.last_connect_fail_ms(), Some(1_000));
        assert_eq!(rig.timers.deadline(TimerPurpose::StationReconnect), Some(6_000));

        // No attempt inside the window
        rig.clock.advance(4_999);
        assert_eq!(rig.drive(), None);
        assert_eq!(rig.log.count(DriverOp::Connect), 1);
        // Re-arming keeps a single deadline
        assert_eq!(rig.timers.deadline(TimerPurpose::StationReconnect), Some(6_000));

        rig.clock.advance(1);
        assert_eq!(rig.timers.take_due(), vec![TimerPurpose::StationReconnect]);
        rig.station.on_reconnect_timer();
        assert_eq!(
            rig.drive(),
            Some((StationState::NotConnected, StationState::Connecting))
        );
        assert_eq!(rig.log.count(DriverOp::Connect), 2);
    }

    #[test]
    fn test_synchronous_connect_error_uses_backoff() {
        let mut rig = Rig::new(StationMode::Enabled, true);
        rig.bring_to_not_connected();
        rig.log.fail(DriverOp::Connect, -1);

        assert_eq!(rig.drive(), None);
        assert_eq!(rig.station.state(), StationState::NotConnected);
        assert!(rig.timers.is_armed(TimerPurpose::StationReconnect));
        assert_eq!(rig.drive(), None);
        assert_eq!(rig.log.count(DriverOp::Connect), 1);
    }

    #[test]
    fn test_leaving_enabled_cancels_backoff() {
        let mut rig = Rig::new(StationMode::Enabled, true);
        rig.bring_to_not_connected();
        rig.drive();
        rig.station.on_disconnected();
        rig.drive();
        assert!(rig.timers.is_armed(TimerPurpose::StationReconnect));

        rig.station
            .set_mode(StationMode::ApplicationControlled, &mut rig.timers)
            .unwrap();
        assert!(!rig.timers.is_armed(TimerPurpose::StationReconnect));
        assert_eq!(rig.station.last_connect_fail_ms(), None);
    }

    #[test]
    fn test_scan_defers_connect() {
        let mut rig = Rig::new(StationMode::Enabled, true);
        rig.bring_to_not_connected();
        let now = rig.clock.now_ms();
        assert_eq!(
            rig.station.drive(&mut rig.driver, &mut rig.timers, now, true),
            None
        );
        assert_eq!(rig.log.count(DriverOp::Connect), 0);
    }

    // ==================== Provision Tests ====================

    #[test]
    fn test_clear_provision_refused_while_connected() {
        let mut rig = Rig::new(StationMode::Enabled, true);
        rig.bring_to_not_connected();
        rig.drive();
        assert_eq!(
            rig.station.clear_provision(&mut rig.timers),
            Err(ConnectivityError::NotAllowed)
        );
        rig.station.on_connected();
        rig.drive();
        assert_eq!(
            rig.station.clear_provision(&mut rig.timers),
            Err(ConnectivityError::NotAllowed)
        );
    }

    #[test]
    fn test_clear_provision_when_idle() {
        let mut rig = Rig::new(StationMode::Enabled, true);
        rig.bring_to_not_connected();
        rig.log.fail(DriverOp::Connect, -1);
        rig.drive();

        assert!(rig.station.clear_provision(&mut rig.timers).is_ok());
        assert!(!rig.station.is_provisioned());
        assert_eq!(rig.station.network_id(), None);
        assert!(!rig.timers.is_armed(TimerPurpose::StationReconnect));
    }

    #[test]
    fn test_new_provision_skips_backoff() {
        let mut rig = Rig::new(StationMode::Enabled, true);
        rig.bring_to_not_connected();
        rig.drive();
        rig.station.on_disconnected();
        rig.drive();

        let other = NetworkDescriptor::open("Cafe").unwrap();
        rig.station.set_provision(other, &mut rig.timers);
        assert_eq!(
            rig.drive(),
            Some((StationState::NotConnected, StationState::Connecting))
        );
        assert_eq!(
            rig.log.commands().last(),
            Some(&DriverCommand::Connect("Cafe".to_string()))
        );
    }

    #[test]
    fn test_force_reconnect() {
        let mut rig = Rig::new(StationMode::Enabled, true);
        rig.bring_to_not_connected();
        rig.drive();
        rig.station.on_connected();
        rig.drive();

        assert_eq!(
            rig.station.force_reconnect(&mut rig.driver),
            Some((StationState::Connected, StationState::Disconnecting))
        );
        rig.station.on_disconnected();
        assert_eq!(rig.station.state(), StationState::NotConnected);
    }
}
