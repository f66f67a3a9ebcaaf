//! WiFi access point state machine.
//!
//! ```text
//! NotActive -> Activating -> Active -> Deactivating -> NotActive
//! ```
//!
//! In the on-demand modes the AP stays up while a demand is fresh (younger
//! than the idle timeout) or a client is associated. The
//! `OnDemandNoStationProvision` variant also stays up while the station has
//! no provisioned network. A failed activation is not retried until the next
//! demand or mode change.

use crate::config::ConfigError;
use crate::driver::WifiDriver;
use crate::error::{ConnectivityError, DriverError};
use crate::timer::{TimerPurpose, TimerService};
use log::{debug, info, warn};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Who controls the AP interface, and when it should be up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApMode {
    NotSupported,
    ApplicationControlled,
    Disabled,
    Enabled,
    OnDemand,
    OnDemandNoStationProvision,
}

impl ApMode {
    pub fn is_on_demand(&self) -> bool {
        matches!(self, Self::OnDemand | Self::OnDemandNoStationProvision)
    }
}

impl fmt::Display for ApMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotSupported => "not-supported",
            Self::ApplicationControlled => "application-controlled",
            Self::Disabled => "disabled",
            Self::Enabled => "enabled",
            Self::OnDemand => "on-demand",
            Self::OnDemandNoStationProvision => "on-demand-no-station-provision",
        })
    }
}

impl FromStr for ApMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "not-supported" => Self::NotSupported,
            "application-controlled" => Self::ApplicationControlled,
            "disabled" => Self::Disabled,
            "enabled" => Self::Enabled,
            "on-demand" => Self::OnDemand,
            "on-demand-no-station-provision" => Self::OnDemandNoStationProvision,
            other => return Err(ConfigError::UnknownValue(other.to_string())),
        })
    }
}

/// AP interface lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApState {
    NotActive,
    Activating,
    Active,
    Deactivating,
}

impl fmt::Display for ApState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotActive => "not-active",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Deactivating => "deactivating",
        })
    }
}

/// A `(from, to)` state change.
pub type ApTransition = (ApState, ApState);

/// WiFi AP state machine.
#[derive(Debug)]
pub struct AccessPoint {
    mode: ApMode,
    state: ApState,
    idle_timeout_ms: u32,
    last_demand_ms: Option<u64>,
    /// Set by `stop_on_demand`, cleared by the next demand.
    suppressed: bool,
    /// Set when activation fails, cleared by the next demand or mode change.
    start_blocked: bool,
    clients: u32,
}

impl AccessPoint {
    pub fn new(mode: ApMode, idle_timeout_ms: u32) -> Self {
        Self {
            mode,
            state: ApState::NotActive,
            idle_timeout_ms,
            last_demand_ms: None,
            suppressed: false,
            start_blocked: false,
            clients: 0,
        }
    }

    pub fn mode(&self) -> ApMode {
        self.mode
    }

    pub fn state(&self) -> ApState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ApState::Active
    }

    pub fn is_application_controlled(&self) -> bool {
        self.mode == ApMode::ApplicationControlled
    }

    pub fn idle_timeout_ms(&self) -> u32 {
        self.idle_timeout_ms
    }

    pub fn last_demand_ms(&self) -> Option<u64> {
        self.last_demand_ms
    }

    /// Number of associated clients.
    pub fn clients(&self) -> u32 {
        self.clients
    }

    pub fn set_idle_timeout_ms(&mut self, ms: u32) -> Result<(), ConnectivityError> {
        if ms == 0 {
            return Err(ConfigError::InvalidSetting("AP idle timeout must be > 0").into());
        }
        self.idle_timeout_ms = ms;
        Ok(())
    }

    /// Change the AP mode. Returns `true` if the mode changed.
    pub fn set_mode(
        &mut self,
        mode: ApMode,
        timers: &mut dyn TimerService,
    ) -> Result<bool, ConnectivityError> {
        if mode == self.mode {
            return Ok(false);
        }
        if mode == ApMode::NotSupported || self.mode == ApMode::NotSupported {
            return Err(ConnectivityError::InvalidState);
        }

        info!("WiFi AP mode change: {} -> {}", self.mode, mode);
        self.mode = mode;
        self.last_demand_ms = None;
        self.suppressed = false;
        self.start_blocked = false;
        timers.cancel(TimerPurpose::ApIdle);
        Ok(true)
    }

    /// Record a demand for the on-demand AP.
    pub fn demand_start(&mut self, now_ms: u64) -> Result<(), ConnectivityError> {
        if !self.mode.is_on_demand() {
            return Err(ConnectivityError::InvalidState);
        }
        debug!("WiFi AP demand at {} ms", now_ms);
        self.last_demand_ms = Some(now_ms);
        self.suppressed = false;
        self.start_blocked = false;
        Ok(())
    }

    /// Take an on-demand AP down regardless of the idle timer.
    pub fn stop_on_demand(&mut self, timers: &mut dyn TimerService) {
        if !self.mode.is_on_demand() {
            debug!("WiFi AP stop-on-demand ignored in mode {}", self.mode);
            return;
        }
        self.suppressed = true;
        self.last_demand_ms = None;
        timers.cancel(TimerPurpose::ApIdle);
    }

    fn demand_fresh(&self, now_ms: u64) -> bool {
        self.last_demand_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < u64::from(self.idle_timeout_ms))
    }

    /// Whether the AP should be up right now.
    pub fn wants_active(&self, now_ms: u64, station_provisioned: bool) -> bool {
        if self.start_blocked {
            return false;
        }
        match self.mode {
            ApMode::Enabled => true,
            ApMode::OnDemand => {
                !self.suppressed && (self.clients > 0 || self.demand_fresh(now_ms))
            }
            ApMode::OnDemandNoStationProvision => {
                !self.suppressed
                    && (self.clients > 0 || self.demand_fresh(now_ms) || !station_provisioned)
            }
            _ => false,
        }
    }

    /// Advance the machine by at most one transition.
    ///
    /// A failed start command is returned so the caller can report it.
    pub fn drive(
        &mut self,
        driver: &mut dyn WifiDriver,
        timers: &mut dyn TimerService,
        now_ms: u64,
        station_provisioned: bool,
    ) -> Result<Option<ApTransition>, DriverError> {
        if matches!(self.mode, ApMode::NotSupported | ApMode::ApplicationControlled) {
            return Ok(None);
        }

        let wanted = self.wants_active(now_ms, station_provisioned);
        match self.state {
            ApState::NotActive if wanted => match driver.start_ap() {
                Ok(()) => Ok(Some(self.change_state(ApState::Activating))),
                Err(e) => {
                    warn!("WiFi AP start failed: {}", e);
                    self.start_blocked = true;
                    Err(e)
                }
            },
            ApState::Activating | ApState::Active if !wanted => {
                timers.cancel(TimerPurpose::ApIdle);
                match driver.stop_ap() {
                    Ok(()) => Ok(Some(self.change_state(ApState::Deactivating))),
                    Err(e) => {
                        warn!("WiFi AP stop failed: {}", e);
                        Ok(None)
                    }
                }
            }
            ApState::Active if self.mode.is_on_demand() => {
                self.schedule_idle_check(timers, now_ms);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Keep the idle timer pointed at the moment the current demand expires.
    fn schedule_idle_check(&self, timers: &mut dyn TimerService, now_ms: u64) {
        match self.last_demand_ms {
            Some(t) if self.clients == 0 && self.demand_fresh(now_ms) => {
                let expires = t + u64::from(self.idle_timeout_ms);
                timers.arm(
                    TimerPurpose::ApIdle,
                    Duration::from_millis(expires - now_ms),
                );
            }
            _ => timers.cancel(TimerPurpose::ApIdle),
        }
    }

    /// Driver: AP interface is up.
    pub fn on_started(&mut self) -> Option<ApTransition> {
        match self.state {
            ApState::Activating | ApState::NotActive => Some(self.change_state(ApState::Active)),
            _ => {
                debug!("WiFi AP start event ignored in state {}", self.state);
                None
            }
        }
    }

    /// Driver: AP interface is down.
    pub fn on_stopped(&mut self) -> Option<ApTransition> {
        self.clients = 0;
        if self.state == ApState::NotActive {
            return None;
        }
        Some(self.change_state(ApState::NotActive))
    }

    /// Driver: activation failed after the start command was accepted.
    pub fn on_start_failed(&mut self) -> Option<ApTransition> {
        self.start_blocked = true;
        if self.state == ApState::NotActive {
            return None;
        }
        Some(self.change_state(ApState::NotActive))
    }

    pub fn on_client_associated(&mut self) {
        if !matches!(self.state, ApState::Activating | ApState::Active) {
            debug!("WiFi AP client association ignored in state {}", self.state);
            return;
        }
        self.clients = self.clients.saturating_add(1);
        debug!("WiFi AP client associated ({} total)", self.clients);
    }

    /// The idle window restarts when the last client leaves.
    pub fn on_client_disassociated(&mut self, now_ms: u64) {
        self.clients = self.clients.saturating_sub(1);
        debug!("WiFi AP client disassociated ({} remaining)", self.clients);
        if self.clients == 0 && self.mode.is_on_demand() && !self.suppressed {
            self.last_demand_ms = Some(now_ms);
        }
    }

    fn change_state(&mut self, to: ApState) -> ApTransition {
        let from = self.state;
        info!("WiFi AP state change: {} -> {}", from, to);
        self.state = to;
        (from, to)
    }
}
