//! Network provisioning delegate.
//!
//! Serializes scan and connectivity-test requests against station activity:
//!
//! ```text
//! Idle -> ScanPending -> ScanInProgress -> Idle
//! Idle -> TestConnectivityWaitConnectivity -> Idle
//! ```
//!
//! Handlers return as soon as intent is recorded. Completion is reported
//! through [`StationControl::notify`] when a later event or timer resolves it.
//! The delegate reaches the rest of the manager only through
//! [`StationControl`].

use crate::config::{ConfigError, NetworkDescriptor, NetworkType, STATION_NETWORK_ID};
use crate::driver::ScanResult;
use crate::error::{ConnectivityError, DriverError};
use crate::event::Notification;
use crate::station::{StationMode, StationState};
use crate::timer::TimerPurpose;
use log::{debug, info, warn};
use std::fmt;
use std::time::Duration;

/// Rendezvous mode bit: bring up the WiFi rendezvous network (the AP).
pub const RENDEZVOUS_MODE_WIFI_NETWORK: u16 = 0x0001;

/// A provisioned network and its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedNetwork {
    pub id: u32,
    pub network: NetworkDescriptor,
}

/// Delegate sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    Idle,
    ScanPending,
    ScanInProgress,
    TestConnectivityWaitConnectivity,
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::ScanPending => "scan-pending",
            Self::ScanInProgress => "scan-in-progress",
            Self::TestConnectivityWaitConnectivity => "test-connectivity-wait",
        })
    }
}

/// What the delegate may ask of the manager.
pub trait StationControl {
    fn station_mode(&self) -> StationMode;
    fn station_state(&self) -> StationState;
    fn ap_application_controlled(&self) -> bool;
    fn provision(&self) -> Option<&NetworkDescriptor>;
    /// IPv4 or IPv6 internet reachability as of the last aggregation.
    fn have_internet(&self) -> bool;

    fn start_scan(&mut self) -> Result<(), DriverError>;
    fn arm_timer(&mut self, purpose: TimerPurpose, after: Duration);
    fn cancel_timer(&mut self, purpose: TimerPurpose);

    /// Persist `network` and make it the station provision.
    fn store_provision(&mut self, network: NetworkDescriptor) -> Result<(), ConnectivityError>;
    /// Remove the persisted provision and forget it.
    fn remove_provision(&mut self) -> Result<(), ConnectivityError>;
    fn set_station_mode(&mut self, mode: StationMode) -> Result<(), ConnectivityError>;
    fn demand_start_ap(&mut self) -> Result<(), ConnectivityError>;
    fn stop_on_demand_ap(&mut self);

    fn notify(&mut self, notification: Notification);
}

/// Network provisioning delegate.
#[derive(Debug)]
pub struct ProvisioningDelegate {
    state: ProvisioningState,
    scan_timeout: Duration,
    test_timeout: Duration,
    rendezvous_mode: u16,
}

impl ProvisioningDelegate {
    pub fn new(scan_timeout: Duration, test_timeout: Duration) -> Self {
        Self {
            state: ProvisioningState::Idle,
            scan_timeout,
            test_timeout,
            rendezvous_mode: 0,
        }
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    pub fn scan_in_progress(&self) -> bool {
        self.state == ProvisioningState::ScanInProgress
    }

    pub fn awaiting_connectivity(&self) -> bool {
        self.state == ProvisioningState::TestConnectivityWaitConnectivity
    }

    pub fn rendezvous_mode(&self) -> u16 {
        self.rendezvous_mode
    }

    fn change_state(&mut self, to: ProvisioningState) {
        if self.state != to {
            info!("Provisioning state change: {} -> {}", self.state, to);
            self.state = to;
        }
    }

    /// `NotAllowed` while the relevant surface is application-controlled.
    fn reject_if_application_controlled(
        ctl: &dyn StationControl,
        station: bool,
    ) -> Result<(), ConnectivityError> {
        let controlled = if station {
            ctl.station_mode() == StationMode::ApplicationControlled
        } else {
            ctl.ap_application_controlled()
        };
        if controlled {
            warn!(
                "Provisioning request rejected: WiFi {} is application-controlled",
                if station { "station" } else { "AP" }
            );
            return Err(ConnectivityError::NotAllowed);
        }
        Ok(())
    }

    fn require_wifi(network_type: NetworkType) -> Result<(), ConnectivityError> {
        if network_type != NetworkType::WiFi {
            return Err(ConfigError::UnsupportedNetworkType(network_type).into());
        }
        Ok(())
    }

    fn require_known_id(ctl: &dyn StationControl, network_id: u32) -> Result<(), ConnectivityError> {
        if network_id != STATION_NETWORK_ID || ctl.provision().is_none() {
            return Err(ConfigError::UnknownNetworkId(network_id).into());
        }
        Ok(())
    }

    // ==================== Scan ====================

    pub fn handle_scan_networks(
        &mut self,
        ctl: &mut dyn StationControl,
        network_type: NetworkType,
    ) -> Result<(), ConnectivityError> {
        Self::require_wifi(network_type)?;
        Self::reject_if_application_controlled(ctl, true)?;
        if self.state != ProvisioningState::Idle {
            return Err(ConnectivityError::Busy);
        }
        if matches!(
            ctl.station_mode(),
            StationMode::Disabled | StationMode::NotSupported
        ) {
            return Err(ConnectivityError::InvalidState);
        }

        ctl.arm_timer(TimerPurpose::ScanTimeout, self.scan_timeout);
        if Self::station_settled(ctl.station_state()) {
            if let Err(e) = ctl.start_scan() {
                ctl.cancel_timer(TimerPurpose::ScanTimeout);
                return Err(e.into());
            }
            self.change_state(ProvisioningState::ScanInProgress);
        } else {
            debug!("Scan deferred: station {}", ctl.station_state());
            self.change_state(ProvisioningState::ScanPending);
        }
        Ok(())
    }

    /// The radio is free to scan in these station states.
    fn station_settled(state: StationState) -> bool {
        matches!(state, StationState::NotConnected | StationState::Connected)
    }

    /// The station changed state; a deferred scan may start now.
    ///
    /// A connectivity test fails early with `InvalidState` once the station
    /// is taken out of `Enabled`.
    pub fn notify_station_state_changed(&mut self, ctl: &mut dyn StationControl) {
        if self.state == ProvisioningState::TestConnectivityWaitConnectivity {
            if ctl.station_mode() != StationMode::Enabled {
                warn!("Connectivity test abandoned: station {}", ctl.station_mode());
                ctl.cancel_timer(TimerPurpose::ConnectivityTestTimeout);
                self.change_state(ProvisioningState::Idle);
                ctl.notify(Notification::TestConnectivityComplete(Err(
                    ConnectivityError::InvalidState,
                )));
            }
            return;
        }
        if self.state != ProvisioningState::ScanPending {
            return;
        }
        if matches!(
            ctl.station_mode(),
            StationMode::Disabled | StationMode::NotSupported
        ) {
            self.finish_scan(ctl, Notification::ScanFailed(ConnectivityError::InvalidState));
            return;
        }
        if Self::station_settled(ctl.station_state()) {
            self.start_pending_scan(ctl);
        }
    }

    fn start_pending_scan(&mut self, ctl: &mut dyn StationControl) {
        match ctl.start_scan() {
            Ok(()) => self.change_state(ProvisioningState::ScanInProgress),
            Err(e) => {
                warn!("Deferred scan failed to start: {}", e);
                self.finish_scan(ctl, Notification::ScanFailed(e.into()));
            }
        }
    }

    fn finish_scan(&mut self, ctl: &mut dyn StationControl, outcome: Notification) {
        ctl.cancel_timer(TimerPurpose::ScanTimeout);
        self.change_state(ProvisioningState::Idle);
        ctl.notify(outcome);
    }

    pub fn handle_scan_done(&mut self, ctl: &mut dyn StationControl, results: Vec<ScanResult>) {
        if self.state != ProvisioningState::ScanInProgress {
            debug!("Scan results ignored in state {}", self.state);
            return;
        }
        info!("Scan complete: {} networks", results.len());
        self.finish_scan(ctl, Notification::ScanComplete(results));
    }

    pub fn handle_scan_failed(&mut self, ctl: &mut dyn StationControl, error: DriverError) {
        if self.state != ProvisioningState::ScanInProgress {
            debug!("Scan failure ignored in state {}", self.state);
            return;
        }
        warn!("Scan failed: {}", error);
        self.finish_scan(ctl, Notification::ScanFailed(error.into()));
    }

    pub fn on_scan_timeout(&mut self, ctl: &mut dyn StationControl) {
        if !matches!(
            self.state,
            ProvisioningState::ScanPending | ProvisioningState::ScanInProgress
        ) {
            return;
        }
        warn!("Scan timed out in state {}", self.state);
        self.finish_scan(ctl, Notification::ScanFailed(ConnectivityError::Timeout));
    }

    // ==================== Network Configuration ====================

    pub fn handle_add_network(
        &mut self,
        ctl: &mut dyn StationControl,
        network_type: NetworkType,
        network: NetworkDescriptor,
    ) -> Result<u32, ConnectivityError> {
        Self::require_wifi(network_type)?;
        Self::reject_if_application_controlled(ctl, true)?;
        network.validate()?;
        if ctl.provision().is_some() {
            return Err(ConnectivityError::InvalidState);
        }
        ctl.store_provision(network)?;
        Ok(STATION_NETWORK_ID)
    }

    /// Replace the provisioned network.
    ///
    /// An update without a password keeps the stored one when the security
    /// mode is unchanged.
    pub fn handle_update_network(
        &mut self,
        ctl: &mut dyn StationControl,
        network_id: u32,
        network: NetworkDescriptor,
    ) -> Result<(), ConnectivityError> {
        Self::reject_if_application_controlled(ctl, true)?;
        Self::require_known_id(ctl, network_id)?;

        let network = match ctl.provision() {
            Some(current)
                if network.password().is_empty()
                    && !network.is_open()
                    && current.security == network.security =>
            {
                NetworkDescriptor::unchecked(network.ssid, network.security, current.password())
            }
            _ => network,
        };
        network.validate()?;
        ctl.store_provision(network)
    }

    pub fn handle_remove_network(
        &mut self,
        ctl: &mut dyn StationControl,
        network_id: u32,
    ) -> Result<(), ConnectivityError> {
        Self::reject_if_application_controlled(ctl, true)?;
        Self::require_known_id(ctl, network_id)?;
        ctl.remove_provision()
    }

    pub fn handle_get_networks(
        &self,
        ctl: &dyn StationControl,
        include_credentials: bool,
    ) -> Vec<ProvisionedNetwork> {
        ctl.provision()
            .map(|network| ProvisionedNetwork {
                id: STATION_NETWORK_ID,
                network: if include_credentials {
                    network.clone()
                } else {
                    network.without_credentials()
                },
            })
            .into_iter()
            .collect()
    }

    pub fn handle_enable_network(
        &mut self,
        ctl: &mut dyn StationControl,
        network_id: u32,
    ) -> Result<(), ConnectivityError> {
        Self::reject_if_application_controlled(ctl, true)?;
        Self::require_known_id(ctl, network_id)?;
        ctl.set_station_mode(StationMode::Enabled)
    }

    pub fn handle_disable_network(
        &mut self,
        ctl: &mut dyn StationControl,
        network_id: u32,
    ) -> Result<(), ConnectivityError> {
        Self::reject_if_application_controlled(ctl, true)?;
        Self::require_known_id(ctl, network_id)?;
        ctl.set_station_mode(StationMode::Disabled)
    }

    // ==================== Connectivity Test ====================

    /// Enable the station and wait for internet reachability.
    pub fn handle_test_connectivity(
        &mut self,
        ctl: &mut dyn StationControl,
        network_id: u32,
    ) -> Result<(), ConnectivityError> {
        Self::reject_if_application_controlled(ctl, true)?;
        Self::require_known_id(ctl, network_id)?;
        if self.state != ProvisioningState::Idle {
            return Err(ConnectivityError::Busy);
        }

        ctl.set_station_mode(StationMode::Enabled)?;
        if ctl.have_internet() {
            ctl.notify(Notification::TestConnectivityComplete(Ok(())));
            return Ok(());
        }
        ctl.arm_timer(TimerPurpose::ConnectivityTestTimeout, self.test_timeout);
        self.change_state(ProvisioningState::TestConnectivityWaitConnectivity);
        Ok(())
    }

    /// Complete a pending connectivity test once reachability appears.
    pub fn check_internet_connectivity(&mut self, ctl: &mut dyn StationControl) {
        if self.state == ProvisioningState::TestConnectivityWaitConnectivity && ctl.have_internet() {
            ctl.cancel_timer(TimerPurpose::ConnectivityTestTimeout);
            self.change_state(ProvisioningState::Idle);
            ctl.notify(Notification::TestConnectivityComplete(Ok(())));
        }
    }

    pub fn on_connectivity_timeout(&mut self, ctl: &mut dyn StationControl) {
        if self.state != ProvisioningState::TestConnectivityWaitConnectivity {
            return;
        }
        warn!("Connectivity test timed out");
        self.change_state(ProvisioningState::Idle);
        ctl.notify(Notification::TestConnectivityComplete(Err(
            ConnectivityError::Timeout,
        )));
    }

    // ==================== Rendezvous ====================

    pub fn handle_set_rendezvous_mode(
        &mut self,
        ctl: &mut dyn StationControl,
        mode: u16,
    ) -> Result<(), ConnectivityError> {
        Self::reject_if_application_controlled(ctl, false)?;
        if mode & !RENDEZVOUS_MODE_WIFI_NETWORK != 0 {
            return Err(ConfigError::InvalidSetting("unsupported rendezvous mode").into());
        }
        if mode & RENDEZVOUS_MODE_WIFI_NETWORK != 0 {
            ctl.demand_start_ap()?;
        } else {
            ctl.stop_on_demand_ap();
        }
        info!("Rendezvous mode set to {:#06x}", mode);
        self.rendezvous_mode = mode;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityMode;
    use crate::error::DriverOp;
    use std::collections::HashMap;

    /// Scripted station used to drive the delegate in isolation.
    struct FakeStation {
        mode: StationMode,
        state: StationState,
        ap_app_controlled: bool,
        provision: Option<NetworkDescriptor>,
        internet: bool,
        scan_error: Option<DriverError>,
        scans: usize,
        ap_demands: usize,
        ap_stops: usize,
        timers: HashMap<TimerPurpose, Duration>,
        notifications: Vec<Notification>,
    }

    impl FakeStation {
        fn new(mode: StationMode, state: StationState) -> Self {
            Self {
                mode,
                state,
                ap_app_controlled: false,
                provision: None,
                internet: false,
                scan_error: None,
                scans: 0,
                ap_demands: 0,
                ap_stops: 0,
                timers: HashMap::new(),
                notifications: Vec::new(),
            }
        }

        fn provisioned(mut self) -> Self {
            self.provision = Some(
                NetworkDescriptor::new("HomeNet", SecurityMode::Wpa2Personal, "password123")
                    .unwrap(),
            );
            self
        }
    }

    impl StationControl for FakeStation {
        fn station_mode(&self) -> StationMode {
            self.mode
        }
        fn station_state(&self) -> StationState {
            self.state
        }
        fn ap_application_controlled(&self) -> bool {
            self.ap_app_controlled
        }
        fn provision(&self) -> Option<&NetworkDescriptor> {
            self.provision.as_ref()
        }
        fn have_internet(&self) -> bool {
            self.internet
        }
        fn start_scan(&mut self) -> Result<(), DriverError> {
            self.scans += 1;
            match self.scan_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
        fn arm_timer(&mut self, purpose: TimerPurpose, after: Duration) {
            self.timers.insert(purpose, after);
        }
        fn cancel_timer(&mut self, purpose: TimerPurpose) {
            self.timers.remove(&purpose);
        }
        fn store_provision(&mut self, network: NetworkDescriptor) -> Result<(), ConnectivityError> {
            self.provision = Some(network);
            Ok(())
        }
        fn remove_provision(&mut self) -> Result<(), ConnectivityError> {
            self.provision = None;
            Ok(())
        }
        fn set_station_mode(&mut self, mode: StationMode) -> Result<(), ConnectivityError> {
            self.mode = mode;
            Ok(())
        }
        fn demand_start_ap(&mut self) -> Result<(), ConnectivityError> {
            self.ap_demands += 1;
            Ok(())
        }
        fn stop_on_demand_ap(&mut self) {
            self.ap_stops += 1;
        }
        fn notify(&mut self, notification: Notification) {
            self.notifications.push(notification);
        }
    }

    fn delegate() -> ProvisioningDelegate {
        ProvisioningDelegate::new(Duration::from_secs(10), Duration::from_secs(30))
    }

    fn network(ssid: &str) -> NetworkDescriptor {
        NetworkDescriptor::new(ssid, SecurityMode::Wpa2Personal, "password123").unwrap()
    }

    // ==================== Scan Tests ====================

    #[test]
    fn test_scan_starts_when_station_settled() {
        let mut ctl = FakeStation::new(StationMode::Enabled, StationState::NotConnected);
        let mut delegate = delegate();

        delegate
            .handle_scan_networks(&mut ctl, NetworkType::WiFi)
            .unwrap();
        assert_eq!(delegate.state(), ProvisioningState::ScanInProgress);
        assert!(delegate.scan_in_progress());
        assert_eq!(ctl.scans, 1);
        assert!(ctl.timers.contains_key(&TimerPurpose::ScanTimeout));
    }

    #[test]
    fn test_second_scan_busy_until_done() {
        let mut ctl = FakeStation::new(StationMode::Enabled, StationState::Connected);
        let mut delegate = delegate();

        delegate
            .handle_scan_networks(&mut ctl, NetworkType::WiFi)
            .unwrap();
        assert_eq!(
            delegate.handle_scan_networks(&mut ctl, NetworkType::WiFi),
            Err(ConnectivityError::Busy)
        );

        delegate.handle_scan_done(&mut ctl, Vec::new());
        assert_eq!(delegate.state(), ProvisioningState::Idle);
        assert!(!ctl.timers.contains_key(&TimerPurpose::ScanTimeout));
        assert_eq!(ctl.notifications, vec![Notification::ScanComplete(Vec::new())]);

        assert!(delegate
            .handle_scan_networks(&mut ctl, NetworkType::WiFi)
            .is_ok());
    }

    #[test]
    fn test_scan_deferred_while_connecting() {
        let mut ctl = FakeStation::new(StationMode::Enabled, StationState::Connecting);
        let mut delegate = delegate();

        delegate
            .handle_scan_networks(&mut ctl, NetworkType::WiFi)
            .unwrap();
        assert_eq!(delegate.state(), ProvisioningState::ScanPending);
        assert_eq!(ctl.scans, 0);

        // Still busy while pending
        assert_eq!(
            delegate.handle_scan_networks(&mut ctl, NetworkType::WiFi),
            Err(ConnectivityError::Busy)
        );

        ctl.state = StationState::ConnectFailed;
        delegate.notify_station_state_changed(&mut ctl);
        assert_eq!(ctl.scans, 0);

        ctl.state = StationState::NotConnected;
        delegate.notify_station_state_changed(&mut ctl);
        assert_eq!(delegate.state(), ProvisioningState::ScanInProgress);
        assert_eq!(ctl.scans, 1);
    }

    #[test]
    fn test_scan_rejected_when_station_disabled() {
        let mut ctl = FakeStation::new(StationMode::Disabled, StationState::Disabled);
        assert_eq!(
            delegate().handle_scan_networks(&mut ctl, NetworkType::WiFi),
            Err(ConnectivityError::InvalidState)
        );
    }

    #[test]
    fn test_scan_rejected_when_application_controlled() {
        let mut ctl =
            FakeStation::new(StationMode::ApplicationControlled, StationState::NotConnected);
        assert_eq!(
            delegate().handle_scan_networks(&mut ctl, NetworkType::WiFi),
            Err(ConnectivityError::NotAllowed)
        );
    }

    #[test]
    fn test_scan_thread_network_unsupported() {
        let mut ctl = FakeStation::new(StationMode::Enabled, StationState::NotConnected);
        assert!(matches!(
            delegate().handle_scan_networks(&mut ctl, NetworkType::Thread),
            Err(ConnectivityError::InvalidConfiguration(
                ConfigError::UnsupportedNetworkType(NetworkType::Thread)
            ))
        ));
    }

    #[test]
    fn test_scan_driver_error_returns_to_idle() {
        let mut ctl = FakeStation::new(StationMode::Enabled, StationState::NotConnected);
        ctl.scan_error = Some(DriverError::new(DriverOp::Scan, -2));
        let mut delegate = delegate();

        assert!(matches!(
            delegate.handle_scan_networks(&mut ctl, NetworkType::WiFi),
            Err(ConnectivityError::Driver(_))
        ));
        assert_eq!(delegate.state(), ProvisioningState::Idle);
        assert!(ctl.timers.is_empty());
    }

    #[test]
    fn test_scan_timeout() {
        let mut ctl = FakeStation::new(StationMode::Enabled, StationState::NotConnected);
        let mut delegate = delegate();
        delegate
            .handle_scan_networks(&mut ctl, NetworkType::WiFi)
            .unwrap();

        delegate.on_scan_timeout(&mut ctl);
        assert_eq!(delegate.state(), ProvisioningState::Idle);
        assert_eq!(
            ctl.notifications,
            vec![Notification::ScanFailed(ConnectivityError::Timeout)]
        );

        // Late results are dropped
        delegate.handle_scan_done(&mut ctl, Vec::new());
        assert_eq!(ctl.notifications.len(), 1);
    }

    #[test]
    fn test_pending_scan_fails_when_station_disabled() {
        let mut ctl = FakeStation::new(StationMode::Enabled, StationState::Enabling);
        let mut delegate = delegate();
        delegate
            .handle_scan_networks(&mut ctl, NetworkType::WiFi)
            .unwrap();

        ctl.mode = StationMode::Disabled;
        delegate.notify_station_state_changed(&mut ctl);
        assert_eq!(delegate.state(), ProvisioningState::Idle);
        assert_eq!(
            ctl.notifications,
            vec![Notification::ScanFailed(ConnectivityError::InvalidState)]
        );
    }

    // ==================== Network Configuration Tests ====================

    #[test]
    fn test_add_network() {
        let mut ctl = FakeStation::new(StationMode::Enabled, StationState::NotConnected);
        let mut delegate = delegate();

        let id = delegate
            .handle_add_network(&mut ctl, NetworkType::WiFi, network("HomeNet"))
            .unwrap();
        assert_eq!(id, STATION_NETWORK_ID);
        assert!(ctl.provision.is_some());

        assert_eq!(
            delegate.handle_add_network(&mut ctl, NetworkType::WiFi, network("Other")),
            Err(ConnectivityError::InvalidState)
        );
    }

    #[test]
    fn test_add_invalid_network() {
        let mut ctl = FakeStation::new(StationMode::Enabled, StationState::NotConnected);
        let bad = NetworkDescriptor::unchecked("", SecurityMode::Wpa2Personal, "password123");
        assert_eq!(
            delegate().handle_add_network(&mut ctl, NetworkType::WiFi, bad),
            Err(ConnectivityError::InvalidConfiguration(ConfigError::SsidEmpty))
        );

        let enterprise =
            NetworkDescriptor::unchecked("Corp", SecurityMode::Wpa2Enterprise, "password123");
        assert!(matches!(
            delegate().handle_add_network(&mut ctl, NetworkType::WiFi, enterprise),
            Err(ConnectivityError::InvalidConfiguration(
                ConfigError::UnsupportedSecurity(_)
            ))
        ));
        assert!(ctl.provision.is_none());
    }

    #[test]
    fn test_update_keeps_password_when_omitted() {
        let mut ctl =
            FakeStation::new(StationMode::Enabled, StationState::NotConnected).provisioned();
        let update = NetworkDescriptor::unchecked("HomeNet5G", SecurityMode::Wpa2Personal, "");

        delegate()
            .handle_update_network(&mut ctl, STATION_NETWORK_ID, update)
            .unwrap();
        let stored = ctl.provision.as_ref().unwrap();
        assert_eq!(stored.ssid, "HomeNet5G");
        assert_eq!(stored.password(), "password123");
    }

    #[test]
    fn test_unknown_network_id() {
        let mut ctl =
            FakeStation::new(StationMode::Enabled, StationState::NotConnected).provisioned();
        assert_eq!(
            delegate().handle_remove_network(&mut ctl, 7),
            Err(ConnectivityError::InvalidConfiguration(
                ConfigError::UnknownNetworkId(7)
            ))
        );

        let mut empty = FakeStation::new(StationMode::Enabled, StationState::NotConnected);
        assert!(delegate()
            .handle_enable_network(&mut empty, STATION_NETWORK_ID)
            .is_err());
    }

    #[test]
    fn test_remove_network() {
        let mut ctl =
            FakeStation::new(StationMode::Enabled, StationState::Connected).provisioned();
        delegate()
            .handle_remove_network(&mut ctl, STATION_NETWORK_ID)
            .unwrap();
        assert!(ctl.provision.is_none());
    }

    #[test]
    fn test_get_networks_credentials() {
        let ctl = FakeStation::new(StationMode::Enabled, StationState::NotConnected).provisioned();
        let delegate = delegate();

        let with = delegate.handle_get_networks(&ctl, true);
        assert_eq!(with.len(), 1);
        assert_eq!(with[0].id, STATION_NETWORK_ID);
        assert_eq!(with[0].network.password(), "password123");

        let without = delegate.handle_get_networks(&ctl, false);
        assert_eq!(without[0].network.password(), "");

        let empty = FakeStation::new(StationMode::Enabled, StationState::NotConnected);
        assert!(delegate.handle_get_networks(&empty, true).is_empty());
    }

    #[test]
    fn test_enable_disable_network() {
        let mut ctl =
            FakeStation::new(StationMode::Disabled, StationState::Disabled).provisioned();
        let mut delegate = delegate();
        delegate
            .handle_enable_network(&mut ctl, STATION_NETWORK_ID)
            .unwrap();
        assert_eq!(ctl.mode, StationMode::Enabled);
        delegate
            .handle_disable_network(&mut ctl, STATION_NETWORK_ID)
            .unwrap();
        assert_eq!(ctl.mode, StationMode::Disabled);
    }

    // ==================== Connectivity Test Tests ====================

    #[test]
    fn test_connectivity_test_waits_for_internet() {
        let mut ctl =
            FakeStation::new(StationMode::Disabled, StationState::Disabled).provisioned();
        let mut delegate = delegate();

        delegate
            .handle_test_connectivity(&mut ctl, STATION_NETWORK_ID)
            .unwrap();
        assert_eq!(ctl.mode, StationMode::Enabled);
        assert!(delegate.awaiting_connectivity());
        assert_eq!(
            ctl.timers.get(&TimerPurpose::ConnectivityTestTimeout),
            Some(&Duration::from_secs(30))
        );

        // No internet yet
        delegate.check_internet_connectivity(&mut ctl);
        assert!(delegate.awaiting_connectivity());

        ctl.internet = true;
        delegate.check_internet_connectivity(&mut ctl);
        assert_eq!(delegate.state(), ProvisioningState::Idle);
        assert!(ctl.timers.is_empty());
        assert_eq!(
            ctl.notifications,
            vec![Notification::TestConnectivityComplete(Ok(()))]
        );
    }

    #[test]
    fn test_connectivity_test_timeout() {
        let mut ctl =
            FakeStation::new(StationMode::Enabled, StationState::NotConnected).provisioned();
        let mut delegate = delegate();
        delegate
            .handle_test_connectivity(&mut ctl, STATION_NETWORK_ID)
            .unwrap();

        delegate.on_connectivity_timeout(&mut ctl);
        assert_eq!(delegate.state(), ProvisioningState::Idle);
        assert_eq!(
            ctl.notifications,
            vec![Notification::TestConnectivityComplete(Err(
                ConnectivityError::Timeout
            ))]
        );
    }

    #[test]
    fn test_connectivity_test_fails_when_station_disabled() {
        let mut ctl =
            FakeStation::new(StationMode::Enabled, StationState::NotConnected).provisioned();
        let mut delegate = delegate();
        delegate
            .handle_test_connectivity(&mut ctl, STATION_NETWORK_ID)
            .unwrap();

        // Station changes alone do not end the test
        ctl.state = StationState::Connecting;
        delegate.notify_station_state_changed(&mut ctl);
        assert!(delegate.awaiting_connectivity());

        ctl.mode = StationMode::ApplicationControlled;
        delegate.notify_station_state_changed(&mut ctl);
        assert_eq!(delegate.state(), ProvisioningState::Idle);
        assert!(!ctl.timers.contains_key(&TimerPurpose::ConnectivityTestTimeout));
        assert_eq!(
            ctl.notifications,
            vec![Notification::TestConnectivityComplete(Err(
                ConnectivityError::InvalidState
            ))]
        );
    }

    #[test]
    fn test_connectivity_test_already_online() {
        let mut ctl =
            FakeStation::new(StationMode::Enabled, StationState::Connected).provisioned();
        ctl.internet = true;
        let mut delegate = delegate();
        delegate
            .handle_test_connectivity(&mut ctl, STATION_NETWORK_ID)
            .unwrap();
        assert_eq!(delegate.state(), ProvisioningState::Idle);
        assert_eq!(ctl.notifications.len(), 1);
    }

    #[test]
    fn test_connectivity_test_busy_during_scan() {
        let mut ctl =
            FakeStation::new(StationMode::Enabled, StationState::NotConnected).provisioned();
        let mut delegate = delegate();
        delegate
            .handle_scan_networks(&mut ctl, NetworkType::WiFi)
            .unwrap();
        assert_eq!(
            delegate.handle_test_connectivity(&mut ctl, STATION_NETWORK_ID),
            Err(ConnectivityError::Busy)
        );
    }

    // ==================== Rendezvous Tests ====================

    #[test]
    fn test_rendezvous_mode() {
        let mut ctl = FakeStation::new(StationMode::Enabled, StationState::NotConnected);
        let mut delegate = delegate();

        delegate
            .handle_set_rendezvous_mode(&mut ctl, RENDEZVOUS_MODE_WIFI_NETWORK)
            .unwrap();
        assert_eq!(ctl.ap_demands, 1);
        assert_eq!(delegate.rendezvous_mode(), RENDEZVOUS_MODE_WIFI_NETWORK);

        delegate.handle_set_rendezvous_mode(&mut ctl, 0).unwrap();
        assert_eq!(ctl.ap_stops, 1);

        assert!(matches!(
            delegate.handle_set_rendezvous_mode(&mut ctl, 0x0004),
            Err(ConnectivityError::InvalidConfiguration(_))
        ));
        // Pass-through only: no state change
        assert_eq!(delegate.state(), ProvisioningState::Idle);
    }

    #[test]
    fn test_rendezvous_rejected_when_ap_application_controlled() {
        let mut ctl = FakeStation::new(StationMode::Enabled, StationState::NotConnected);
        ctl.ap_app_controlled = true;
        assert_eq!(
            delegate().handle_set_rendezvous_mode(&mut ctl, RENDEZVOUS_MODE_WIFI_NETWORK),
            Err(ConnectivityError::NotAllowed)
        );
    }
}
