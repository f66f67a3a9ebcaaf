//! Connectivity manager.
//!
//! Owns the station, AP and tunnel machines, the provisioning delegate and
//! the connectivity facts. [`ConnectivityManager::handle_event`] and
//! [`ConnectivityManager::execute`] are the only mutation paths, and both run
//! on the dispatcher context. Nothing here blocks or locks.
//!
//! Every event or command ends with one settle pass:
//!
//! 1. drive the station (at most one transition)
//! 2. let a deferred scan start, then aggregate facts
//! 3. complete a pending connectivity test
//! 4. drive the AP and the tunnel
//! 5. aggregate again, report changes, publish status

use crate::aggregator::{self, LinkAddresses, LinkInputs};
use crate::ap::{AccessPoint, ApMode, ApState, ApTransition};
use crate::config::{ConnectivityConfig, NetworkDescriptor};
use crate::driver::WifiDriver;
use crate::error::{ConnectivityError, DriverError};
use crate::event::{Command, CommandOutput, Event, Notification, ProvisioningRequest};
use crate::facts::{ConnectivityFacts, SharedStatus, StatusSnapshot};
use crate::provisioning::{
    ProvisioningDelegate, ProvisioningState, ProvisioningStore, StationControl,
};
use crate::station::{Station, StationMode, StationState, StationTransition};
use crate::timer::{Clock, TimerPurpose, TimerService};
use crate::tunnel::{ServiceTunnel, TunnelMode, TunnelTransport};
use log::{debug, info, warn};
use std::time::Duration;

/// Platform collaborators the manager drives.
pub struct Platform {
    pub driver: Box<dyn WifiDriver>,
    pub tunnel: Box<dyn TunnelTransport>,
    pub store: Box<dyn ProvisioningStore>,
    pub timers: Box<dyn TimerService>,
    pub clock: Box<dyn Clock>,
}

/// The narrow capability handed to the provisioning delegate.
struct StationLink<'a> {
    station: &'a mut Station,
    ap: &'a mut AccessPoint,
    platform: &'a mut Platform,
    facts: ConnectivityFacts,
    notifications: &'a mut Vec<Notification>,
}

impl StationControl for StationLink<'_> {
    fn station_mode(&self) -> StationMode {
        self.station.mode()
    }

    fn station_state(&self) -> StationState {
        self.station.state()
    }

    fn ap_application_controlled(&self) -> bool {
        self.ap.is_application_controlled()
    }

    fn provision(&self) -> Option<&NetworkDescriptor> {
        self.station.provision()
    }

    fn have_internet(&self) -> bool {
        self.facts.has_internet()
    }

    fn start_scan(&mut self) -> Result<(), DriverError> {
        self.platform.driver.start_scan()
    }

    fn arm_timer(&mut self, purpose: TimerPurpose, after: Duration) {
        self.platform.timers.arm(purpose, after);
    }

    fn cancel_timer(&mut self, purpose: TimerPurpose) {
        self.platform.timers.cancel(purpose);
    }

    fn store_provision(&mut self, network: NetworkDescriptor) -> Result<(), ConnectivityError> {
        self.platform.store.save(&network)?;
        self.station
            .set_provision(network, self.platform.timers.as_mut());
        // Move an existing association onto the new network
        if let Some((from, to)) = self.station.force_reconnect(self.platform.driver.as_mut()) {
            self.notifications
                .push(Notification::StationStateChanged { from, to });
        }
        Ok(())
    }

    fn remove_provision(&mut self) -> Result<(), ConnectivityError> {
        self.platform.store.clear()?;
        self.station.forget_provision(self.platform.timers.as_mut());
        Ok(())
    }

    fn set_station_mode(&mut self, mode: StationMode) -> Result<(), ConnectivityError> {
        self.station
            .set_mode(mode, self.platform.timers.as_mut())
            .map(|_| ())
    }

    fn demand_start_ap(&mut self) -> Result<(), ConnectivityError> {
        self.ap.demand_start(self.platform.clock.now_ms())
    }

    fn stop_on_demand_ap(&mut self) {
        self.ap.stop_on_demand(self.platform.timers.as_mut());
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}

/// Connectivity state-machine engine.
pub struct ConnectivityManager {
    station: Station,
    ap: AccessPoint,
    tunnel: ServiceTunnel,
    delegate: ProvisioningDelegate,
    addresses: LinkAddresses,
    facts: ConnectivityFacts,
    platform: Platform,
    notifications: Vec<Notification>,
    status: SharedStatus,
}

impl ConnectivityManager {
    /// Create the manager, load the stored provision and run a first settle pass.
    ///
    /// A provision that cannot be loaded is logged and ignored so the device
    /// still comes up.
    pub fn new(config: ConnectivityConfig, mut platform: Platform) -> Result<Self, ConnectivityError> {
        config.validate()?;

        let provision = match platform.store.load() {
            Ok(Some(network)) => match network.validate() {
                Ok(()) => {
                    info!("Loaded stored network {:?}", network);
                    Some(network)
                }
                Err(e) => {
                    warn!("Ignoring invalid stored network: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to load stored network: {}", e);
                None
            }
        };

        let mut manager = Self {
            station: Station::new(config.station_mode, config.reconnect_interval_ms, provision),
            ap: AccessPoint::new(config.ap_mode, config.ap_idle_timeout_ms),
            tunnel: ServiceTunnel::new(config.tunnel_mode),
            delegate: ProvisioningDelegate::new(
                config.scan_timeout(),
                config.connectivity_test_timeout(),
            ),
            addresses: LinkAddresses::default(),
            facts: ConnectivityFacts::default(),
            platform,
            notifications: Vec::new(),
            status: SharedStatus::new(),
        };
        info!(
            "Connectivity manager started: station {}, AP {}, tunnel {}",
            config.station_mode, config.ap_mode, config.tunnel_mode
        );
        manager.settle();
        Ok(manager)
    }

    // ==================== Accessors ====================

    pub fn station_mode(&self) -> StationMode {
        self.station.mode()
    }

    pub fn station_state(&self) -> StationState {
        self.station.state()
    }

    pub fn is_station_enabled(&self) -> bool {
        self.station.is_enabled()
    }

    pub fn is_station_application_controlled(&self) -> bool {
        self.station.is_application_controlled()
    }

    pub fn is_station_connected(&self) -> bool {
        self.station.is_connected()
    }

    pub fn is_station_provisioned(&self) -> bool {
        self.station.is_provisioned()
    }

    pub fn station_network_id(&self) -> Option<u32> {
        self.station.network_id()
    }

    pub fn station_reconnect_interval_ms(&self) -> u32 {
        self.station.reconnect_interval_ms()
    }

    pub fn ap_mode(&self) -> ApMode {
        self.ap.mode()
    }

    pub fn ap_state(&self) -> ApState {
        self.ap.state()
    }

    pub fn is_ap_application_controlled(&self) -> bool {
        self.ap.is_application_controlled()
    }

    pub fn ap_idle_timeout_ms(&self) -> u32 {
        self.ap.idle_timeout_ms()
    }

    pub fn tunnel_mode(&self) -> TunnelMode {
        self.tunnel.mode()
    }

    pub fn facts(&self) -> ConnectivityFacts {
        self.facts
    }

    pub fn have_ipv4_internet(&self) -> bool {
        self.facts.ipv4_internet
    }

    pub fn have_ipv6_internet(&self) -> bool {
        self.facts.ipv6_internet
    }

    pub fn have_service_connectivity(&self) -> bool {
        self.facts.service_connectivity
    }

    pub fn is_service_tunnel_started(&self) -> bool {
        self.facts.service_tunnel_started
    }

    pub fn provisioning_state(&self) -> ProvisioningState {
        self.delegate.state()
    }

    pub fn addresses(&self) -> &LinkAddresses {
        &self.addresses
    }

    /// Handle for readers outside the dispatcher context.
    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    /// Take notifications produced since the last call.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    // ==================== Mutators ====================

    pub fn set_station_mode(&mut self, mode: StationMode) -> Result<(), ConnectivityError> {
        self.station.set_mode(mode, self.platform.timers.as_mut())?;
        self.settle();
        Ok(())
    }

    /// A start command refused by the driver in this pass is returned as
    /// `ConnectivityError::Driver`.
    pub fn set_ap_mode(&mut self, mode: ApMode) -> Result<(), ConnectivityError> {
        self.ap.set_mode(mode, self.platform.timers.as_mut())?;
        self.try_settle()?;
        Ok(())
    }

    pub fn set_tunnel_mode(&mut self, mode: TunnelMode) -> Result<(), ConnectivityError> {
        self.tunnel.set_mode(mode)?;
        self.settle();
        Ok(())
    }

    /// Forget the station provision, in memory and in the store.
    ///
    /// Refused with `NotAllowed` while the station is connecting or connected.
    pub fn clear_station_provision(&mut self) -> Result<(), ConnectivityError> {
        self.station.check_clear_provision()?;
        self.platform.store.clear()?;
        self.station.forget_provision(self.platform.timers.as_mut());
        self.settle();
        Ok(())
    }

    pub fn set_station_reconnect_interval_ms(&mut self, ms: u32) -> Result<(), ConnectivityError> {
        self.station.set_reconnect_interval_ms(ms)?;
        self.settle();
        Ok(())
    }

    pub fn set_ap_idle_timeout_ms(&mut self, ms: u32) -> Result<(), ConnectivityError> {
        self.ap.set_idle_timeout_ms(ms)?;
        self.settle();
        Ok(())
    }

    pub fn demand_start_ap(&mut self) -> Result<(), ConnectivityError> {
        self.ap.demand_start(self.platform.clock.now_ms())?;
        self.try_settle()?;
        Ok(())
    }

    pub fn stop_on_demand_ap(&mut self) {
        self.ap.stop_on_demand(self.platform.timers.as_mut());
        self.settle();
    }

    /// Re-evaluate the on-demand AP against its idle window.
    pub fn maintain_on_demand_ap(&mut self) {
        self.settle();
    }

    /// Execute an application or provisioning command.
    pub fn execute(&mut self, command: Command) -> Result<CommandOutput, ConnectivityError> {
        debug!("Command: {:?}", command);
        let done = |r: Result<(), ConnectivityError>| r.map(|()| CommandOutput::Done);
        match command {
            Command::SetStationMode(mode) => done(self.set_station_mode(mode)),
            Command::SetApMode(mode) => done(self.set_ap_mode(mode)),
            Command::SetTunnelMode(mode) => done(self.set_tunnel_mode(mode)),
            Command::ClearStationProvision => done(self.clear_station_provision()),
            Command::DemandStartAp => done(self.demand_start_ap()),
            Command::StopOnDemandAp => {
                self.stop_on_demand_ap();
                Ok(CommandOutput::Done)
            }
            Command::MaintainOnDemandAp => {
                self.maintain_on_demand_ap();
                Ok(CommandOutput::Done)
            }
            Command::SetStationReconnectInterval(ms) => {
                done(self.set_station_reconnect_interval_ms(ms))
            }
            Command::SetApIdleTimeout(ms) => done(self.set_ap_idle_timeout_ms(ms)),
            Command::Provisioning(request) => self.handle_provisioning(request),
        }
    }

    fn handle_provisioning(
        &mut self,
        request: ProvisioningRequest,
    ) -> Result<CommandOutput, ConnectivityError> {
        let (delegate, mut link) = self.split();
        let result = match request {
            ProvisioningRequest::ScanNetworks(network_type) => delegate
                .handle_scan_networks(&mut link, network_type)
                .map(|()| CommandOutput::Done),
            ProvisioningRequest::AddNetwork(network_type, network) => delegate
                .handle_add_network(&mut link, network_type, network)
                .map(CommandOutput::NetworkId),
            ProvisioningRequest::UpdateNetwork(id, network) => delegate
                .handle_update_network(&mut link, id, network)
                .map(|()| CommandOutput::Done),
            ProvisioningRequest::RemoveNetwork(id) => delegate
                .handle_remove_network(&mut link, id)
                .map(|()| CommandOutput::Done),
            ProvisioningRequest::GetNetworks {
                include_credentials,
            } => Ok(CommandOutput::Networks(
                delegate.handle_get_networks(&link, include_credentials),
            )),
            ProvisioningRequest::EnableNetwork(id) => delegate
                .handle_enable_network(&mut link, id)
                .map(|()| CommandOutput::Done),
            ProvisioningRequest::DisableNetwork(id) => delegate
                .handle_disable_network(&mut link, id)
                .map(|()| CommandOutput::Done),
            ProvisioningRequest::TestConnectivity(id) => delegate
                .handle_test_connectivity(&mut link, id)
                .map(|()| CommandOutput::Done),
            ProvisioningRequest::SetRendezvousMode(mode) => delegate
                .handle_set_rendezvous_mode(&mut link, mode)
                .map(|()| CommandOutput::Done),
        };
        if let Err(e) = &result {
            debug!("Provisioning request failed: {}", e);
        }
        self.settle();
        result
    }

    // ==================== Events ====================

    /// Apply one platform event and settle.
    pub fn handle_event(&mut self, event: Event) {
        debug!("Event: {:?}", event);
        match event {
            Event::StationStarted => {
                let t = self.station.on_started();
                self.record_station(t);
            }
            Event::StationStopped => {
                let t = self.station.on_stopped();
                self.record_station(t);
            }
            Event::StationConnected => {
                let t = self.station.on_connected();
                self.record_station(t);
            }
            Event::StationDisconnected { reason } => {
                info!("WiFi station disconnected (reason {})", reason);
                let t = self.station.on_disconnected();
                self.record_station(t);
            }
            Event::Ipv4AddressAvailable(addr) => {
                if self.link_up() {
                    self.addresses.ipv4_available(addr);
                } else {
                    debug!("IPv4 address {} ignored: station not connected", addr);
                }
            }
            Event::Ipv4AddressLost => self.addresses.ipv4_lost(),
            Event::Ipv6AddressAvailable(addr) => {
                if self.link_up() {
                    self.addresses.ipv6_available(addr);
                } else {
                    debug!("IPv6 address {} ignored: station not connected", addr);
                }
            }
            Event::Ipv6AddressLost(addr) => self.addresses.ipv6_lost(addr),
            Event::ScanDone(results) => {
                let (delegate, mut link) = self.split();
                delegate.handle_scan_done(&mut link, results);
            }
            Event::ScanFailed(error) => {
                let (delegate, mut link) = self.split();
                delegate.handle_scan_failed(&mut link, error);
            }
            Event::ApStarted => {
                let t = self.ap.on_started();
                self.record_ap(t);
            }
            Event::ApStopped => {
                let t = self.ap.on_stopped();
                self.record_ap(t);
            }
            Event::ApStartFailed(error) => {
                warn!("WiFi AP activation failed: {}", error);
                let t = self.ap.on_start_failed();
                self.record_ap(t);
                self.notifications
                    .push(Notification::ApActivationFailed(error));
            }
            Event::ApClientAssociated => self.ap.on_client_associated(),
            Event::ApClientDisassociated => {
                let now = self.platform.clock.now_ms();
                self.ap.on_client_disassociated(now);
            }
            Event::Tunnel(notification) => {
                self.tunnel.on_notification(notification);
            }
            Event::TimerFired(purpose) => self.on_timer(purpose),
        }
        self.settle();
    }

    fn on_timer(&mut self, purpose: TimerPurpose) {
        debug!("Timer fired: {:?}", purpose);
        match purpose {
            TimerPurpose::StationReconnect => self.station.on_reconnect_timer(),
            // The settle pass re-checks the idle window
            TimerPurpose::ApIdle => {}
            TimerPurpose::ScanTimeout => {
                let (delegate, mut link) = self.split();
                delegate.on_scan_timeout(&mut link);
            }
            TimerPurpose::ConnectivityTestTimeout => {
                let (delegate, mut link) = self.split();
                delegate.on_connectivity_timeout(&mut link);
            }
        }
    }

    // ==================== Settle ====================

    fn split(&mut self) -> (&mut ProvisioningDelegate, StationLink<'_>) {
        (
            &mut self.delegate,
            StationLink {
                station: &mut self.station,
                ap: &mut self.ap,
                platform: &mut self.platform,
                facts: self.facts,
                notifications: &mut self.notifications,
            },
        )
    }

    /// Addresses are only accepted while the station is associated.
    fn link_up(&self) -> bool {
        matches!(
            self.station.state(),
            StationState::Connected | StationState::ConnectSucceeded
        )
    }

    fn record_station(&mut self, transition: Option<StationTransition>) {
        if let Some((from, to)) = transition {
            self.notifications
                .push(Notification::StationStateChanged { from, to });
        }
    }

    fn record_ap(&mut self, transition: Option<ApTransition>) {
        if let Some((from, to)) = transition {
            self.notifications
                .push(Notification::ApStateChanged { from, to });
        }
    }

    fn aggregate(&self) -> ConnectivityFacts {
        aggregator::evaluate(&LinkInputs {
            station_connected: self.station.is_connected(),
            has_ipv4: self.addresses.has_ipv4(),
            has_ipv6_global: self.addresses.has_ipv6_global(),
            tunnel_started: self.tunnel.is_started(),
            tunnel_healthy: self.tunnel.is_healthy(),
            scan_in_progress: self.delegate.scan_in_progress(),
            awaiting_connectivity: self.delegate.awaiting_connectivity(),
        })
    }

    /// Settle pass for inputs with no caller to answer. A refused AP start
    /// goes out as a notification instead.
    fn settle(&mut self) {
        if let Err(e) = self.try_settle() {
            self.notifications.push(Notification::ApActivationFailed(e));
        }
    }

    /// Run one settle pass and return the AP start failure, if any.
    fn try_settle(&mut self) -> Result<(), DriverError> {
        let before = self.facts;
        let now = self.platform.clock.now_ms();

        let scan_in_progress = self.delegate.scan_in_progress();
        let t = self.station.drive(
            self.platform.driver.as_mut(),
            self.platform.timers.as_mut(),
            now,
            scan_in_progress,
        );
        self.record_station(t);
        if !self.link_up() {
            self.addresses.clear();
        }

        {
            let (delegate, mut link) = self.split();
            delegate.notify_station_state_changed(&mut link);
        }
        self.facts = self.aggregate();
        {
            let (delegate, mut link) = self.split();
            delegate.check_internet_connectivity(&mut link);
        }

        let ap_result = match self.ap.drive(
            self.platform.driver.as_mut(),
            self.platform.timers.as_mut(),
            now,
            self.station.is_provisioned(),
        ) {
            Ok(t) => {
                self.record_ap(t);
                Ok(())
            }
            Err(e) => Err(e),
        };
        self.tunnel
            .drive(self.platform.tunnel.as_mut(), self.station.is_connected());

        self.facts = self.aggregate();
        if self.facts != before {
            info!(
                "Connectivity change: ipv4 {} -> {}, ipv6 {} -> {}, service {} -> {}",
                before.ipv4_internet,
                self.facts.ipv4_internet,
                before.ipv6_internet,
                self.facts.ipv6_internet,
                before.service_connectivity,
                self.facts.service_connectivity
            );
            self.notifications.push(Notification::ConnectivityChanged {
                previous: before,
                current: self.facts,
            });
        }
        self.publish_status();
        ap_result
    }

    fn publish_status(&self) {
        self.status.publish(StatusSnapshot {
            station_mode: self.station.mode().to_string(),
            station_state: self.station.state().to_string(),
            station_provisioned: self.station.is_provisioned(),
            ap_mode: self.ap.mode().to_string(),
            ap_state: self.ap.state().to_string(),
            ap_clients: self.ap.clients(),
            tunnel_mode: self.tunnel.mode().to_string(),
            provisioning_state: self.delegate.state().to_string(),
            facts: self.facts,
        });
    }
}
