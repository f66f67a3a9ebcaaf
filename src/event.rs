//! Messages into and out of the dispatcher context.
//!
//! Platform callbacks become [`Event`]s, application requests become
//! [`Command`]s, and the manager reports back with [`Notification`]s.

use crate::ap::{ApMode, ApState};
use crate::config::{NetworkDescriptor, NetworkType};
use crate::driver::ScanResult;
use crate::error::{ConnectivityError, DriverError};
use crate::facts::ConnectivityFacts;
use crate::provisioning::ProvisionedNetwork;
use crate::station::{StationMode, StationState};
use crate::timer::TimerPurpose;
use crate::tunnel::{TunnelMode, TunnelNotification};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Platform event posted by the driver, tunnel or timer collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StationStarted,
    StationStopped,
    StationConnected,
    /// Association lost or refused. `reason` is the 802.11 reason code.
    StationDisconnected {
        reason: u16,
    },
    Ipv4AddressAvailable(Ipv4Addr),
    Ipv4AddressLost,
    Ipv6AddressAvailable(Ipv6Addr),
    Ipv6AddressLost(Ipv6Addr),
    ScanDone(Vec<ScanResult>),
    ScanFailed(DriverError),
    ApStarted,
    ApStopped,
    ApStartFailed(DriverError),
    ApClientAssociated,
    ApClientDisassociated,
    Tunnel(TunnelNotification),
    TimerFired(TimerPurpose),
}

/// Network provisioning request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningRequest {
    ScanNetworks(NetworkType),
    AddNetwork(NetworkType, NetworkDescriptor),
    UpdateNetwork(u32, NetworkDescriptor),
    RemoveNetwork(u32),
    GetNetworks { include_credentials: bool },
    EnableNetwork(u32),
    DisableNetwork(u32),
    TestConnectivity(u32),
    SetRendezvousMode(u16),
}

/// Application request executed on the dispatcher context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetStationMode(StationMode),
    SetApMode(ApMode),
    SetTunnelMode(TunnelMode),
    ClearStationProvision,
    DemandStartAp,
    StopOnDemandAp,
    MaintainOnDemandAp,
    SetStationReconnectInterval(u32),
    SetApIdleTimeout(u32),
    Provisioning(ProvisioningRequest),
}

/// Synchronous result of a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    Done,
    /// Id assigned to an added network.
    NetworkId(u32),
    Networks(Vec<ProvisionedNetwork>),
}

/// Asynchronous report from the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ConnectivityChanged {
        previous: ConnectivityFacts,
        current: ConnectivityFacts,
    },
    StationStateChanged {
        from: StationState,
        to: StationState,
    },
    ApStateChanged {
        from: ApState,
        to: ApState,
    },
    ScanComplete(Vec<ScanResult>),
    ScanFailed(ConnectivityError),
    TestConnectivityComplete(Result<(), ConnectivityError>),
    ApActivationFailed(DriverError),
}
