//! Connectivity aggregation.
//!
//! [`evaluate`] is a pure function from link inputs to
//! [`ConnectivityFacts`]. [`LinkAddresses`] tracks the addresses the driver
//! has reported for the station interface. Only global unicast IPv6
//! addresses count toward IPv6 reachability.

use crate::facts::ConnectivityFacts;
use log::{debug, info};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Classification of an IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ipv6Scope {
    Unspecified,
    Loopback,
    Multicast,
    LinkLocal,
    UniqueLocal,
    Ipv4Mapped,
    GlobalUnicast,
    /// Reserved or deprecated ranges.
    Other,
}

impl Ipv6Scope {
    pub fn counts_for_internet(&self) -> bool {
        *self == Self::GlobalUnicast
    }
}

impl fmt::Display for Ipv6Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unspecified => "unspecified",
            Self::Loopback => "loopback",
            Self::Multicast => "multicast",
            Self::LinkLocal => "link-local",
            Self::UniqueLocal => "unique-local",
            Self::Ipv4Mapped => "ipv4-mapped",
            Self::GlobalUnicast => "global-unicast",
            Self::Other => "other",
        })
    }
}

/// Classify an IPv6 address.
pub fn characterize_ipv6(addr: &Ipv6Addr) -> Ipv6Scope {
    let first = addr.segments()[0];
    if addr.is_unspecified() {
        Ipv6Scope::Unspecified
    } else if addr.is_loopback() {
        Ipv6Scope::Loopback
    } else if addr.is_multicast() {
        Ipv6Scope::Multicast
    } else if addr.to_ipv4_mapped().is_some() {
        Ipv6Scope::Ipv4Mapped
    } else if first & 0xffc0 == 0xfe80 {
        Ipv6Scope::LinkLocal
    } else if first & 0xfe00 == 0xfc00 {
        Ipv6Scope::UniqueLocal
    } else if first & 0xe000 == 0x2000 {
        Ipv6Scope::GlobalUnicast
    } else {
        Ipv6Scope::Other
    }
}

/// Addresses reported by the driver for the station interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkAddresses {
    ipv4: Option<Ipv4Addr>,
    ipv6_global: Vec<Ipv6Addr>,
}

impl LinkAddresses {
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.ipv4
    }

    pub fn ipv6_global(&self) -> &[Ipv6Addr] {
        &self.ipv6_global
    }

    pub fn has_ipv4(&self) -> bool {
        self.ipv4.is_some()
    }

    pub fn has_ipv6_global(&self) -> bool {
        !self.ipv6_global.is_empty()
    }

    pub fn ipv4_available(&mut self, addr: Ipv4Addr) {
        info!("IPv4 address available: {}", addr);
        self.ipv4 = Some(addr);
    }

    pub fn ipv4_lost(&mut self) {
        if let Some(addr) = self.ipv4.take() {
            info!("IPv4 address lost: {}", addr);
        }
    }

    /// Record an IPv6 address. Returns `true` if it counts for reachability.
    pub fn ipv6_available(&mut self, addr: Ipv6Addr) -> bool {
        let scope = characterize_ipv6(&addr);
        info!("IPv6 address available: {} ({})", addr, scope);
        if !scope.counts_for_internet() {
            return false;
        }
        if !self.ipv6_global.contains(&addr) {
            self.ipv6_global.push(addr);
        }
        true
    }

    pub fn ipv6_lost(&mut self, addr: Ipv6Addr) {
        let before = self.ipv6_global.len();
        self.ipv6_global.retain(|a| *a != addr);
        if self.ipv6_global.len() != before {
            info!("IPv6 address lost: {}", addr);
        } else {
            debug!("IPv6 address lost for untracked {}", addr);
        }
    }

    /// Forget everything; the station left `Connected`.
    pub fn clear(&mut self) {
        self.ipv4 = None;
        self.ipv6_global.clear();
    }
}

/// Inputs to one aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkInputs {
    pub station_connected: bool,
    pub has_ipv4: bool,
    pub has_ipv6_global: bool,
    pub tunnel_started: bool,
    pub tunnel_healthy: bool,
    pub scan_in_progress: bool,
    pub awaiting_connectivity: bool,
}

/// Derive connectivity facts from link inputs.
pub fn evaluate(inputs: &LinkInputs) -> ConnectivityFacts {
    ConnectivityFacts {
        ipv4_internet: inputs.station_connected && inputs.has_ipv4,
        ipv6_internet: inputs.station_connected && inputs.has_ipv6_global,
        service_connectivity: inputs.tunnel_started && inputs.tunnel_healthy,
        service_tunnel_started: inputs.tunnel_started,
        scan_in_progress: inputs.scan_in_progress,
        awaiting_connectivity: inputs.awaiting_connectivity,
    }
}
