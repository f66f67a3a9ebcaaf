//! Simulated WiFi radio.
//!
//! Answers driver commands immediately by posting the completion events a
//! real radio would produce, against a fixed list of visible networks.

use crate::config::{NetworkDescriptor, SecurityMode};
use crate::driver::{ScanResult, WifiDriver};
use crate::error::{DriverError, DriverOp};
use crate::event::Event;
use crate::runtime::EventSender;
use log::debug;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Error code for commands issued while the station is down.
const ERR_NOT_STARTED: i32 = 0x3002;

/// 802.11 reason: station left the network.
const REASON_ASSOC_LEAVE: u16 = 8;
/// 802.11 reason: four-way handshake failed (wrong passphrase).
const REASON_HANDSHAKE_TIMEOUT: u16 = 15;
/// Driver reason: no AP with that SSID.
const REASON_NO_AP_FOUND: u16 = 201;

/// An access point visible to the simulated radio.
#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    pub ssid: String,
    pub security: SecurityMode,
    pub password: String,
    pub rssi: i8,
    pub channel: u8,
}

impl SimulatedNetwork {
    pub fn new(ssid: &str, security: SecurityMode, password: &str) -> Self {
        Self {
            ssid: ssid.to_string(),
            security,
            password: password.to_string(),
            rssi: -55,
            channel: 6,
        }
    }

    fn accepts(&self, network: &NetworkDescriptor) -> bool {
        self.security == network.security
            && (self.security == SecurityMode::Open || self.password == network.password())
    }

    fn scan_result(&self, index: usize) -> ScanResult {
        ScanResult {
            ssid: self.ssid.clone(),
            bssid: [0x02, 0x00, 0x00, 0x00, 0x00, index as u8],
            rssi: self.rssi,
            channel: self.channel,
            security: self.security,
        }
    }
}

/// [`WifiDriver`] that simulates a radio on the host.
pub struct SimulatedRadio {
    events: EventSender,
    networks: Vec<SimulatedNetwork>,
    station_up: bool,
    leases: u8,
}

impl SimulatedRadio {
    pub fn new(events: EventSender, networks: Vec<SimulatedNetwork>) -> Self {
        Self {
            events,
            networks,
            station_up: false,
            leases: 0,
        }
    }

    /// Radio that sees `HomeNet` (WPA2, `password123`) and `CafeOpen`.
    pub fn with_default_networks(events: EventSender) -> Self {
        Self::new(
            events,
            vec![
                SimulatedNetwork::new("HomeNet", SecurityMode::Wpa2Personal, "password123"),
                SimulatedNetwork {
                    rssi: -78,
                    channel: 11,
                    ..SimulatedNetwork::new("CafeOpen", SecurityMode::Open, "")
                },
            ],
        )
    }

    fn post(&self, event: Event) {
        debug!("Simulated radio: {:?}", event);
        self.events.post(event);
    }

    fn require_station(&self, op: DriverOp) -> Result<(), DriverError> {
        if self.station_up {
            Ok(())
        } else {
            Err(DriverError::new(op, ERR_NOT_STARTED))
        }
    }
}

impl WifiDriver for SimulatedRadio {
    fn start_station(&mut self) -> Result<(), DriverError> {
        self.station_up = true;
        self.post(Event::StationStarted);
        Ok(())
    }

    fn stop_station(&mut self) -> Result<(), DriverError> {
        self.station_up = false;
        self.post(Event::StationStopped);
        Ok(())
    }

    fn connect(&mut self, network: &NetworkDescriptor) -> Result<(), DriverError> {
        self.require_station(DriverOp::Connect)?;
        match self.networks.iter().find(|n| n.ssid == network.ssid) {
            Some(visible) if visible.accepts(network) => {
                self.leases = self.leases.wrapping_add(1).max(2);
                let host = self.leases;
                self.post(Event::StationConnected);
                self.post(Event::Ipv4AddressAvailable(Ipv4Addr::new(192, 168, 4, host)));
                self.post(Event::Ipv6AddressAvailable(Ipv6Addr::new(
                    0x2001,
                    0xdb8,
                    0,
                    0,
                    0,
                    0,
                    0,
                    host.into(),
                )));
            }
            Some(_) => self.post(Event::StationDisconnected {
                reason: REASON_HANDSHAKE_TIMEOUT,
            }),
            None => self.post(Event::StationDisconnected {
                reason: REASON_NO_AP_FOUND,
            }),
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        self.require_station(DriverOp::Disconnect)?;
        self.post(Event::StationDisconnected {
            reason: REASON_ASSOC_LEAVE,
        });
        Ok(())
    }

    fn start_scan(&mut self) -> Result<(), DriverError> {
        self.require_station(DriverOp::Scan)?;
        let results = self
            .networks
            .iter()
            .enumerate()
            .map(|(i, n)| n.scan_result(i))
            .collect();
        self.post(Event::ScanDone(results));
        Ok(())
    }

    fn start_ap(&mut self) -> Result<(), DriverError> {
        self.post(Event::ApStarted);
        Ok(())
    }

    fn stop_ap(&mut self) -> Result<(), DriverError> {
        self.post(Event::ApStopped);
        Ok(())
    }
}
