//! System event loop bridge.
//!
//! Turns ESP-IDF WiFi and IP events into [`Event`]s posted to the
//! dispatcher. The callbacks run on the system event task and never touch
//! the state machines directly.

use super::connection::{lock, scan_result, EspWifiDriver, SharedWifi};
use crate::error::{DriverError, DriverOp};
use crate::event::Event;
use crate::runtime::EventSender;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::netif::IpEvent;
use esp_idf_svc::wifi::WifiEvent;
use esp_idf_sys::EspError;
use log::{debug, warn};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Reason reported when the driver gives none.
const UNSPECIFIED_REASON: u16 = 1;

/// Keeps the event loop subscriptions alive.
pub struct EventBridge {
    _wifi: EspSubscription<'static, System>,
    _ip: EspSubscription<'static, System>,
}

impl EventBridge {
    pub fn new(
        driver: &EspWifiDriver,
        sysloop: &EspSystemEventLoop,
        events: EventSender,
    ) -> Result<Self, EspError> {
        let wifi = driver.shared();
        let wifi_events = events.clone();
        let wifi_sub = sysloop.subscribe::<WifiEvent, _>(move |event| {
            if let Some(event) = translate_wifi(&event, &wifi) {
                wifi_events.post(event);
            }
        })?;

        let ip_sub = sysloop.subscribe::<IpEvent, _>(move |event| {
            let event = match event {
                IpEvent::DhcpIpAssigned(assignment) => {
                    Event::Ipv4AddressAvailable(Ipv4Addr::from(assignment.ip()))
                }
                IpEvent::DhcpIpDeassigned { .. } => Event::Ipv4AddressLost,
                IpEvent::DhcpIp6Assigned(assignment) => {
                    Event::Ipv6AddressAvailable(Ipv6Addr::from(assignment.ip()))
                }
                _ => return,
            };
            events.post(event);
        })?;

        Ok(Self {
            _wifi: wifi_sub,
            _ip: ip_sub,
        })
    }
}

fn translate_wifi(event: &WifiEvent, wifi: &SharedWifi) -> Option<Event> {
    let event = match event {
        WifiEvent::StaStarted { .. } => Event::StationStarted,
        WifiEvent::StaStopped { .. } => Event::StationStopped,
        WifiEvent::StaConnected { .. } => Event::StationConnected,
        WifiEvent::StaDisconnected { .. } => Event::StationDisconnected {
            reason: UNSPECIFIED_REASON,
        },
        WifiEvent::ScanDone { .. } => match lock(wifi).get_scan_result() {
            Ok(found) => Event::ScanDone(found.iter().map(scan_result).collect()),
            Err(e) => {
                warn!("Failed to read scan results: {:?}", e);
                Event::ScanFailed(DriverError::new(DriverOp::Scan, e.code()))
            }
        },
        WifiEvent::ApStarted { .. } => Event::ApStarted,
        WifiEvent::ApStopped { .. } => Event::ApStopped,
        WifiEvent::ApStaConnected { .. } => Event::ApClientAssociated,
        WifiEvent::ApStaDisconnected { .. } => Event::ApClientDisassociated,
        other => {
            debug!("Unhandled WiFi event: {:?}", other);
            return None;
        }
    };
    Some(event)
}
