//! ESP-IDF WiFi driver.
//!
//! Station and AP share one radio, so the driver keeps the wanted
//! configuration of each interface and re-applies the combined
//! configuration whenever either side changes. Completions arrive through
//! the system event loop (see [`super::events`]).

use crate::config::{NetworkDescriptor, SecurityMode};
use crate::driver::{ScanResult, WifiDriver};
use crate::error::{DriverError, DriverOp};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::config::ScanConfig;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AccessPointInfo, AuthMethod, ClientConfiguration, Configuration,
    EspWifi,
};
use esp_idf_sys::{EspError, ESP_ERR_INVALID_ARG};
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard};

/// Channel used by the soft AP.
const AP_CHANNEL: u8 = 1;

/// Maximum stations joined to the soft AP.
const MAX_AP_CONNECTIONS: u16 = 4;

pub(crate) type SharedWifi = Arc<Mutex<EspWifi<'static>>>;

pub(crate) fn lock(wifi: &SharedWifi) -> MutexGuard<'_, EspWifi<'static>> {
    wifi.lock().unwrap_or_else(|e| e.into_inner())
}

fn esp_error(op: DriverOp, e: EspError) -> DriverError {
    DriverError::new(op, e.code())
}

fn invalid_arg(op: DriverOp) -> DriverError {
    DriverError::new(op, ESP_ERR_INVALID_ARG as i32)
}

fn auth_method(security: SecurityMode) -> AuthMethod {
    match security {
        SecurityMode::Open => AuthMethod::None,
        SecurityMode::Wep => AuthMethod::WEP,
        SecurityMode::WpaPersonal => AuthMethod::WPA,
        SecurityMode::Wpa2Personal => AuthMethod::WPA2Personal,
        SecurityMode::Wpa2MixedPersonal => AuthMethod::WPAWPA2Personal,
        SecurityMode::Wpa3Personal => AuthMethod::WPA3Personal,
        SecurityMode::Wpa2Enterprise => AuthMethod::WPA2Enterprise,
    }
}

fn security_mode(auth: Option<AuthMethod>) -> SecurityMode {
    match auth {
        None | Some(AuthMethod::None) => SecurityMode::Open,
        Some(AuthMethod::WEP) => SecurityMode::Wep,
        Some(AuthMethod::WPA) => SecurityMode::WpaPersonal,
        Some(AuthMethod::WPAWPA2Personal) => SecurityMode::Wpa2MixedPersonal,
        Some(AuthMethod::WPA3Personal) | Some(AuthMethod::WPA2WPA3Personal) => {
            SecurityMode::Wpa3Personal
        }
        Some(AuthMethod::WPA2Enterprise) => SecurityMode::Wpa2Enterprise,
        Some(_) => SecurityMode::Wpa2Personal,
    }
}

pub(crate) fn scan_result(info: &AccessPointInfo) -> ScanResult {
    ScanResult {
        ssid: info.ssid.as_str().to_string(),
        bssid: info.bssid,
        rssi: info.signal_strength,
        channel: info.channel,
        security: security_mode(info.auth_method),
    }
}

/// [`WifiDriver`] over ESP-IDF.
pub struct EspWifiDriver {
    wifi: SharedWifi,
    client: Option<ClientConfiguration>,
    access_point: Option<AccessPointConfiguration>,
    ap_ssid: String,
}

impl EspWifiDriver {
    /// Create the driver. The soft AP is open and advertised as `ap_ssid`.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        ap_ssid: &str,
    ) -> Result<Self, EspError> {
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        Ok(Self {
            wifi: Arc::new(Mutex::new(wifi)),
            client: None,
            access_point: None,
            ap_ssid: ap_ssid.to_string(),
        })
    }

    pub(crate) fn shared(&self) -> SharedWifi {
        self.wifi.clone()
    }

    /// Push the combined configuration and start or stop the radio to match.
    fn apply(&mut self, op: DriverOp) -> Result<(), DriverError> {
        let config = match (self.client.clone(), self.access_point.clone()) {
            (Some(sta), Some(ap)) => Configuration::Mixed(sta, ap),
            (Some(sta), None) => Configuration::Client(sta),
            (None, Some(ap)) => Configuration::AccessPoint(ap),
            (None, None) => Configuration::None,
        };
        let idle = matches!(config, Configuration::None);

        let mut wifi = lock(&self.wifi);
        let started = wifi.is_started().map_err(|e| esp_error(op, e))?;
        if idle {
            if started {
                debug!("WiFi radio idle, stopping");
                wifi.stop().map_err(|e| esp_error(op, e))?;
            }
            return Ok(());
        }
        wifi.set_configuration(&config)
            .map_err(|e| esp_error(op, e))?;
        if !started {
            wifi.start().map_err(|e| esp_error(op, e))?;
        }
        Ok(())
    }
}

impl WifiDriver for EspWifiDriver {
    fn start_station(&mut self) -> Result<(), DriverError> {
        info!("Starting WiFi station");
        self.client.get_or_insert_with(ClientConfiguration::default);
        self.apply(DriverOp::StartStation)
    }

    fn stop_station(&mut self) -> Result<(), DriverError> {
        info!("Stopping WiFi station");
        self.client = None;
        self.apply(DriverOp::StopStation)
    }

    fn connect(&mut self, network: &NetworkDescriptor) -> Result<(), DriverError> {
        info!("Connecting to WiFi: {}", network.ssid);
        let op = DriverOp::Connect;
        self.client = Some(ClientConfiguration {
            ssid: network
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| invalid_arg(op))?,
            password: network
                .password()
                .try_into()
                .map_err(|_| invalid_arg(op))?,
            auth_method: auth_method(network.security),
            ..Default::default()
        });
        self.apply(op)?;
        lock(&self.wifi).connect().map_err(|e| esp_error(op, e))
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        info!("Disconnecting from WiFi");
        lock(&self.wifi)
            .disconnect()
            .map_err(|e| esp_error(DriverOp::Disconnect, e))
    }

    fn start_scan(&mut self) -> Result<(), DriverError> {
        debug!("Starting WiFi scan");
        lock(&self.wifi)
            .start_scan(&ScanConfig::default(), false)
            .map_err(|e| esp_error(DriverOp::Scan, e))
    }

    fn start_ap(&mut self) -> Result<(), DriverError> {
        info!("Starting WiFi AP: {}", self.ap_ssid);
        let op = DriverOp::StartAp;
        self.access_point = Some(AccessPointConfiguration {
            ssid: self.ap_ssid.as_str().try_into().map_err(|_| invalid_arg(op))?,
            channel: AP_CHANNEL,
            auth_method: AuthMethod::None,
            max_connections: MAX_AP_CONNECTIONS,
            ..Default::default()
        });
        self.apply(op)
    }

    fn stop_ap(&mut self) -> Result<(), DriverError> {
        info!("Stopping WiFi AP");
        self.access_point = None;
        self.apply(DriverOp::StopAp)
    }
}
