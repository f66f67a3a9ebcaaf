//! Connectivity firmware binary.
//!
//! Brings up the station, an on-demand setup AP and the service tunnel, and
//! logs every connectivity notification.
//!
//! - **ESP32**: `cargo espflash flash --bin connectivity-esp32 --features esp32 --release`
//! - **Host**: use `connectivity-sim` instead
//!
//! ## Endpoints
//!
//! - Status: http://<device>:8080/status

#[cfg(feature = "esp32")]
mod firmware {
    use connectivity_esp32::provisioning::NvsProvisioningStore;
    use connectivity_esp32::status_server::{StatusServer, DEFAULT_STATUS_PORT};
    use connectivity_esp32::timer::MonotonicClock;
    use connectivity_esp32::tunnel::{ServiceEndpoint, TcpTunnel};
    use connectivity_esp32::wifi::{EspWifiDriver, EventBridge};
    use connectivity_esp32::{
        runtime, ApMode, ConnectivityConfig, ConnectivityManager, Dispatcher, Platform,
        StationMode, TokioTimers, TunnelMode,
    };
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{info, warn};
    use std::error::Error;
    use tokio::sync::broadcast::error::RecvError;
    use tokio_util::sync::CancellationToken;

    /// SSID advertised by the setup AP.
    const AP_SSID: &str = "connectivity-setup";

    /// Service tunnel endpoint, overridable at build time.
    const SERVICE_ENDPOINT: &str = match option_env!("CONNECTIVITY_SERVICE_ENDPOINT") {
        Some(endpoint) => endpoint,
        None => "tunnel.local:11095",
    };

    pub async fn run() -> Result<(), Box<dyn Error>> {
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        let store = NvsProvisioningStore::new(nvs.clone())?;
        let driver = EspWifiDriver::new(peripherals.modem, sysloop.clone(), Some(nvs), AP_SSID)?;

        let (events, inbox) = runtime::channel();
        let _bridge = EventBridge::new(&driver, &sysloop, events.clone())?;

        let endpoint: ServiceEndpoint = SERVICE_ENDPOINT.parse()?;
        info!("Service tunnel endpoint: {}", endpoint);

        let platform = Platform {
            driver: Box::new(driver),
            tunnel: Box::new(TcpTunnel::new(vec![endpoint], events.clone())),
            store: Box::new(store),
            timers: Box::new(TokioTimers::new(&events)),
            clock: Box::new(MonotonicClock::new()),
        };
        let config = ConnectivityConfig {
            station_mode: StationMode::Enabled,
            ap_mode: ApMode::OnDemandNoStationProvision,
            tunnel_mode: TunnelMode::Enabled,
            ..Default::default()
        };
        let manager = ConnectivityManager::new(config, platform)?;
        let (dispatcher, handle) = Dispatcher::new(manager, &events, inbox);

        let _status_server = match StatusServer::start(None, DEFAULT_STATUS_PORT, handle.status())
        {
            Ok(server) => Some(server),
            Err(e) => {
                warn!("Failed to start status server: {}", e);
                None
            }
        };

        let mut notifications = handle.subscribe();
        let cancel = CancellationToken::new();
        let dispatcher_task = tokio::spawn(dispatcher.run(cancel.clone()));

        loop {
            match notifications.recv().await {
                Ok(notification) => info!("{:?}", notification),
                Err(RecvError::Lagged(missed)) => warn!("Missed {} notifications", missed),
                Err(RecvError::Closed) => break,
            }
        }

        cancel.cancel();
        dispatcher_task.await?;
        Ok(())
    }
}

#[cfg(feature = "esp32")]
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("=== Connectivity firmware starting ===");

    if let Err(e) = firmware::run().await {
        log::error!("Connectivity firmware stopped: {}", e);
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin connectivity-sim' to run on the host.");
}
