//! Host connectivity simulator.
//!
//! Runs the full dispatcher against a simulated radio, a real TCP service
//! tunnel and a file-backed provision store.
//!
//! - `cargo run --bin connectivity-sim`
//!
//! ## Console
//!
//! Type `help` for the command list. Notifications are printed as they
//! arrive.
//!
//! ## Environment
//!
//! - `CONNECTIVITY_TUNNEL_ENDPOINT` - service endpoint (default `127.0.0.1:11095`)
//! - `RUST_LOG` - log filter (default `info`)
//!
//! ## Endpoints
//!
//! - Status: http://localhost:8080/status

use connectivity_esp32::provisioning::FileProvisioningStore;
use connectivity_esp32::sim::{SimCommand, SimulatedRadio, HELP_TEXT};
use connectivity_esp32::status_server::{StatusServer, DEFAULT_STATUS_PORT};
use connectivity_esp32::timer::MonotonicClock;
use connectivity_esp32::tunnel::{ServiceEndpoint, TcpTunnel};
use connectivity_esp32::{
    runtime, ApMode, CommandOutput, ConnectivityConfig, ConnectivityHandle, ConnectivityManager,
    Dispatcher, Notification, Platform, StationMode, TokioTimers, TunnelMode,
};
use log::{error, info, warn};
use std::error::Error;
use std::io::{BufRead, Write};
use std::net::{IpAddr, Ipv4Addr};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

const DEFAULT_TUNNEL_ENDPOINT: &str = "127.0.0.1:11095";

/// Print a line to stdout.
fn print_line(msg: &str) {
    println!("{}", msg);
    let _ = std::io::stdout().flush();
}

/// Print the prompt.
fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn describe(notification: &Notification) -> String {
    match notification {
        Notification::ScanComplete(results) => {
            let mut out = format!("* Scan found {} networks", results.len());
            for r in results {
                out.push_str(&format!(
                    "\n    {:<32} {:>4} dBm  ch {:<2}  {}",
                    r.ssid, r.rssi, r.channel, r.security
                ));
            }
            out
        }
        Notification::StationStateChanged { from, to } => format!("* Station {} -> {}", from, to),
        Notification::ApStateChanged { from, to } => format!("* AP {} -> {}", from, to),
        Notification::ConnectivityChanged { current, .. } => format!(
            "* Connectivity: ipv4 {}, ipv6 {}, service {}",
            current.ipv4_internet, current.ipv6_internet, current.service_connectivity
        ),
        other => format!("* {:?}", other),
    }
}

async fn handle_command(cmd: SimCommand, handle: &ConnectivityHandle) {
    match cmd {
        SimCommand::Execute(command) => match handle.execute(command).await {
            Ok(CommandOutput::Done) => print_line("ok"),
            Ok(CommandOutput::NetworkId(id)) => print_line(&format!("ok (network {})", id)),
            Ok(CommandOutput::Networks(networks)) => {
                if networks.is_empty() {
                    print_line("No provisioned network");
                }
                for n in networks {
                    print_line(&format!("{}: {} ({})", n.id, n.network.ssid, n.network.security));
                }
            }
            Err(e) => print_line(&format!("error: {}", e)),
        },
        SimCommand::Status => match serde_json::to_string_pretty(&handle.status().snapshot()) {
            Ok(json) => print_line(&json),
            Err(e) => print_line(&format!("error: {}", e)),
        },
        SimCommand::Help => print_line(HELP_TEXT),
        SimCommand::Quit => {}
        SimCommand::Unknown(msg) => {
            if !msg.is_empty() {
                print_line(&msg);
            }
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let endpoint: ServiceEndpoint = std::env::var("CONNECTIVITY_TUNNEL_ENDPOINT")
        .unwrap_or_else(|_| DEFAULT_TUNNEL_ENDPOINT.to_string())
        .parse()?;
    let store = FileProvisioningStore::open_default()?;
    info!("Provision file: {:?}", store.path());
    info!("Service tunnel endpoint: {}", endpoint);

    let (events, inbox) = runtime::channel();
    let platform = Platform {
        driver: Box::new(SimulatedRadio::with_default_networks(events.clone())),
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

    let cancel = CancellationToken::new();
    let mut notifications = handle.subscribe();
    let dispatcher_task = tokio::spawn(dispatcher.run(cancel.clone()));

    let _status_server = match StatusServer::start(
        Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        DEFAULT_STATUS_PORT,
        handle.status(),
    ) {
        Ok(server) => {
            info!(
                "Status server at http://localhost:{}/status",
                DEFAULT_STATUS_PORT
            );
            Some(server)
        }
        Err(e) => {
            warn!("Failed to start status server: {}", e);
            None
        }
    };

    let notify_cancel = cancel.clone();
    let notification_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = notify_cancel.cancelled() => break,

                result = notifications.recv() => match result {
                    Ok(notification) => print_line(&describe(&notification)),
                    Err(RecvError::Lagged(missed)) => warn!("Missed {} notifications", missed),
                    Err(RecvError::Closed) => break,
                }
            }
        }
    });

    print_line("Connectivity simulator ready. Type 'help' for commands.");
    print_prompt();

    let console_handle = handle.clone();
    let console_task = tokio::task::spawn_blocking(move || {
        let rt = tokio::runtime::Handle::current();
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match SimCommand::parse(&line) {
                SimCommand::Quit => break,
                cmd => rt.block_on(handle_command(cmd, &console_handle)),
            }
            print_prompt();
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            print_line("\nShutting down...");
        }
        result = console_task => {
            if let Err(e) = result {
                error!("Console task error: {}", e);
            }
        }
    }

    cancel.cancel();
    if let Err(e) = dispatcher_task.await {
        error!("Dispatcher task error: {}", e);
    }
    let _ = notification_task.await;
    info!("Shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            error!("Simulator failed: {}", e);
            1
        }
    };
    // The console thread may still be blocked on stdin
    std::process::exit(code);
}
