//! HTTP status server for connectivity monitoring.
//!
//! Serves the latest published [`StatusSnapshot`](crate::facts::StatusSnapshot)
//! as JSON on `GET /status`. Uses `tiny_http`, which works on both host and
//! ESP32 (via std::net). Reads never touch the dispatcher.
//!
//! # Example Response
//!
//! ```json
//! {
//!   "uptime_secs": 3600,
//!   "station_mode": "enabled",
//!   "station_state": "connected",
//!   "station_provisioned": true,
//!   "ap_mode": "on-demand",
//!   "ap_state": "not-active",
//!   "ap_clients": 0,
//!   "tunnel_mode": "enabled",
//!   "provisioning_state": "idle",
//!   "facts": {
//!     "ipv4_internet": true,
//!     "ipv6_internet": false,
//!     "service_connectivity": true,
//!     "service_tunnel_started": true,
//!     "scan_in_progress": false,
//!     "awaiting_connectivity": false
//!   }
//! }
//! ```

use crate::facts::{SharedStatus, StatusSnapshot};
use log::{error, info, warn};
use serde::Serialize;
use std::io::{self, Cursor};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tiny_http::{Header, Method, Response, Server};

/// Default port for the status server.
pub const DEFAULT_STATUS_PORT: u16 = 8080;

/// Accept poll interval; bounds how long a stop takes.
const POLL_INTERVAL_MS: u64 = 100;

#[derive(Serialize)]
struct StatusResponse<'a> {
    uptime_secs: u64,
    #[serde(flatten)]
    status: &'a StatusSnapshot,
}

type HttpResponse = Response<Cursor<Vec<u8>>>;

fn with_header(mut response: HttpResponse, name: &str, value: &str) -> HttpResponse {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(header) => response.add_header(header),
        Err(()) => warn!("Invalid header {}: {}", name, value),
    }
    response
}

/// Build the response for one request.
fn route(method: &Method, path: &str, status: &SharedStatus, started: Instant) -> HttpResponse {
    if method != &Method::Get {
        let response = Response::from_string("Method Not Allowed").with_status_code(405);
        return with_header(response, "Allow", "GET");
    }

    match path {
        "/status" | "/status/" => {
            let snapshot = status.snapshot();
            let body = StatusResponse {
                uptime_secs: started.elapsed().as_secs(),
                status: &snapshot,
            };
            match serde_json::to_string(&body) {
                Ok(json) => with_header(
                    Response::from_string(json).with_status_code(200),
                    "Content-Type",
                    "application/json",
                ),
                Err(e) => {
                    error!("Failed to serialize status: {}", e);
                    Response::from_string("Internal Server Error").with_status_code(500)
                }
            }
        }
        "/" => with_header(
            Response::from_string("See /status for connectivity status").with_status_code(302),
            "Location",
            "/status",
        ),
        _ => Response::from_string("Not Found").with_status_code(404),
    }
}

/// HTTP status server.
///
/// Runs in a background thread. Drop it to stop the server.
pub struct StatusServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
}

impl StatusServer {
    /// Start serving `status` on `bind_addr:port` (`None` binds 0.0.0.0).
    pub fn start(bind_addr: Option<IpAddr>, port: u16, status: SharedStatus) -> io::Result<Self> {
        let addr = match bind_addr {
            Some(ip) => format!("{}:{}", ip, port),
            None => format!("0.0.0.0:{}", port),
        };

        let server = Server::http(&addr)
            .map_err(|e| io::Error::new(io::ErrorKind::AddrInUse, format!("{}", e)))?;
        let local_addr = server.server_addr().to_ip();

        info!("Status server listening on http://{}/status", addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let handle = thread::spawn(move || {
            Self::run_server(server, status, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
            local_addr,
        })
    }

    /// Address actually bound, useful when started on port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn run_server(server: Server, status: SharedStatus, shutdown: Arc<AtomicBool>) {
        let started = Instant::now();

        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Status server shutting down");
                break;
            }

            match server.recv_timeout(Duration::from_millis(POLL_INTERVAL_MS)) {
                Ok(Some(request)) => {
                    let response = route(request.method(), request.url(), &status, started);
                    if let Err(e) = request.respond(response) {
                        warn!("Failed to send response: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Server error: {}", e);
                    break;
                }
            }
        }
    }

    /// Stop the server. May take up to one poll interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatusServer {
    fn drop(&mut self) {
        self.stop();
    }
}
