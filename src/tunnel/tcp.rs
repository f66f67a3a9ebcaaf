//! TCP tunnel transport.
//!
//! Keeps a TCP connection to one of a list of service endpoints on a worker
//! thread and reports its status through an [`EventSender`]. Reconnects on
//! its own after failures and gives up (reporting `Closed`) after
//! [`MAX_CONNECT_ATTEMPTS`] consecutive connect failures.
//!
//! # Platform Notes
//!
//! - **Host**: Works directly with std::net
//! - **ESP32**: Works once the station has an address (the tunnel machine
//!   only starts it then)

use super::endpoint::ServiceEndpoint;
use super::machine::{TunnelNotification, TunnelReason, TunnelTransport};
use crate::error::{DriverError, DriverOp};
use crate::event::Event;
use crate::runtime::EventSender;
use log::{debug, error, info, warn};
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Connection timeout per endpoint.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read poll interval; bounds how long a stop takes to be noticed.
const READ_POLL_MS: u64 = 500;

/// Delay between reconnect rounds.
const RETRY_DELAY_SECS: u64 = 5;

/// Consecutive failed connect rounds before the transport gives up.
pub const MAX_CONNECT_ATTEMPTS: u32 = 5;

/// Error code reported when the OS gives none.
const UNKNOWN_ERROR_CODE: i32 = -1;

fn error_code(e: &io::Error) -> i32 {
    e.raw_os_error().unwrap_or(UNKNOWN_ERROR_CODE)
}

/// Connect to a single endpoint.
fn connect(endpoint: &ServiceEndpoint) -> io::Result<TcpStream> {
    info!("Connecting service tunnel to {}", endpoint);

    let addr = endpoint.address().to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {}", endpoint.host),
        )
    })?;
    debug!("Resolved {} to {}", endpoint.host, addr);

    let stream = TcpStream::connect_timeout(&addr, Duration::from_secs(CONNECT_TIMEOUT_SECS))?;

    // Non-critical socket options
    if let Err(e) = stream.set_read_timeout(Some(Duration::from_millis(READ_POLL_MS))) {
        warn!("Failed to set read timeout: {}", e);
    }
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to disable Nagle's algorithm: {}", e);
    }
    Ok(stream)
}

/// Try each endpoint in order until one connects.
fn connect_any(endpoints: &[ServiceEndpoint]) -> io::Result<(TcpStream, &ServiceEndpoint)> {
    let mut last_error = None;
    for endpoint in endpoints {
        match connect(endpoint) {
            Ok(stream) => return Ok((stream, endpoint)),
            Err(e) => {
                warn!("Failed to connect to {}: {}", endpoint, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no endpoints provided")))
}

/// Sleep in short steps so a stop is noticed promptly.
fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) {
    let step = Duration::from_millis(READ_POLL_MS);
    let mut waited = Duration::ZERO;
    while waited < total && !stop.load(Ordering::Acquire) {
        thread::sleep(step);
        waited += step;
    }
}

struct Worker {
    session: u32,
    endpoints: Vec<ServiceEndpoint>,
    events: EventSender,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn notify(&self, notification: TunnelNotification) {
        // Nothing is reported after a stop request
        if self.stop.load(Ordering::Acquire) {
            return;
        }
        if !self.events.post(Event::Tunnel(notification)) {
            debug!("Tunnel notification dropped: dispatcher gone");
        }
    }

    fn run(self) {
        let mut failures = 0u32;
        while !self.stop.load(Ordering::Acquire) {
            match connect_any(&self.endpoints) {
                Ok((stream, endpoint)) => {
                    info!("Service tunnel connected to {}", endpoint);
                    failures = 0;
                    self.notify(TunnelNotification::connected(self.session));
                    let (reason, code) = self.pump(stream);
                    if self.stop.load(Ordering::Acquire) {
                        break;
                    }
                    self.notify(TunnelNotification::failed(self.session, reason, code));
                }
                Err(e) => {
                    failures += 1;
                    let code = error_code(&e);
                    if failures >= MAX_CONNECT_ATTEMPTS {
                        error!(
                            "Service tunnel giving up after {} attempts: {}",
                            failures, e
                        );
                        self.notify(TunnelNotification::closed(
                            self.session,
                            TunnelReason::ConnectError,
                            code,
                        ));
                        return;
                    }
                    self.notify(TunnelNotification::failed(
                        self.session,
                        TunnelReason::ConnectError,
                        code,
                    ));
                }
            }
            sleep_unless_stopped(&self.stop, Duration::from_secs(RETRY_DELAY_SECS));
        }
        debug!("Service tunnel worker exiting");
    }

    /// Read until the connection drops or a stop is requested.
    ///
    /// Payload is not interpreted here.
    fn pump(&self, mut stream: TcpStream) -> (TunnelReason, i32) {
        let mut buffer = [0u8; 512];
        loop {
            if self.stop.load(Ordering::Acquire) {
                return (TunnelReason::Shutdown, 0);
            }
            match stream.read(&mut buffer) {
                Ok(0) => {
                    warn!("Service tunnel closed by peer");
                    return (TunnelReason::PeerClosed, 0);
                }
                Ok(n) => debug!("Service tunnel received {} bytes", n),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) => {}
                Err(e) => {
                    warn!("Service tunnel read error: {}", e);
                    return (TunnelReason::Timeout, error_code(&e));
                }
            }
        }
    }
}

/// TCP tunnel transport.
pub struct TcpTunnel {
    endpoints: Vec<ServiceEndpoint>,
    events: EventSender,
    stop: Option<Arc<AtomicBool>>,
}

impl TcpTunnel {
    pub fn new(endpoints: Vec<ServiceEndpoint>, events: EventSender) -> Self {
        Self {
            endpoints,
            events,
            stop: None,
        }
    }

    pub fn endpoints(&self) -> &[ServiceEndpoint] {
        &self.endpoints
    }

    pub fn is_running(&self) -> bool {
        self.stop.is_some()
    }
}

impl TunnelTransport for TcpTunnel {
    fn start(&mut self, session: u32) -> Result<(), DriverError> {
        if self.endpoints.is_empty() {
            return Err(DriverError::new(DriverOp::StartTunnel, UNKNOWN_ERROR_CODE));
        }
        // Never leave a previous worker running
        self.stop()?;

        let stop = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            session,
            endpoints: self.endpoints.clone(),
            events: self.events.clone(),
            stop: stop.clone(),
        };
        thread::Builder::new()
            .name("service-tunnel".to_string())
            .spawn(move || worker.run())
            .map_err(|e| DriverError::new(DriverOp::StartTunnel, error_code(&e)))?;
        self.stop = Some(stop);
        Ok(())
    }

    /// Signals the worker and returns without joining it.
    fn stop(&mut self) -> Result<(), DriverError> {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Release);
        }
        Ok(())
    }
}

impl Drop for TcpTunnel {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for TcpTunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTunnel")
            .field("endpoints", &self.endpoints)
            .field("running", &self.is_running())
            .finish()
    }
}
