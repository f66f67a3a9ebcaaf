//! Service tunnel endpoints.

use crate::config::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Default service port.
pub const DEFAULT_SERVICE_PORT: u16 = 11095;

/// A service entry point the tunnel can connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServiceEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the address string for connection (host:port).
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

/// Parses `host` or `host:port`.
impl FromStr for ServiceEndpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidFormat(format!("bad port in {}", s)))?;
                (host, port)
            }
            None => (s, DEFAULT_SERVICE_PORT),
        };
        if host.is_empty() {
            return Err(ConfigError::InvalidFormat(format!("missing host in {}", s)));
        }
        Ok(Self::new(host, port))
    }
}
