//! Connectivity manager settings.
//!
//! Initial surface modes and the timer durations that drive retries,
//! on-demand AP idling and provisioning deadlines.

use super::ConfigError;
use crate::ap::ApMode;
use crate::station::StationMode;
use crate::tunnel::TunnelMode;
use std::time::Duration;

/// Default interval between station reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u32 = 5_000;

/// Default idle time before an on-demand AP is shut down.
pub const DEFAULT_AP_IDLE_TIMEOUT_MS: u32 = 120_000;

/// Default deadline for a network scan to report results.
pub const DEFAULT_SCAN_TIMEOUT_MS: u32 = 10_000;

/// Default deadline for a connectivity test.
pub const DEFAULT_CONNECTIVITY_TEST_TIMEOUT_MS: u32 = 30_000;

/// Settings applied when the connectivity manager starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityConfig {
    /// Initial WiFi station mode.
    pub station_mode: StationMode,
    /// Initial WiFi AP mode.
    pub ap_mode: ApMode,
    /// Initial service tunnel mode.
    pub tunnel_mode: TunnelMode,
    /// Fixed delay between a failed connect and the next attempt.
    pub reconnect_interval_ms: u32,
    /// Idle time before an on-demand AP is deactivated.
    pub ap_idle_timeout_ms: u32,
    /// Deadline for scan results.
    pub scan_timeout_ms: u32,
    /// Deadline for a connectivity test.
    pub connectivity_test_timeout_ms: u32,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            station_mode: StationMode::Disabled,
            ap_mode: ApMode::Disabled,
            tunnel_mode: TunnelMode::Disabled,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            ap_idle_timeout_ms: DEFAULT_AP_IDLE_TIMEOUT_MS,
            scan_timeout_ms: DEFAULT_SCAN_TIMEOUT_MS,
            connectivity_test_timeout_ms: DEFAULT_CONNECTIVITY_TEST_TIMEOUT_MS,
        }
    }
}

impl ConnectivityConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconnect_interval_ms == 0 {
            return Err(ConfigError::InvalidSetting("reconnect_interval_ms must be > 0"));
        }
        if self.ap_idle_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting("ap_idle_timeout_ms must be > 0"));
        }
        if self.scan_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting("scan_timeout_ms must be > 0"));
        }
        if self.connectivity_test_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "connectivity_test_timeout_ms must be > 0",
            ));
        }
        Ok(())
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms.into())
    }

    pub fn connectivity_test_timeout(&self) -> Duration {
        Duration::from_millis(self.connectivity_test_timeout_ms.into())
    }
}
