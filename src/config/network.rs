//! Station network descriptor.
//!
//! Platform-independent types describing the single network the station is
//! provisioned with. These are validated here before anything reaches the
//! driver or the provisioning store.
//!
//! # Example
//!
//! ```
//! use connectivity_esp32::config::{NetworkDescriptor, SecurityMode};
//!
//! let network = NetworkDescriptor::new("MyNetwork", SecurityMode::Wpa2Personal, "MyPassword").unwrap();
//! assert!(network.validate().is_ok());
//!
//! let restored = NetworkDescriptor::from_bytes(&network.to_bytes()).unwrap();
//! assert_eq!(restored, network);
//! ```

use std::fmt;
use zeroize::Zeroizing;

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum passphrase length for WPA/WPA2/WPA3 personal.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Minimum passphrase length for WPA/WPA2/WPA3 personal.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Network id of the single station provision.
pub const STATION_NETWORK_ID: u32 = 1;

/// Kind of network a provisioning request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    WiFi,
    Thread,
}

/// WiFi security mode of a provisioned network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SecurityMode {
    Open,
    Wep,
    WpaPersonal,
    Wpa2Personal,
    Wpa2MixedPersonal,
    Wpa3Personal,
    Wpa2Enterprise,
}

impl SecurityMode {
    /// Whether the station can join networks using this mode.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Wpa2Enterprise)
    }

    fn code(&self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Wep => 1,
            Self::WpaPersonal => 2,
            Self::Wpa2Personal => 3,
            Self::Wpa2MixedPersonal => 4,
            Self::Wpa3Personal => 5,
            Self::Wpa2Enterprise => 6,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Open,
            1 => Self::Wep,
            2 => Self::WpaPersonal,
            3 => Self::Wpa2Personal,
            4 => Self::Wpa2MixedPersonal,
            5 => Self::Wpa3Personal,
            6 => Self::Wpa2Enterprise,
            _ => return None,
        })
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Wep => "wep",
            Self::WpaPersonal => "wpa-personal",
            Self::Wpa2Personal => "wpa2-personal",
            Self::Wpa2MixedPersonal => "wpa2-mixed-personal",
            Self::Wpa3Personal => "wpa3-personal",
            Self::Wpa2Enterprise => "wpa2-enterprise",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for SecurityMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "open" => Self::Open,
            "wep" => Self::Wep,
            "wpa-personal" => Self::WpaPersonal,
            "wpa2-personal" | "wpa2" => Self::Wpa2Personal,
            "wpa2-mixed-personal" => Self::Wpa2MixedPersonal,
            "wpa3-personal" | "wpa3" => Self::Wpa3Personal,
            "wpa2-enterprise" => Self::Wpa2Enterprise,
            other => return Err(ConfigError::UnknownValue(other.to_string())),
        })
    }
}

/// Credentials and identity of the network the station joins.
///
/// The password is zeroed when the descriptor is dropped and never printed
/// by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkDescriptor {
    /// Network SSID (1-32 bytes).
    pub ssid: String,
    /// Security mode advertised by the access point.
    pub security: SecurityMode,
    password: Zeroizing<String>,
}

impl NetworkDescriptor {
    /// Create and validate a descriptor.
    pub fn new(
        ssid: impl Into<String>,
        security: SecurityMode,
        password: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let network = Self::unchecked(ssid, security, password);
        network.validate()?;
        Ok(network)
    }

    /// Create a descriptor for an open network.
    pub fn open(ssid: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(ssid, SecurityMode::Open, String::new())
    }

    /// Build a descriptor without validating it.
    ///
    /// Provisioning requests arrive this way and are validated by the handler.
    pub fn unchecked(
        ssid: impl Into<String>,
        security: SecurityMode,
        password: impl Into<String>,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            security,
            password: Zeroizing::new(password.into()),
        }
    }

    /// The network passphrase (empty for open networks).
    pub fn password(&self) -> &str {
        self.password.as_str()
    }

    /// Copy of this descriptor with the password removed.
    pub fn without_credentials(&self) -> Self {
        Self::unchecked(self.ssid.clone(), self.security, String::new())
    }

    /// Check if this is an open network.
    pub fn is_open(&self) -> bool {
        self.security == SecurityMode::Open
    }

    /// Validate SSID, security mode and password.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() {
            return Err(ConfigError::SsidEmpty);
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::SsidTooLong {
                len: self.ssid.len(),
                max: MAX_SSID_LEN,
            });
        }
        if !self.security.is_supported() {
            return Err(ConfigError::UnsupportedSecurity(self.security));
        }

        let len = self.password.len();
        match self.security {
            SecurityMode::Open => {
                if len != 0 {
                    return Err(ConfigError::PasswordNotAllowed);
                }
            }
            SecurityMode::Wep => {
                let is_hex = self.password.chars().all(|c| c.is_ascii_hexdigit());
                let valid = matches!(len, 5 | 13) || (is_hex && matches!(len, 10 | 26));
                if !valid {
                    return Err(ConfigError::InvalidWepKey { len });
                }
            }
            _ => {
                if len < MIN_PASSWORD_LEN {
                    return Err(ConfigError::PasswordTooShort {
                        len,
                        min: MIN_PASSWORD_LEN,
                    });
                }
                if len > MAX_PASSWORD_LEN {
                    return Err(ConfigError::PasswordTooLong {
                        len,
                        max: MAX_PASSWORD_LEN,
                    });
                }
            }
        }

        Ok(())
    }

    /// Serialize for the provisioning store.
    ///
    /// Format: `[security:1][ssid_len:1][ssid:N][password_len:1][password:M]`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(3 + self.ssid.len() + self.password.len());
        bytes.push(self.security.code());
        bytes.push(self.ssid.len() as u8);
        bytes.extend_from_slice(self.ssid.as_bytes());
        bytes.push(self.password.len() as u8);
        bytes.extend_from_slice(self.password.as_bytes());
        bytes
    }

    /// Deserialize and validate bytes written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let (&code, rest) = bytes
            .split_first()
            .ok_or_else(|| ConfigError::InvalidFormat("empty data".into()))?;
        let security = SecurityMode::from_code(code)
            .ok_or_else(|| ConfigError::InvalidFormat(format!("unknown security code {}", code)))?;

        let (&ssid_len, rest) = rest
            .split_first()
            .ok_or_else(|| ConfigError::InvalidFormat("missing SSID length".into()))?;
        let ssid_len = ssid_len as usize;
        if rest.len() < ssid_len + 1 {
            return Err(ConfigError::InvalidFormat("truncated SSID".into()));
        }
        let ssid = String::from_utf8(rest[..ssid_len].to_vec())
            .map_err(|_| ConfigError::InvalidFormat("invalid SSID UTF-8".into()))?;

        let password_len = rest[ssid_len] as usize;
        let password_bytes = &rest[ssid_len + 1..];
        if password_bytes.len() < password_len {
            return Err(ConfigError::InvalidFormat("truncated password".into()));
        }
        let password = String::from_utf8(password_bytes[..password_len].to_vec())
            .map_err(|_| ConfigError::InvalidFormat("invalid password UTF-8".into()))?;

        Self::new(ssid, security, password)
    }
}

impl fmt::Debug for NetworkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkDescriptor")
            .field("ssid", &self.ssid)
            .field("security", &self.security)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

/// Errors that can occur while validating configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds maximum length.
    SsidTooLong { len: usize, max: usize },
    /// Passphrase is too short for WPA.
    PasswordTooShort { len: usize, min: usize },
    /// Passphrase exceeds maximum length.
    PasswordTooLong { len: usize, max: usize },
    /// A password was supplied for an open network.
    PasswordNotAllowed,
    /// WEP key has an invalid length or encoding.
    InvalidWepKey { len: usize },
    /// The station cannot join networks with this security mode.
    UnsupportedSecurity(SecurityMode),
    /// Only WiFi networks can be provisioned.
    UnsupportedNetworkType(NetworkType),
    /// Request names a network id that is not provisioned.
    UnknownNetworkId(u32),
    /// A setting is out of range.
    InvalidSetting(&'static str),
    /// Invalid data format during deserialization.
    InvalidFormat(String),
    /// Unknown mode or command string.
    UnknownValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooShort { len, min } => {
                write!(f, "password too short: {} bytes (min {})", len, min)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
            Self::PasswordNotAllowed => write!(f, "open networks take no password"),
            Self::InvalidWepKey { len } => write!(f, "invalid WEP key length: {}", len),
            Self::UnsupportedSecurity(mode) => write!(f, "unsupported security mode: {}", mode),
            Self::UnsupportedNetworkType(kind) => {
                write!(f, "unsupported network type: {:?}", kind)
            }
            Self::UnknownNetworkId(id) => write!(f, "unknown network id: {}", id),
            Self::InvalidSetting(msg) => write!(f, "invalid setting: {}", msg),
            Self::InvalidFormat(msg) => write!(f, "invalid format: {}", msg),
            Self::UnknownValue(value) => write!(f, "unknown value: {}", value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Validation Tests ====================

    #[test]
    fn test_valid_wpa2_network() {
        let network =
            NetworkDescriptor::new("TestNetwork", SecurityMode::Wpa2Personal, "password123")
                .unwrap();
        assert_eq!(network.ssid, "TestNetwork");
        assert_eq!(network.password(), "password123");
        assert!(!network.is_open());
    }

    #[test]
    fn test_open_network() {
        let network = NetworkDescriptor::open("OpenNetwork").unwrap();
        assert!(network.is_open());
        assert_eq!(network.password(), "");
    }

    #[test]
    fn test_empty_ssid() {
        let result = NetworkDescriptor::new("", SecurityMode::Wpa2Personal, "password123");
        assert_eq!(result, Err(ConfigError::SsidEmpty));
    }

    #[test]
    fn test_ssid_too_long() {
        let result = NetworkDescriptor::open("a".repeat(33));
        assert!(matches!(result, Err(ConfigError::SsidTooLong { .. })));
    }

    #[test]
    fn test_ssid_max_length() {
        assert!(NetworkDescriptor::open("a".repeat(32)).is_ok());
    }

    #[test]
    fn test_open_network_rejects_password() {
        let result = NetworkDescriptor::new("Cafe", SecurityMode::Open, "secret123");
        assert_eq!(result, Err(ConfigError::PasswordNotAllowed));
    }

    #[test]
    fn test_wpa_password_bounds() {
        let short = NetworkDescriptor::new("Net", SecurityMode::WpaPersonal, "short");
        assert!(matches!(short, Err(ConfigError::PasswordTooShort { .. })));

        let long = NetworkDescriptor::new("Net", SecurityMode::Wpa3Personal, "a".repeat(65));
        assert!(matches!(long, Err(ConfigError::PasswordTooLong { .. })));

        assert!(NetworkDescriptor::new("Net", SecurityMode::Wpa2Personal, "12345678").is_ok());
        assert!(NetworkDescriptor::new("Net", SecurityMode::Wpa2Personal, "a".repeat(64)).is_ok());
    }

    #[test]
    fn test_wep_key_lengths() {
        assert!(NetworkDescriptor::new("Old", SecurityMode::Wep, "abcde").is_ok());
        assert!(NetworkDescriptor::new("Old", SecurityMode::Wep, "0123456789").is_ok());
        let bad = NetworkDescriptor::new("Old", SecurityMode::Wep, "abcdefg");
        assert_eq!(bad, Err(ConfigError::InvalidWepKey { len: 7 }));
        let not_hex = NetworkDescriptor::new("Old", SecurityMode::Wep, "zzzzzzzzzz");
        assert!(matches!(not_hex, Err(ConfigError::InvalidWepKey { .. })));
    }

    #[test]
    fn test_enterprise_unsupported() {
        let result = NetworkDescriptor::new("Corp", SecurityMode::Wpa2Enterprise, "password123");
        assert_eq!(
            result,
            Err(ConfigError::UnsupportedSecurity(SecurityMode::Wpa2Enterprise))
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let network =
            NetworkDescriptor::new("Home", SecurityMode::Wpa2Personal, "hunter22hunter").unwrap();
        let debug = format!("{:?}", network);
        assert!(debug.contains("Home"));
        assert!(!debug.contains("hunter22hunter"));
    }

    #[test]
    fn test_without_credentials() {
        let network =
            NetworkDescriptor::new("Home", SecurityMode::Wpa2Personal, "password123").unwrap();
        let stripped = network.without_credentials();
        assert_eq!(stripped.ssid, "Home");
        assert_eq!(stripped.password(), "");
        assert_eq!(stripped.security, SecurityMode::Wpa2Personal);
    }

    #[test]
    fn test_security_mode_parse() {
        assert_eq!("wpa2".parse::<SecurityMode>(), Ok(SecurityMode::Wpa2Personal));
        assert_eq!(
            SecurityMode::Wpa3Personal.to_string().parse::<SecurityMode>(),
            Ok(SecurityMode::Wpa3Personal)
        );
        assert!(matches!(
            "wpa9".parse::<SecurityMode>(),
            Err(ConfigError::UnknownValue(_))
        ));
    }

    // ==================== Serialization Tests ====================

    #[test]
    fn test_serialize_deserialize() {
        let network =
            NetworkDescriptor::new("MyNetwork", SecurityMode::Wpa2Personal, "MyPassword").unwrap();
        let restored = NetworkDescriptor::from_bytes(&network.to_bytes()).unwrap();
        assert_eq!(network, restored);
    }

    #[test]
    fn test_deserialize_empty() {
        let result = NetworkDescriptor::from_bytes(&[]);
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_deserialize_truncated() {
        // Security code, then an SSID that claims 5 bytes but only has 4
        let result = NetworkDescriptor::from_bytes(&[3, 5, b'h', b'e', b'l', b'l']);
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_deserialize_unknown_security() {
        let result = NetworkDescriptor::from_bytes(&[42, 1, b'x', 0]);
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }
}
