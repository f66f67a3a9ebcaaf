//! Connectivity facts and the shared status snapshot.
//!
//! [`ConnectivityFacts`] is written once per settle pass by the manager and
//! read everywhere else. [`SharedStatus`] publishes the facts plus mode/state
//! detail for readers outside the dispatcher context; readers see an
//! eventually-consistent snapshot, never a transaction.

use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

const IPV4_INTERNET: u8 = 1 << 0;
const IPV6_INTERNET: u8 = 1 << 1;
const SERVICE_CONNECTIVITY: u8 = 1 << 2;
const SERVICE_TUNNEL_STARTED: u8 = 1 << 3;
const SCAN_IN_PROGRESS: u8 = 1 << 4;
const AWAITING_CONNECTIVITY: u8 = 1 << 5;

/// Boolean connectivity facts derived by the aggregator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectivityFacts {
    pub ipv4_internet: bool,
    pub ipv6_internet: bool,
    pub service_connectivity: bool,
    pub service_tunnel_started: bool,
    pub scan_in_progress: bool,
    pub awaiting_connectivity: bool,
}

impl ConnectivityFacts {
    /// True if either address family has internet reachability.
    pub fn has_internet(&self) -> bool {
        self.ipv4_internet || self.ipv6_internet
    }

    /// Pack into a bitset for lock-free publication.
    pub fn to_bits(self) -> u8 {
        let mut bits = 0;
        if self.ipv4_internet {
            bits |= IPV4_INTERNET;
        }
        if self.ipv6_internet {
            bits |= IPV6_INTERNET;
        }
        if self.service_connectivity {
            bits |= SERVICE_CONNECTIVITY;
        }
        if self.service_tunnel_started {
            bits |= SERVICE_TUNNEL_STARTED;
        }
        if self.scan_in_progress {
            bits |= SCAN_IN_PROGRESS;
        }
        if self.awaiting_connectivity {
            bits |= AWAITING_CONNECTIVITY;
        }
        bits
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            ipv4_internet: bits & IPV4_INTERNET != 0,
            ipv6_internet: bits & IPV6_INTERNET != 0,
            service_connectivity: bits & SERVICE_CONNECTIVITY != 0,
            service_tunnel_started: bits & SERVICE_TUNNEL_STARTED != 0,
            scan_in_progress: bits & SCAN_IN_PROGRESS != 0,
            awaiting_connectivity: bits & AWAITING_CONNECTIVITY != 0,
        }
    }
}

/// Mode and state detail published alongside the facts.
///
/// Enum values are rendered with their `Display` names so the JSON matches
/// the log output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub station_mode: String,
    pub station_state: String,
    pub station_provisioned: bool,
    pub ap_mode: String,
    pub ap_state: String,
    pub ap_clients: u32,
    pub tunnel_mode: String,
    pub provisioning_state: String,
    pub facts: ConnectivityFacts,
}

#[derive(Debug, Default)]
struct StatusInner {
    facts: AtomicU8,
    detail: RwLock<StatusSnapshot>,
}

/// Read-mostly status shared with other execution contexts.
///
/// Only the dispatcher publishes. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct SharedStatus {
    inner: Arc<StatusInner>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current facts. Lock-free.
    pub fn facts(&self) -> ConnectivityFacts {
        ConnectivityFacts::from_bits(self.inner.facts.load(Ordering::Acquire))
    }

    /// Copy of the latest published snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        let mut snapshot = self
            .inner
            .detail
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        snapshot.facts = self.facts();
        snapshot
    }

    pub(crate) fn publish(&self, snapshot: StatusSnapshot) {
        self.inner
            .facts
            .store(snapshot.facts.to_bits(), Ordering::Release);
        *self.inner.detail.write().unwrap_or_else(|e| e.into_inner()) = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_roundtrip_each_flag() {
        let facts = ConnectivityFacts {
            ipv6_internet: true,
            scan_in_progress: true,
            ..Default::default()
        };
        assert_eq!(facts.to_bits(), IPV6_INTERNET | SCAN_IN_PROGRESS);
        assert_eq!(ConnectivityFacts::from_bits(facts.to_bits()), facts);
    }

    #[test]
    fn test_has_internet() {
        assert!(!ConnectivityFacts::default().has_internet());
        let facts = ConnectivityFacts {
            ipv4_internet: true,
            ..Default::default()
        };
        assert!(facts.has_internet());
    }

    #[test]
    fn test_shared_status_publish() {
        let status = SharedStatus::new();
        let reader = status.clone();
        assert_eq!(reader.facts(), ConnectivityFacts::default());

        let snapshot = StatusSnapshot {
            station_state: "connected".to_string(),
            facts: ConnectivityFacts {
                ipv4_internet: true,
                ..Default::default()
            },
            ..Default::default()
        };
        status.publish(snapshot);

        assert!(reader.facts().ipv4_internet);
        assert_eq!(reader.snapshot().station_state, "connected");
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_string(&StatusSnapshot::default()).unwrap();
        assert!(json.contains("\"facts\":{"));
        assert!(json.contains("\"ipv4_internet\":false"));
    }
}
