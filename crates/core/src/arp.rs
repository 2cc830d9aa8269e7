//! In-memory view of the ARP table, used to detect "local" devices by
//! hardware address.
//!
//! The cache is rebuilt from an external table dump (`arp -a` by default, or
//! the neighbor table of a router reached over ssh). Entries are timestamped
//! when sighted and expire once they have not been seen for the configured
//! timeout.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::exec;
use crate::mac::HardwareAddress;

pub const DEFAULT_ARP_COMMAND: &[&str] = &["/usr/sbin/arp", "-a"];

/// Column of the hardware address in `arp -a` output, e.g.
/// `? (192.168.1.20) at 8c:85:90:4f:7f:73 on en0 ifscope [ethernet]`.
pub const DEFAULT_ADDRESS_COLUMN: usize = 3;

/// Where and how the ARP table is dumped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpSource {
    pub argv: Vec<String>,
    /// Whitespace separated field holding the hardware address.
    pub address_column: usize,
    pub command_timeout: Duration,
}

impl Default for ArpSource {
    fn default() -> Self {
        Self {
            argv: DEFAULT_ARP_COMMAND.iter().map(|s| s.to_string()).collect(),
            address_column: DEFAULT_ADDRESS_COLUMN,
            command_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The table was dumped; holds the number of addresses sighted.
    Updated(usize),
    /// Another refresh was already running the table command.
    Skipped,
    /// The table command could not be run or exited non-zero.
    Failed,
}

#[derive(Debug)]
pub struct ArpCache {
    source: ArpSource,
    timeout: Duration,
    /// Held while the table command runs; never waited on.
    command_lock: Mutex<()>,
    entries: RwLock<HashMap<HardwareAddress, Instant>>,
}

impl ArpCache {
    pub fn new(source: ArpSource, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            command_lock: Mutex::new(()),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Refresh from the system table, then drop expired entries.
    ///
    /// Eviction runs even when the refresh was skipped or failed.
    pub async fn rebuild(&self) -> RefreshOutcome {
        let outcome = self.refresh_from_system().await;
        let evicted = self.evict_stale().await;
        debug!(?outcome, evicted, "ARP cache rebuilt");
        outcome
    }

    pub async fn refresh_from_system(&self) -> RefreshOutcome {
        let stdout = {
            let Ok(_guard) = self.command_lock.try_lock() else {
                warn!(command = ?self.source.argv, "ARP table command already in use");
                return RefreshOutcome::Skipped;
            };

            debug!(command = ?self.source.argv, "Reading ARP table");
            match exec::run(&self.source.argv, self.source.command_timeout).await {
                Ok(output) if output.success() => output.stdout,
                Ok(output) => {
                    warn!(code = ?output.code, stderr = %output.stderr.trim(), "ARP table command failed");
                    return RefreshOutcome::Failed;
                }
                Err(e) => {
                    warn!(error = %e, "Could not read ARP table");
                    return RefreshOutcome::Failed;
                }
            }
        };

        RefreshOutcome::Updated(self.ingest(&stdout).await)
    }

    /// Record every address found in a table dump as seen now.
    ///
    /// Returns the number of addresses sighted.
    pub async fn ingest(&self, table: &str) -> usize {
        let sighted = parse_table(table, self.source.address_column);
        let now = Instant::now();

        let mut entries = self.entries.write().await;
        for addr in &sighted {
            debug!(address = %addr, "Device found");
            entries.insert(*addr, now);
        }

        sighted.len()
    }

    /// Remove every entry whose age has reached the timeout.
    pub async fn evict_stale(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let expired: Vec<HardwareAddress> = entries
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) >= self.timeout)
            .map(|(addr, _)| *addr)
            .collect();

        for addr in &expired {
            debug!(address = %addr, "Device expired");
            entries.remove(addr);
        }

        expired.len()
    }

    /// Whether `address` was seen within the timeout.
    ///
    /// Addresses that do not normalize are never active.
    pub async fn is_active(&self, address: &str) -> bool {
        match HardwareAddress::normalize(address) {
            Some(addr) => self.is_active_address(&addr).await,
            None => false,
        }
    }

    pub async fn is_active_address(&self, address: &HardwareAddress) -> bool {
        self.age(address)
            .await
            .is_some_and(|age| age < self.timeout)
    }

    /// Time since `address` was last sighted, if it is cached.
    pub async fn age(&self, address: &HardwareAddress) -> Option<Duration> {
        let entries = self.entries.read().await;
        entries.get(address).map(|seen| seen.elapsed())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Extract hardware addresses from table dump output.
///
/// Lines with too few fields or an unparseable address (such as
/// `(incomplete)`) are skipped.
pub fn parse_table(table: &str, column: usize) -> Vec<HardwareAddress> {
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(column))
        .filter_map(HardwareAddress::normalize)
        .collect()
}
