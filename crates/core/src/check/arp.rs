use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::ReachabilityCheck;
use crate::arp::ArpCache;
use crate::mac::HardwareAddress;

/// Available while the hardware address has a fresh entry in the ARP cache.
#[derive(Debug, Clone)]
pub struct ArpPresence {
    /// `None` when the configured address could not be normalized.
    address: Option<HardwareAddress>,
    cache: Arc<ArpCache>,
}

impl ArpPresence {
    pub fn new(address: &str, cache: Arc<ArpCache>) -> Self {
        let normalized = HardwareAddress::normalize(address);
        if normalized.is_none() {
            warn!(address, "Invalid hardware address, device will never be active");
        }

        Self {
            address: normalized,
            cache,
        }
    }
}

#[async_trait]
impl ReachabilityCheck for ArpPresence {
    async fn is_available(&self) -> bool {
        let Some(address) = &self.address else {
            return false;
        };

        debug!(address = %address, "Checking ARP table for device");
        self.cache.is_active_address(address).await
    }

    fn uses_arp_cache(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::arp::ArpSource;

    #[tokio::test(start_paused = true)]
    async fn follows_cache_state() {
        let cache = Arc::new(ArpCache::new(ArpSource::default(), Duration::from_secs(60)));
        let check = ArpPresence::new("8c:85:90:4f:7f:73", cache.clone());
        assert!(!check.is_available().await);

        cache
            .ingest("? (192.168.1.20) at 8c:85:90:4f:7f:73 on en0 ifscope [ethernet]")
            .await;
        assert!(check.is_available().await);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!check.is_available().await);
    }

    #[tokio::test]
    async fn invalid_address_is_never_available() {
        let cache = Arc::new(ArpCache::new(ArpSource::default(), Duration::from_secs(60)));
        let check = ArpPresence::new("not-a-mac", cache);
        assert!(!check.is_available().await);
        assert!(check.uses_arp_cache());
    }
}
