use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tracing::debug;

use super::ReachabilityCheck;
use crate::exec::CommandRunner;

pub const DEFAULT_PING_COMMAND: &str = "ping";

/// How an echo request is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PingMethod {
    /// Run the system `ping` binary with a count of one.
    #[default]
    Command,
    /// Send the echo request from this process. Needs raw socket privileges.
    Icmp,
}

/// Available when a single echo request is answered.
#[derive(Debug)]
pub struct PingCheck {
    address: String,
    method: PingMethod,
    program: String,
    runner: CommandRunner,
}

impl PingCheck {
    pub fn new(address: impl Into<String>, method: PingMethod, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            method,
            program: DEFAULT_PING_COMMAND.to_string(),
            runner: CommandRunner::new(timeout),
        }
    }

    /// Use a different `ping` binary for [`PingMethod::Command`].
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn argv(&self) -> Vec<String> {
        vec![
            self.program.clone(),
            "-c".to_string(),
            "1".to_string(),
            self.address.clone(),
        ]
    }

    async fn echo(&self) -> bool {
        let resolved = tokio::time::timeout(self.runner.timeout(), resolve(&self.address)).await;
        let Ok(Some(addr)) = resolved else {
            return false;
        };

        let config = match addr {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };
        let client = match Client::new(&config) {
            Ok(client) => client,
            Err(e) => {
                debug!(error = %e, "Failed to open ICMP socket");
                return false;
            }
        };

        let mut pinger = client.pinger(addr, PingIdentifier(rand_id())).await;
        pinger.timeout(self.runner.timeout());

        pinger.ping(PingSequence(0), &[]).await.is_ok()
    }
}

#[async_trait]
impl ReachabilityCheck for PingCheck {
    async fn is_available(&self) -> bool {
        debug!(address = %self.address, method = ?self.method, "Pinging address");

        match self.method {
            PingMethod::Command => self.runner.execute(&self.argv()).await,
            PingMethod::Icmp => self.echo().await,
        }
    }
}

async fn resolve(host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }

    match tokio::net::lookup_host((host, 0)).await {
        Ok(mut addrs) => addrs.next().map(|addr| addr.ip()),
        Err(e) => {
            debug!(host, error = %e, "Failed to resolve host");
            None
        }
    }
}

fn rand_id() -> u16 {
    use std::time::SystemTime;
    let duration = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    (duration.as_nanos() & 0xFFFF) as u16
}
