use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use super::ReachabilityCheck;

/// Available when a TCP connection to `address:port` can be opened.
#[derive(Debug, Clone)]
pub struct TcpConnect {
    address: String,
    port: u16,
    /// `None` leaves the deadline to the operating system.
    timeout: Option<Duration>,
}

impl TcpConnect {
    pub fn new(address: impl Into<String>, port: u16, timeout: Option<Duration>) -> Self {
        Self {
            address: address.into(),
            port,
            timeout,
        }
    }

    async fn connect(&self) -> std::io::Result<TcpStream> {
        let connect = TcpStream::connect((self.address.as_str(), self.port));
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))?,
            None => connect.await,
        }
    }
}

#[async_trait]
impl ReachabilityCheck for TcpConnect {
    async fn is_available(&self) -> bool {
        debug!(address = %self.address, port = self.port, "Checking host");

        match self.connect().await {
            Ok(stream) => {
                drop(stream);
                true
            }
            Err(e) => {
                debug!(address = %self.address, port = self.port, error = %e, "Connection failed");
                false
            }
        }
    }
}
