use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::ReachabilityCheck;

/// Available when a GET on the URL ends in a 2xx status.
///
/// Redirects are followed by the client, so a redirect to a healthy page
/// counts as available. Server errors and transport errors are both reported
/// as unavailable.
#[derive(Debug, Clone)]
pub struct HttpStatus {
    url: String,
    /// `None` when the client could not be built; the check then always
    /// reports unavailable.
    client: Option<reqwest::Client>,
}

impl HttpStatus {
    /// `connect_timeout` bounds the whole request when set. Without it the
    /// connect is left to the operating system and the request as a whole is
    /// still cut off after `request_timeout`.
    pub fn new(
        url: impl Into<String>,
        connect_timeout: Option<Duration>,
        request_timeout: Duration,
    ) -> Self {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("hostwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(connect_timeout.unwrap_or(request_timeout));
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder
            .build()
            .inspect_err(|e| warn!(error = %e, "Failed to create HTTP client"))
            .ok();

        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl ReachabilityCheck for HttpStatus {
    async fn is_available(&self) -> bool {
        debug!(url = %self.url, "Connecting to URL");

        let Some(client) = &self.client else {
            return false;
        };

        match client.get(&self.url).send().await {
            Ok(response) => {
                let status = response.status();
                debug!(url = %self.url, status = status.as_u16(), "HTTP status");
                status.is_success()
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "HTTP request failed");
                false
            }
        }
    }
}
