//! Reachability checks.
//!
//! Every check answers a single question, "is the endpoint available right
//! now", and never fails: network errors, missing binaries, timeouts and
//! parse errors are logged and reported as unavailable.

mod arp;
mod command;
mod http;
mod null;
mod ping;
mod ssh;
mod tcp;

use async_trait::async_trait;

pub use arp::ArpPresence;
pub use command::LocalCommand;
pub use http::HttpStatus;
pub use null::NullCheck;
pub use ping::{PingCheck, PingMethod};
pub use ssh::{DEFAULT_SSH_PORT, RemoteTarget, SshClient, remote_argv};
pub use tcp::TcpConnect;

#[async_trait]
pub trait ReachabilityCheck: Send + Sync {
    async fn is_available(&self) -> bool;

    /// Whether this check reads the shared ARP cache.
    fn uses_arp_cache(&self) -> bool {
        false
    }
}

/// A remote action that powers a device down.
#[async_trait]
pub trait ShutdownAction: Send + Sync {
    /// Returns `true` when the shutdown command reported success.
    async fn shutdown(&self) -> bool;
}

/// Split a user supplied command line the way a POSIX shell would.
///
/// Returns `None` (and logs) when the quoting is unbalanced or nothing is
/// left after splitting.
pub(crate) fn split_command(command: &str) -> Option<Vec<String>> {
    match shell_words::split(command) {
        Ok(argv) if !argv.is_empty() => Some(argv),
        Ok(_) => {
            tracing::warn!("Empty command");
            None
        }
        Err(e) => {
            tracing::warn!(command, error = %e, "Could not parse command");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_command_honors_quotes() {
        assert_eq!(
            split_command("/bin/sh -c 'test -f /tmp/x'"),
            Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "test -f /tmp/x".to_string()
            ])
        );
    }

    #[test]
    fn split_command_rejects_bad_input() {
        assert_eq!(split_command(""), None);
        assert_eq!(split_command("   "), None);
        assert_eq!(split_command("echo 'unterminated"), None);
    }
}
