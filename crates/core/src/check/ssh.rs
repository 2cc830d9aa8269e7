use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ReachabilityCheck, ShutdownAction, TcpConnect, split_command};
use crate::exec::CommandRunner;

pub const SSH_COMMAND: &str = "ssh";
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A host reached over ssh.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemoteTarget {
    pub address: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Remote login name. Empty or absent runs as the local user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl RemoteTarget {
    fn login(&self) -> Option<&str> {
        self.username.as_deref().filter(|name| !name.is_empty())
    }
}

/// Build the argv that runs `command` on `target`.
///
/// stdin is detached and no TTY, X11 forwarding or prompts are allowed, so a
/// missing key or unknown host fails instead of hanging.
pub fn remote_argv(
    target: &RemoteTarget,
    connect_timeout: Option<Duration>,
    command: &[String],
) -> Vec<String> {
    let mut argv = vec![
        SSH_COMMAND.to_string(),
        "-anTxq".to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
    ];

    if let Some(timeout) = connect_timeout {
        argv.push("-o".to_string());
        argv.push(format!("ConnectTimeout={}", timeout.as_secs().max(1)));
    }

    if let Some(username) = target.login() {
        argv.push("-l".to_string());
        argv.push(username.to_string());
    }

    argv.push("-p".to_string());
    argv.push(target.port.to_string());
    argv.push(target.address.clone());
    argv.extend(command.iter().cloned());
    argv
}

/// Runs status and shutdown commands on a remote host.
///
/// Without a status command the host is checked with a plain TCP connect to
/// its ssh port.
#[derive(Debug)]
pub struct SshClient {
    target: RemoteTarget,
    status_command: Option<String>,
    shutdown_command: Option<String>,
    connect_timeout: Option<Duration>,
    runner: CommandRunner,
    fallback: TcpConnect,
}

impl SshClient {
    pub fn new(target: RemoteTarget, connect_timeout: Option<Duration>, command_timeout: Duration) -> Self {
        let fallback = TcpConnect::new(target.address.clone(), target.port, connect_timeout);
        Self {
            target,
            status_command: None,
            shutdown_command: None,
            connect_timeout,
            runner: CommandRunner::new(command_timeout),
            fallback,
        }
    }

    pub fn with_status_command(mut self, command: impl Into<String>) -> Self {
        self.status_command = Some(command.into());
        self
    }

    pub fn with_shutdown_command(mut self, command: impl Into<String>) -> Self {
        self.shutdown_command = Some(command.into());
        self
    }

    async fn remote_exec(&self, command: &str) -> bool {
        let Some(command) = split_command(command) else {
            return false;
        };

        match self.target.login() {
            Some(username) => debug!(username, "Running as remote user"),
            None => debug!("Running as local user"),
        }

        let argv = remote_argv(&self.target, self.connect_timeout, &command);
        self.runner.execute(&argv).await
    }
}

#[async_trait]
impl ReachabilityCheck for SshClient {
    async fn is_available(&self) -> bool {
        debug!(address = %self.target.address, command = ?self.status_command, "Checking remote status");

        match &self.status_command {
            Some(command) => self.remote_exec(command).await,
            None => self.fallback.is_available().await,
        }
    }
}

#[async_trait]
impl ShutdownAction for SshClient {
    async fn shutdown(&self) -> bool {
        let Some(command) = &self.shutdown_command else {
            warn!(address = %self.target.address, "No shutdown command configured");
            return false;
        };

        debug!(address = %self.target.address, command, "Sending shutdown command");
        self.remote_exec(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(username: Option<&str>) -> RemoteTarget {
        RemoteTarget {
            address: "server.lan".to_string(),
            port: 2222,
            username: username.map(str::to_string),
        }
    }

    #[test]
    fn argv_with_user_and_timeout() {
        let argv = remote_argv(
            &target(Some("admin")),
            Some(Duration::from_secs(5)),
            &["/usr/bin/true".to_string()],
        );
        assert_eq!(
            argv,
            vec![
                "ssh",
                "-anTxq",
                "-o",
                "BatchMode=yes",
                "-o",
                "ConnectTimeout=5",
                "-l",
                "admin",
                "-p",
                "2222",
                "server.lan",
                "/usr/bin/true"
            ]
        );
    }

    #[test]
    fn argv_runs_as_local_user_when_username_is_blank() {
        for username in [None, Some("")] {
            let argv = remote_argv(&target(username), None, &["uptime".to_string()]);
            assert!(!argv.contains(&"-l".to_string()));
            assert_eq!(argv.last().map(String::as_str), Some("uptime"));
        }
    }

    #[test]
    fn target_defaults_to_port_22() {
        let target: RemoteTarget = toml::from_str(r#"address = "router.lan""#).unwrap();
        assert_eq!(target.port, 22);
        assert_eq!(target.username, None);
    }

    #[tokio::test]
    async fn shutdown_without_command_fails() {
        let client = SshClient::new(target(None), None, Duration::from_secs(1));
        assert!(!client.shutdown().await);
    }

    #[tokio::test]
    async fn unparseable_status_command_is_unavailable() {
        let client = SshClient::new(target(None), None, Duration::from_secs(1))
            .with_status_command("echo 'unterminated");
        assert!(!client.is_available().await);
    }
}
