//! Device kinds and the checks they are built from.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::arp::ArpCache;
use crate::check::{
    ArpPresence, DEFAULT_SSH_PORT, HttpStatus, LocalCommand, NullCheck, PingCheck, PingMethod,
    ReachabilityCheck, RemoteTarget, ShutdownAction, SshClient, TcpConnect,
};
use crate::mac::HardwareAddress;

pub const MACOS_STATUS_COMMAND: &str = "/usr/bin/true";
pub const MACOS_SHUTDOWN_COMMAND: &str = "/sbin/shutdown -h now";
pub const DEFAULT_TELNET_PORT: u16 = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// TCP connect to a service port.
    Service,
    Ping,
    Http,
    /// Presence in the local ARP table.
    Local,
    /// Local status command.
    Command,
    Ssh,
    Macos,
    Telnet,
    /// Tracked but never probed.
    Unmonitored,
}

/// Which status fields a device publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusStyle {
    /// `active` / `status`
    Presence,
    /// `onOffState`
    Relay,
}

impl DeviceKind {
    pub fn style(self) -> StatusStyle {
        match self {
            Self::Ssh | Self::Macos | Self::Telnet => StatusStyle::Relay,
            _ => StatusStyle::Presence,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Ping => "ping",
            Self::Http => "http",
            Self::Local => "local",
            Self::Command => "command",
            Self::Ssh => "ssh",
            Self::Macos => "macos",
            Self::Telnet => "telnet",
            Self::Unmonitored => "unmonitored",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind specific device settings.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceSpec {
    Service {
        address: String,
        port: u16,
    },
    Ping {
        address: String,
    },
    Http {
        url: String,
    },
    Local {
        /// Hardware address looked up in the ARP cache.
        address: String,
    },
    Command {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cmd_status: Option<String>,
    },
    Ssh {
        address: String,
        #[serde(default = "default_ssh_port")]
        port: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cmd_status: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cmd_shutdown: Option<String>,
        #[serde_as(as = "Option<DisplayFromStr>")]
        #[serde(skip_serializing_if = "Option::is_none")]
        mac_address: Option<HardwareAddress>,
    },
    Macos {
        address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde_as(as = "Option<DisplayFromStr>")]
        #[serde(skip_serializing_if = "Option::is_none")]
        mac_address: Option<HardwareAddress>,
    },
    Telnet {
        address: String,
        #[serde(default = "default_telnet_port")]
        port: u16,
        #[serde_as(as = "Option<DisplayFromStr>")]
        #[serde(skip_serializing_if = "Option::is_none")]
        mac_address: Option<HardwareAddress>,
    },
    Unmonitored,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_telnet_port() -> u16 {
    DEFAULT_TELNET_PORT
}

/// A device as registered with the scheduler.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub spec: DeviceSpec,
}

impl DeviceConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Settings shared by every check built for a scheduler.
#[derive(Debug, Clone)]
pub struct CheckContext {
    /// Socket, HTTP and ssh connect deadline. `None` defers to the OS.
    pub connection_timeout: Option<Duration>,
    /// Upper bound for any spawned status or shutdown command.
    pub command_timeout: Duration,
    pub ping: PingMethod,
    pub arp: Arc<ArpCache>,
}

/// What a device can do, as built from its [`DeviceSpec`].
pub struct Capabilities {
    pub check: Arc<dyn ReachabilityCheck>,
    pub shutdown: Option<Arc<dyn ShutdownAction>>,
    pub wake: Option<HardwareAddress>,
}

impl DeviceSpec {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Service { .. } => DeviceKind::Service,
            Self::Ping { .. } => DeviceKind::Ping,
            Self::Http { .. } => DeviceKind::Http,
            Self::Local { .. } => DeviceKind::Local,
            Self::Command { .. } => DeviceKind::Command,
            Self::Ssh { .. } => DeviceKind::Ssh,
            Self::Macos { .. } => DeviceKind::Macos,
            Self::Telnet { .. } => DeviceKind::Telnet,
            Self::Unmonitored => DeviceKind::Unmonitored,
        }
    }

    pub fn build(&self, ctx: &CheckContext) -> Capabilities {
        match self {
            Self::Service { address, port } => presence(Arc::new(TcpConnect::new(
                address.clone(),
                *port,
                ctx.connection_timeout,
            ))),
            Self::Ping { address } => presence(Arc::new(PingCheck::new(
                address.clone(),
                ctx.ping,
                ctx.command_timeout,
            ))),
            Self::Http { url } => presence(Arc::new(HttpStatus::new(
                url.clone(),
                ctx.connection_timeout,
                ctx.command_timeout,
            ))),
            Self::Local { address } => {
                presence(Arc::new(ArpPresence::new(address, ctx.arp.clone())))
            }
            Self::Command { cmd_status } => presence(Arc::new(LocalCommand::new(
                cmd_status.clone(),
                ctx.command_timeout,
            ))),
            Self::Ssh {
                address,
                port,
                username,
                cmd_status,
                cmd_shutdown,
                mac_address,
            } => {
                let target = RemoteTarget {
                    address: address.clone(),
                    port: *port,
                    username: username.clone(),
                };
                let mut client =
                    SshClient::new(target, ctx.connection_timeout, ctx.command_timeout);
                if let Some(command) = cmd_status {
                    client = client.with_status_command(command.clone());
                }
                if let Some(command) = cmd_shutdown {
                    client = client.with_shutdown_command(command.clone());
                }
                relay(client, *mac_address)
            }
            Self::Macos {
                address,
                username,
                mac_address,
            } => {
                let target = RemoteTarget {
                    address: address.clone(),
                    port: DEFAULT_SSH_PORT,
                    username: username.clone(),
                };
                let client = SshClient::new(target, ctx.connection_timeout, ctx.command_timeout)
                    .with_status_command(MACOS_STATUS_COMMAND)
                    .with_shutdown_command(MACOS_SHUTDOWN_COMMAND);
                relay(client, *mac_address)
            }
            Self::Telnet {
                address,
                port,
                mac_address,
            } => Capabilities {
                check: Arc::new(TcpConnect::new(
                    address.clone(),
                    *port,
                    ctx.connection_timeout,
                )),
                shutdown: None,
                wake: *mac_address,
            },
            Self::Unmonitored => presence(Arc::new(NullCheck)),
        }
    }
}

fn presence(check: Arc<dyn ReachabilityCheck>) -> Capabilities {
    Capabilities {
        check,
        shutdown: None,
        wake: None,
    }
}

fn relay(client: SshClient, wake: Option<HardwareAddress>) -> Capabilities {
    let client = Arc::new(client);
    Capabilities {
        check: client.clone(),
        shutdown: Some(client),
        wake,
    }
}
