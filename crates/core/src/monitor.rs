//! Per-device polling and status publication.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::check::{ReachabilityCheck, ShutdownAction};
use crate::device::{CheckContext, DeviceConfig, DeviceKind, StatusStyle};
use crate::mac::HardwareAddress;
use crate::wol::send_wol_packet;

pub const KEY_ACTIVE: &str = "active";
pub const KEY_STATUS: &str = "status";
pub const KEY_ON_OFF_STATE: &str = "onOffState";
pub const KEY_LAST_SEEN_AT: &str = "lastSeenAt";

pub const STATUS_ACTIVE: &str = "Active";
pub const STATUS_INACTIVE: &str = "Inactive";
pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";

/// Timestamp format used for `lastSeenAt`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Text(String),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Receives device state updates.
///
/// Called from whichever task polls the device; the scheduler polls devices
/// one after another.
pub trait StatusSink: Send + Sync {
    fn set_state(&self, device: &str, key: &str, value: StateValue);
}

/// Result of the most recent poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub available: bool,
    /// Text published for the device, e.g. `Active` or `off`.
    pub status: String,
    pub checked_at: DateTime<Local>,
}

pub struct DeviceMonitor {
    id: String,
    name: String,
    kind: DeviceKind,
    check: Arc<dyn ReachabilityCheck>,
    shutdown: Option<Arc<dyn ShutdownAction>>,
    wake: Option<HardwareAddress>,
    sink: Arc<dyn StatusSink>,
    last: RwLock<Option<Observation>>,
    /// Held while publishing so that retiring waits for in-flight writes.
    retired: Mutex<bool>,
}

impl fmt::Debug for DeviceMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceMonitor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("retired", &self.is_retired())
            .finish_non_exhaustive()
    }
}

impl DeviceMonitor {
    /// Build a monitor and its checks from configuration.
    pub fn new(config: &DeviceConfig, ctx: &CheckContext, sink: Arc<dyn StatusSink>) -> Self {
        let caps = config.spec.build(ctx);
        let mut monitor = Self::with_check(
            config.id.clone(),
            config.display_name(),
            config.spec.kind(),
            caps.check,
            sink,
        );
        monitor.shutdown = caps.shutdown;
        monitor.wake = caps.wake;
        monitor
    }

    /// Build a monitor around an existing check.
    pub fn with_check(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: DeviceKind,
        check: Arc<dyn ReachabilityCheck>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            check,
            shutdown: None,
            wake: None,
            sink,
            last: RwLock::new(None),
            retired: Mutex::new(false),
        }
    }

    pub fn with_shutdown(mut self, shutdown: Arc<dyn ShutdownAction>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn uses_arp_cache(&self) -> bool {
        self.check.uses_arp_cache()
    }

    /// Stop publishing state.
    ///
    /// Waits for a publish in progress to finish; nothing reaches the sink
    /// once this returns.
    pub fn retire(&self) {
        *self.retired.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn is_retired(&self) -> bool {
        *self.retired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn last_observation(&self) -> Option<Observation> {
        self.last.read().await.clone()
    }

    /// Check the device once and publish the result.
    ///
    /// Returns whether the device was available.
    pub async fn poll_once(&self) -> bool {
        if self.is_retired() {
            return false;
        }

        let available = self.check.is_available().await;
        if available {
            debug!(device = %self.name, "{} is AVAILABLE", self.name);
        } else {
            debug!(device = %self.name, "{} is UNAVAILABLE", self.name);
        }

        let now = Local::now();
        // The device may have been unregistered while the check was running.
        let Some(status) = self.publish_result(available, now) else {
            return available;
        };

        *self.last.write().await = Some(Observation {
            available,
            status: status.to_string(),
            checked_at: now,
        });

        available
    }

    /// Write the status fields for one result, unless retired.
    fn publish_result(&self, available: bool, now: DateTime<Local>) -> Option<&'static str> {
        let retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
        if *retired {
            return None;
        }

        let status = match self.kind.style() {
            StatusStyle::Presence => {
                let status = if available {
                    STATUS_ACTIVE
                } else {
                    STATUS_INACTIVE
                };
                self.publish(KEY_ACTIVE, available.into());
                self.publish(KEY_STATUS, status.into());
                if available {
                    self.publish(
                        KEY_LAST_SEEN_AT,
                        now.format(TIMESTAMP_FORMAT).to_string().into(),
                    );
                }
                status
            }
            StatusStyle::Relay => {
                let state = if available { STATE_ON } else { STATE_OFF };
                self.publish(KEY_ON_OFF_STATE, state.into());
                state
            }
        };
        Some(status)
    }

    /// Power the device on with a magic packet, when it has a hardware
    /// address to wake.
    pub async fn turn_on(&self) -> bool {
        let Some(address) = self.wake else {
            warn!(device = %self.name, "Not supported - Turn On");
            return false;
        };

        info!(device = %self.name, mac = %address, "Waking device");
        match send_wol_packet(address, None) {
            Ok(()) => true,
            Err(e) => {
                error!(device = %self.name, error = %e, "Could not wake device");
                false
            }
        }
    }

    /// Run the device's shutdown action.
    pub async fn turn_off(&self) -> bool {
        let Some(shutdown) = &self.shutdown else {
            warn!(device = %self.name, "Not supported - Turn Off");
            return false;
        };

        info!(device = %self.name, "Shutting down");
        let done = shutdown.shutdown().await;
        if !done {
            error!(device = %self.name, "Could not turn off remote server");
        }
        done
    }

    /// Turn off when last seen on, otherwise turn on.
    pub async fn toggle(&self) -> bool {
        let is_on = self
            .last_observation()
            .await
            .is_some_and(|observation| observation.available);

        if is_on {
            self.turn_off().await
        } else {
            self.turn_on().await
        }
    }

    fn publish(&self, key: &str, value: StateValue) {
        self.sink.set_state(&self.id, key, value);
    }
}
