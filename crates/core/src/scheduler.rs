//! The polling loop.
//!
//! One background task rebuilds the ARP cache (when some device reads it) and
//! then polls every registered device in turn, sleeping for the configured
//! interval between cycles. Stop requests are observed before each cycle and
//! interrupt the sleep.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::arp::{ArpCache, RefreshOutcome};
use crate::device::{CheckContext, DeviceConfig, DeviceKind};
use crate::monitor::{DeviceMonitor, Observation, StatusSink};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,
    #[error("Unknown device: {0}")]
    UnknownDevice(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    /// A stop was requested; the loop exits at its next safe point.
    Stopping,
}

/// Latest known state of one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    pub observation: Option<Observation>,
}

pub struct PollScheduler {
    devices: RwLock<BTreeMap<String, Arc<DeviceMonitor>>>,
    context: CheckContext,
    sink: Arc<dyn StatusSink>,
    interval: Duration,
    state: watch::Sender<SchedulerState>,
}

impl PollScheduler {
    pub fn new(context: CheckContext, sink: Arc<dyn StatusSink>, interval: Duration) -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            context,
            sink,
            interval,
            state: watch::Sender::new(SchedulerState::Stopped),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn arp(&self) -> &Arc<ArpCache> {
        &self.context.arp
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Build a monitor for `config` and register it.
    pub async fn on_device_start(&self, config: &DeviceConfig) -> Arc<DeviceMonitor> {
        let monitor = Arc::new(DeviceMonitor::new(config, &self.context, self.sink.clone()));
        self.register_device(monitor.clone()).await;
        monitor
    }

    /// Register a monitor, replacing (and retiring) any monitor with the same id.
    pub async fn register_device(&self, monitor: Arc<DeviceMonitor>) {
        info!(
            device = monitor.id(),
            name = monitor.name(),
            kind = %monitor.kind(),
            "Registering device"
        );

        let previous = self
            .devices
            .write()
            .await
            .insert(monitor.id().to_string(), monitor);
        if let Some(previous) = previous {
            previous.retire();
        }
    }

    /// Unregister a device. Its monitor publishes nothing afterwards, even if
    /// a poll is in flight.
    pub async fn on_device_stop(&self, id: &str) -> Option<Arc<DeviceMonitor>> {
        let removed = self.devices.write().await.remove(id);
        match &removed {
            Some(monitor) => {
                monitor.retire();
                info!(device = id, "Unregistered device");
            }
            None => debug!(device = id, "Device was not registered"),
        }
        removed
    }

    pub async fn device(&self, id: &str) -> Result<Arc<DeviceMonitor>> {
        self.devices
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownDevice(id.to_string()))
    }

    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Run one cycle: rebuild the ARP cache if needed, then poll every device.
    ///
    /// Returns the number of devices polled.
    pub async fn run_cycle(&self) -> usize {
        let monitors: Vec<_> = self.devices.read().await.values().cloned().collect();

        if monitors.iter().any(|monitor| monitor.uses_arp_cache()) {
            match self.context.arp.rebuild().await {
                RefreshOutcome::Updated(count) => debug!(count, "ARP cache rebuilt"),
                outcome => debug!(?outcome, "ARP cache not refreshed"),
            }
        }

        let mut polled = 0;
        for monitor in monitors {
            if monitor.is_retired() {
                continue;
            }
            monitor.poll_once().await;
            polled += 1;
        }
        polled
    }

    /// Start the background loop.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let started = self.state.send_if_modified(|state| {
            if *state == SchedulerState::Stopped {
                *state = SchedulerState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(SchedulerError::AlreadyRunning);
        }

        Ok(tokio::spawn(self.clone().run_loop()))
    }

    /// Ask the loop to stop. Returns `false` when it was not running.
    pub fn request_stop(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == SchedulerState::Running {
                *state = SchedulerState::Stopping;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the loop has stopped.
    pub async fn stopped(&self) {
        let mut rx = self.state.subscribe();
        while *rx.borrow_and_update() != SchedulerState::Stopped {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    async fn run_loop(self: Arc<Self>) {
        let mut state_rx = self.state.subscribe();
        info!(interval = ?self.interval, "Starting poll loop");

        while self.state() == SchedulerState::Running {
            let polled = self.run_cycle().await;
            debug!(polled, "Poll cycle finished");

            if self.state() != SchedulerState::Running {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = state_rx.changed() => {}
            }
        }

        self.state.send_replace(SchedulerState::Stopped);
        info!("Poll loop stopped");
    }

    /// Poll one device now and return whether it is available.
    pub async fn request_status(&self, id: &str) -> Result<bool> {
        let monitor = self.device(id).await?;
        if monitor.uses_arp_cache() {
            self.context.arp.rebuild().await;
        }
        Ok(monitor.poll_once().await)
    }

    pub async fn turn_on(&self, id: &str) -> Result<bool> {
        Ok(self.device(id).await?.turn_on().await)
    }

    pub async fn turn_off(&self, id: &str) -> Result<bool> {
        Ok(self.device(id).await?.turn_off().await)
    }

    pub async fn toggle(&self, id: &str) -> Result<bool> {
        Ok(self.device(id).await?.toggle().await)
    }

    /// Latest observation of every registered device, ordered by id.
    pub async fn snapshot(&self) -> Vec<DeviceSnapshot> {
        let monitors: Vec<_> = self.devices.read().await.values().cloned().collect();

        let mut snapshot = Vec::with_capacity(monitors.len());
        for monitor in monitors {
            snapshot.push(DeviceSnapshot {
                id: monitor.id().to_string(),
                name: monitor.name().to_string(),
                kind: monitor.kind(),
                observation: monitor.last_observation().await,
            });
        }
        snapshot
    }
}
