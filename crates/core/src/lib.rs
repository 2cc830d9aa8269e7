//! Availability polling for network attached devices.
//!
//! A [`PollScheduler`] owns one [`DeviceMonitor`] per device. Each cycle it
//! rebuilds the shared [`ArpCache`] (when a device looks itself up there) and
//! polls every monitor, which runs its [`ReachabilityCheck`] and publishes the
//! result through a [`StatusSink`].

pub mod arp;
pub mod check;
pub mod device;
pub mod exec;
pub mod mac;
pub mod monitor;
pub mod scheduler;
pub mod wol;

pub use arp::{ArpCache, ArpSource, RefreshOutcome};
pub use check::{PingMethod, ReachabilityCheck, RemoteTarget, ShutdownAction};
pub use device::{CheckContext, DeviceConfig, DeviceKind, DeviceSpec, StatusStyle};
pub use mac::HardwareAddress;
pub use monitor::{DeviceMonitor, Observation, StateValue, StatusSink};
pub use scheduler::{DeviceSnapshot, PollScheduler, SchedulerError, SchedulerState};
