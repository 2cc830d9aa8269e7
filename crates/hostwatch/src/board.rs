use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use hostwatch_core::monitor::KEY_LAST_SEEN_AT;
use hostwatch_core::{StateValue, StatusSink};
use tracing::{debug, info};

type DeviceStates = BTreeMap<String, StateValue>;

/// デバイスごとの最新の状態を保持する。
///
/// 値が変化したときだけ INFO でログを出す。
#[derive(Debug, Default)]
pub struct StateBoard {
    states: Mutex<BTreeMap<String, DeviceStates>>,
}

impl StateBoard {
    pub fn device(&self, device: &str) -> DeviceStates {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device)
            .cloned()
            .unwrap_or_default()
    }
}

impl StatusSink for StateBoard {
    fn set_state(&self, device: &str, key: &str, value: StateValue) {
        let previous = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(device.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());

        // lastSeenAt は毎回変わるので遷移として扱わない
        if key == KEY_LAST_SEEN_AT || previous.as_ref() == Some(&value) {
            debug!(device, key, %value, "Device state");
        } else {
            info!(device, key, %value, "Device state changed");
        }
    }
}
