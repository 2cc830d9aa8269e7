pub mod validate;

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use hostwatch_core::arp::{DEFAULT_ADDRESS_COLUMN, DEFAULT_ARP_COMMAND};
use hostwatch_core::check::remote_argv;
use hostwatch_core::{
    ArpCache, ArpSource, CheckContext, DeviceConfig, DeviceSpec, PingMethod, RemoteTarget,
};
use serde::{Deserialize, Serialize};

pub use validate::{FieldErrors, RawValues, validate_device, validate_prefs};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub arp: ArpConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// ポーリング全体の設定。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 1 サイクルごとの待機時間
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    /// TCP / HTTP / ssh の接続タイムアウト。0 の場合は OS の既定値に任せる。
    #[serde(with = "humantime_serde")]
    pub connection_timeout: Duration,
    /// ステータス確認やシャットダウンのために起動するコマンドの上限時間
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
    pub ping: PingMethod,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(180),
            connection_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(30),
            ping: PingMethod::default(),
        }
    }
}

/// ARP テーブルの取得方法。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ArpConfig {
    pub command: Vec<String>,
    /// ハードウェアアドレスが含まれる列 (空白区切り、0 始まり)
    pub address_column: usize,
    /// 最後に見えてからこの時間が経過したエントリは削除される
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
    /// 設定されている場合、コマンドはこのホスト上で ssh 経由で実行される
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteTarget>,
}

impl Default for ArpConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_ARP_COMMAND.iter().map(|s| s.to_string()).collect(),
            address_column: DEFAULT_ADDRESS_COLUMN,
            timeout: Duration::from_secs(300),
            command_timeout: Duration::from_secs(30),
            remote: None,
        }
    }
}

impl ArpConfig {
    pub fn source(&self, connection_timeout: Option<Duration>) -> ArpSource {
        let argv = match &self.remote {
            Some(remote) => remote_argv(remote, connection_timeout, &self.command),
            None => self.command.clone(),
        };

        ArpSource {
            argv,
            address_column: self.address_column,
            command_timeout: self.command_timeout,
        }
    }
}

impl Config {
    pub fn connection_timeout(&self) -> Option<Duration> {
        Some(self.monitor.connection_timeout).filter(|timeout| !timeout.is_zero())
    }

    /// 設定から ARP キャッシュを含むチェック用コンテキストを作成する。
    pub fn check_context(&self) -> CheckContext {
        let connection_timeout = self.connection_timeout();
        let cache = ArpCache::new(self.arp.source(connection_timeout), self.arp.timeout);

        CheckContext {
            connection_timeout,
            command_timeout: self.monitor.command_timeout,
            ping: self.monitor.ping,
            arp: Arc::new(cache),
        }
    }

    pub fn find_device(&self, id: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// 全体設定と各デバイスの設定を検証する。
    ///
    /// エラーがあった場合はデバイス ID とフィールドをまとめたメッセージを返す。
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        let prefs = validate_prefs(&RawValues::from([
            (
                "refresh_interval".to_string(),
                self.monitor.refresh_interval.as_secs().to_string(),
            ),
            (
                "connection_timeout".to_string(),
                self.monitor.connection_timeout.as_secs().to_string(),
            ),
            (
                "command_timeout".to_string(),
                self.monitor.command_timeout.as_secs().to_string(),
            ),
            (
                "arp_command_timeout".to_string(),
                self.arp.command_timeout.as_secs().to_string(),
            ),
        ]));
        if !prefs.is_empty() {
            problems.push(format!("monitor: {prefs}"));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.id.trim().is_empty() {
                problems.push("device with an empty id".to_string());
                continue;
            }
            if !seen.insert(device.id.as_str()) {
                problems.push(format!("device `{}`: duplicate id", device.id));
            }

            let values = raw_values(&device.spec)
                .with_context(|| format!("Failed to inspect device `{}`", device.id))?;
            let errors = validate_device(device.spec.kind(), &values);
            if !errors.is_empty() {
                problems.push(format!("device `{}`: {errors}", device.id));
            }
        }

        if !problems.is_empty() {
            bail!("Invalid configuration: {}", problems.join("; "));
        }
        Ok(())
    }
}

/// デバイス設定を検証用の文字列マップに変換する。
fn raw_values(spec: &DeviceSpec) -> Result<RawValues> {
    let toml::Value::Table(table) = toml::Value::try_from(spec)? else {
        bail!("Device settings are not a table");
    };

    Ok(table
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

pub fn open_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
    let config: Config = toml::from_str(&content).context("Failed to parse configuration file")?;
    Ok(config)
}

pub fn write_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = Config {
        devices: vec![DeviceConfig {
            id: "example-server".to_string(),
            name: Some("Example server".to_string()),
            spec: DeviceSpec::Service {
                address: "192.168.1.100".to_string(),
                port: 22,
            },
        }],
        ..Default::default()
    };
    let content = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
    fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
    Ok(())
}
