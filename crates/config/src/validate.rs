//! 文字列キーの生の値マップに対するフィールド検証。
//!
//! 各バリデータは問題のあったキーに対してメッセージを [`FieldErrors`] に記録し、
//! 検証に通ったかどうかを返す。

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;

use hostwatch_core::{DeviceKind, HardwareAddress};
use regex::Regex;
use url::Url;

/// 検証対象の値。キーが存在しない場合は未設定として扱う。
pub type RawValues = BTreeMap<String, String>;

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*\.?$")
        .unwrap()
});

pub const MIN_REFRESH_INTERVAL: i64 = 1;
pub const MAX_REFRESH_INTERVAL: i64 = 3600;
pub const MIN_CONNECTION_TIMEOUT: i64 = 0;
pub const MAX_CONNECTION_TIMEOUT: i64 = 300;
pub const MIN_COMMAND_TIMEOUT: i64 = 1;
pub const MIN_PORT: i64 = 1;
pub const MAX_PORT: i64 = 65535;

/// キーごとのエラーメッセージ。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, message: String) {
        self.0.insert(key.to_string(), message);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.values().map(String::as_str).collect();
        f.write_str(&messages.join(", "))
    }
}

pub fn validate_string(key: &str, values: &RawValues, errors: &mut FieldErrors, empty_ok: bool) -> bool {
    let Some(value) = values.get(key) else {
        errors.insert(key, format!("{key} cannot be empty"));
        return false;
    };

    if !empty_ok && value.is_empty() {
        errors.insert(key, format!("{key} cannot be blank"));
        return false;
    }

    true
}

pub fn validate_int(
    key: &str,
    values: &RawValues,
    errors: &mut FieldErrors,
    min: Option<i64>,
    max: Option<i64>,
) -> bool {
    let Some(value) = values.get(key) else {
        errors.insert(key, format!("{key} is required"));
        return false;
    };

    let Ok(value) = value.trim().parse::<i64>() else {
        errors.insert(key, format!("{key} must be an integer"));
        return false;
    };

    if let Some(min) = min
        && value < min
    {
        errors.insert(key, format!("{key} must be greater than or equal to {min}"));
        return false;
    }

    if let Some(max) = max
        && value > max
    {
        errors.insert(key, format!("{key} must be less than or equal to {max}"));
        return false;
    }

    true
}

/// DNS 名または IP アドレスであることを確認する。URL や MAC アドレスは拒否する。
pub fn validate_hostname(key: &str, values: &RawValues, errors: &mut FieldErrors) -> bool {
    if !validate_string(key, values, errors, false) {
        return false;
    }

    let value = &values[key];
    if value.parse::<IpAddr>().is_ok() || HOSTNAME.is_match(value) {
        return true;
    }

    errors.insert(key, format!("{key} must be a hostname or IP address"));
    false
}

/// `:` または `-` で区切られた 2 桁 16 進数 6 組であることを確認する。
pub fn validate_mac(key: &str, values: &RawValues, errors: &mut FieldErrors) -> bool {
    if !validate_string(key, values, errors, false) {
        return false;
    }

    if values[key].parse::<HardwareAddress>().is_ok() {
        return true;
    }

    errors.insert(key, format!("{key} must be a hardware address"));
    false
}

pub fn validate_url(key: &str, values: &RawValues, errors: &mut FieldErrors) -> bool {
    if !validate_string(key, values, errors, false) {
        return false;
    }

    match Url::parse(&values[key]) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => true,
        _ => {
            errors.insert(key, format!("{key} must be an http or https URL"));
            false
        }
    }
}

/// 全体設定の間隔とタイムアウト (単位は秒) を検証する。
///
/// コマンドのタイムアウトは 0 だと即座に打ち切られるため 1 秒以上とする。
pub fn validate_prefs(values: &RawValues) -> FieldErrors {
    let mut errors = FieldErrors::new();
    validate_int(
        "refresh_interval",
        values,
        &mut errors,
        Some(MIN_REFRESH_INTERVAL),
        Some(MAX_REFRESH_INTERVAL),
    );
    validate_int(
        "connection_timeout",
        values,
        &mut errors,
        Some(MIN_CONNECTION_TIMEOUT),
        Some(MAX_CONNECTION_TIMEOUT),
    );
    for key in ["command_timeout", "arp_command_timeout"] {
        validate_int(key, values, &mut errors, Some(MIN_COMMAND_TIMEOUT), None);
    }
    errors
}

/// デバイス種別ごとの必須フィールドを検証する。
pub fn validate_device(kind: DeviceKind, values: &RawValues) -> FieldErrors {
    let mut errors = FieldErrors::new();

    match kind {
        DeviceKind::Service => {
            validate_hostname("address", values, &mut errors);
            validate_port(values, &mut errors);
        }
        DeviceKind::Ping => {
            validate_hostname("address", values, &mut errors);
        }
        DeviceKind::Http => {
            validate_url("url", values, &mut errors);
        }
        DeviceKind::Local => {
            validate_mac("address", values, &mut errors);
        }
        DeviceKind::Command => {
            validate_optional_string("cmd_status", values, &mut errors);
        }
        DeviceKind::Ssh => {
            validate_hostname("address", values, &mut errors);
            validate_port(values, &mut errors);
            validate_optional_string("cmd_status", values, &mut errors);
            validate_optional_string("cmd_shutdown", values, &mut errors);
            validate_optional_mac(values, &mut errors);
        }
        DeviceKind::Macos => {
            validate_hostname("address", values, &mut errors);
            validate_optional_mac(values, &mut errors);
        }
        DeviceKind::Telnet => {
            validate_hostname("address", values, &mut errors);
            validate_port(values, &mut errors);
            validate_optional_mac(values, &mut errors);
        }
        DeviceKind::Unmonitored => {}
    }

    errors
}

fn validate_port(values: &RawValues, errors: &mut FieldErrors) -> bool {
    validate_int("port", values, errors, Some(MIN_PORT), Some(MAX_PORT))
}

fn validate_optional_string(key: &str, values: &RawValues, errors: &mut FieldErrors) -> bool {
    !values.contains_key(key) || validate_string(key, values, errors, false)
}

fn validate_optional_mac(values: &RawValues, errors: &mut FieldErrors) -> bool {
    !values.contains_key("mac_address") || validate_mac("mac_address", values, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(value: &str) -> RawValues {
        RawValues::from([("address".to_string(), value.to_string())])
    }

    fn int_ok(value: &str, min: Option<i64>, max: Option<i64>) -> bool {
        let mut errors = FieldErrors::new();
        let ok = validate_int("address", &values(value), &mut errors, min, max);
        assert_eq!(ok, !errors.contains("address"));
        ok
    }

    fn string_ok(value: Option<&str>, empty_ok: bool) -> bool {
        let values = value.map(values).unwrap_or_default();
        let mut errors = FieldErrors::new();
        validate_string("address", &values, &mut errors, empty_ok)
    }

    fn hostname_ok(value: &str) -> bool {
        let mut errors = FieldErrors::new();
        validate_hostname("address", &values(value), &mut errors)
    }

    fn mac_ok(value: &str) -> bool {
        let mut errors = FieldErrors::new();
        validate_mac("address", &values(value), &mut errors)
    }

    #[test]
    fn integers() {
        assert!(int_ok("0", Some(0), Some(0)));
        assert!(!int_ok("NaN", None, None));
        assert!(int_ok("1234567890", None, None));
        assert!(int_ok("9876543210", None, None));
        assert!(int_ok("5", Some(1), Some(10)));
        assert!(!int_ok("0", Some(1), Some(10)));
        assert!(int_ok("0", None, Some(1)));
        assert!(int_ok("1234567890", Some(1), None));
        assert!(!int_ok("1", None, Some(0)));
        assert!(int_ok("-1", None, Some(0)));
        assert!(!int_ok("-1", Some(0), None));
    }

    #[test]
    fn integer_messages() {
        let mut errors = FieldErrors::new();
        validate_int("port", &RawValues::new(), &mut errors, None, None);
        assert_eq!(errors.get("port"), Some("port is required"));

        let values = RawValues::from([("port".to_string(), "70000".to_string())]);
        let mut errors = FieldErrors::new();
        validate_int("port", &values, &mut errors, Some(1), Some(65535));
        assert_eq!(
            errors.get("port"),
            Some("port must be less than or equal to 65535")
        );

        let values = RawValues::from([("port".to_string(), "0".to_string())]);
        let mut errors = FieldErrors::new();
        validate_int("port", &values, &mut errors, Some(1), Some(65535));
        assert_eq!(
            errors.get("port"),
            Some("port must be greater than or equal to 1")
        );
    }

    #[test]
    fn strings() {
        assert!(!string_ok(Some(""), false));
        assert!(string_ok(Some(""), true));
        assert!(!string_ok(None, false));
        assert!(!string_ok(None, true));
        assert!(string_ok(Some("this is a basic string"), false));
        assert!(string_ok(Some("897,654,321"), false));
        assert!(string_ok(Some("p4$$w0RD"), false));
        assert!(string_ok(Some("ユニコード"), false));
    }

    #[test]
    fn string_messages() {
        let mut errors = FieldErrors::new();
        validate_string("username", &RawValues::new(), &mut errors, false);
        assert_eq!(errors.get("username"), Some("username cannot be empty"));

        let values = RawValues::from([("username".to_string(), String::new())]);
        let mut errors = FieldErrors::new();
        validate_string("username", &values, &mut errors, false);
        assert_eq!(errors.get("username"), Some("username cannot be blank"));
    }

    #[test]
    fn hostnames() {
        assert!(!hostname_ok(""));
        assert!(!hostname_ok("bad+wolf"));
        assert!(hostname_ok("www.google.com"));
        assert!(hostname_ok("8.8.8.8"));
        assert!(hostname_ok("localhost"));
        assert!(hostname_ok("127.0.0.1"));
        assert!(hostname_ok("::1"));
        assert!(!hostname_ok("http://www.google.com/"));
        assert!(!hostname_ok("http://www.google.com"));
        assert!(!hostname_ok("8c:85:90:4f:7f:73"));

        let mut errors = FieldErrors::new();
        assert!(!validate_hostname("undef", &RawValues::new(), &mut errors));
        assert!(errors.contains("undef"));
    }

    #[test]
    fn hardware_addresses() {
        assert!(!mac_ok(""));
        assert!(mac_ok("8c:85:90:4f:7f:73"));
        assert!(mac_ok("8C:85:90:4F:7F:73"));
        assert!(mac_ok("8c-85-90-4f-7f-73"));
        assert!(!mac_ok("8c:85:0:4f:7f:73"));
        assert!(!mac_ok("8c.85.90.4f.7f.73"));
        assert!(!mac_ok("8C85904F7F73"));
        assert!(!mac_ok("localhost"));
        assert!(!mac_ok("-"));
        assert!(!mac_ok(":::::"));
    }

    #[test]
    fn urls() {
        let check = |value: &str| {
            let values = RawValues::from([("url".to_string(), value.to_string())]);
            validate_url("url", &values, &mut FieldErrors::new())
        };
        assert!(check("http://www.google.com/"));
        assert!(check("https://192.168.1.10:8443/health"));
        assert!(!check("www.google.com"));
        assert!(!check("ftp://files.lan/"));
        assert!(!check(""));
    }

    #[test]
    fn prefs_bounds() {
        let prefs = |refresh: &str, timeout: &str, command: &str| {
            validate_prefs(&RawValues::from([
                ("refresh_interval".to_string(), refresh.to_string()),
                ("connection_timeout".to_string(), timeout.to_string()),
                ("command_timeout".to_string(), command.to_string()),
                ("arp_command_timeout".to_string(), "5".to_string()),
            ]))
        };
        assert!(prefs("180", "5", "10").is_empty());
        assert!(prefs("1", "0", "1").is_empty());
        assert!(prefs("0", "5", "10").contains("refresh_interval"));
        assert!(prefs("3601", "5", "10").contains("refresh_interval"));
        assert!(prefs("60", "301", "10").contains("connection_timeout"));

        let errors = prefs("60", "5", "0");
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("command_timeout"));
    }

    #[test]
    fn device_rules() {
        let service = RawValues::from([
            ("address".to_string(), "nas.lan".to_string()),
            ("port".to_string(), "0".to_string()),
        ]);
        let errors = validate_device(DeviceKind::Service, &service);
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("port"));

        let local = RawValues::from([("address".to_string(), "nas.lan".to_string())]);
        assert!(validate_device(DeviceKind::Local, &local).contains("address"));

        let ssh = RawValues::from([
            ("address".to_string(), "server.lan".to_string()),
            ("port".to_string(), "22".to_string()),
            ("cmd_shutdown".to_string(), String::new()),
        ]);
        let errors = validate_device(DeviceKind::Ssh, &ssh);
        assert_eq!(errors.get("cmd_shutdown"), Some("cmd_shutdown cannot be blank"));
        assert!(!errors.contains("cmd_status"));

        assert!(validate_device(DeviceKind::Unmonitored, &RawValues::new()).is_empty());
        assert!(validate_device(DeviceKind::Command, &RawValues::new()).is_empty());
    }
}
