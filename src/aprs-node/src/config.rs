// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for aprs-node.
//!
//! Config is loaded from the `[aprs-node]` section of `aprs-node.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./aprs-node.toml`
//! 3. `~/.config/aprs-node/aprs-node.toml`
//! 4. `/etc/aprs-node/aprs-node.toml`

use std::collections::HashSet;
use std::time::Duration;

use aprs_app::ConfigFile;
use aprs_core::channel::LinearBackoff;
use serde::{Deserialize, Serialize};

pub use aprs_packet_log::PacketLogConfig;

/// Top-level node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Radio and internet channels
    pub channels: Vec<ChannelConfig>,
    /// RF <-> APRS-IS gateway
    pub igate: IgateConfig,
    /// Duplicate packet detection
    pub dedup: DedupConfig,
    /// Heard-station tracking
    pub heard: HeardConfig,
    /// Infrastructure graph aging
    pub topology: TopologyConfig,
    /// Received packet log
    pub packet_log: PacketLogConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Node callsign, used for APRS-IS login and gating
    pub callsign: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
    /// Node latitude (decimal degrees, WGS84)
    pub latitude: Option<f64>,
    /// Node longitude (decimal degrees, WGS84)
    pub longitude: Option<f64>,
}

/// One `[[channels]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Unique channel identifier
    pub id: String,
    /// Channel type: "kiss-serial", "tnc2-serial", "kiss-tcp" or "aprs-is"
    #[serde(rename = "type")]
    pub channel_type: String,
    /// Activate at startup. Disabled channels can still serve as backups.
    pub enabled: bool,
    /// Serial device path
    pub device: Option<String>,
    /// Serial baud rate
    pub baud: Option<u32>,
    /// TCP host
    pub host: Option<String>,
    /// TCP port
    pub port: Option<u16>,
    /// KISS sub-channel (TNC port number)
    pub kiss_port: u8,
    /// APRS-IS passcode (-1 = computed from the callsign)
    pub passcode: i32,
    /// APRS-IS server-side filter
    pub filter: Option<String>,
    /// Channel activated when this one fails permanently
    pub backup: Option<String>,
    /// Reconnect policy
    pub retry: RetryConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            channel_type: String::new(),
            enabled: true,
            device: None,
            baud: None,
            host: None,
            port: None,
            kiss_port: 0,
            passcode: -1,
            filter: None,
            backup: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Reconnect policy for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum reconnect attempts before the channel fails (0 = unlimited)
    pub max_retries: u32,
    /// Delay step in milliseconds; attempt n waits n * base
    pub base_interval_ms: u64,
    /// Upper bound for the delay in milliseconds
    pub max_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_interval_ms: 30_000,
            max_interval_ms: 600_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> LinearBackoff {
        LinearBackoff::new(
            self.max_retries,
            Duration::from_millis(self.base_interval_ms),
            Duration::from_millis(self.max_interval_ms),
        )
    }
}

/// RF <-> APRS-IS gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IgateConfig {
    /// Whether the gateway is enabled
    pub enabled: bool,
    /// Id of the RF channel
    pub rf_channel: Option<String>,
    /// Id of the APRS-IS channel
    pub inet_channel: Option<String>,
    /// Gate RF packets to APRS-IS
    pub rf_to_inet: bool,
    /// Gate messages from APRS-IS to stations heard on RF
    pub inet_to_rf: bool,
    /// Gate objects near the node to RF
    pub gate_objects: bool,
    /// Object gating radius around the node position (km)
    pub object_range_km: f64,
    /// Digipeater path for gated objects
    pub object_path: String,
    /// Digipeater path for messages when the heard path yields none
    pub default_path: String,
    /// Regex on the message target; matching targets are gated to RF even
    /// when also heard on APRS-IS
    pub always_rf: Option<String>,
    /// Destination (tocall) of packets originated by the node
    pub tocall: String,
}

impl Default for IgateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rf_channel: None,
            inet_channel: None,
            rf_to_inet: true,
            inet_to_rf: true,
            gate_objects: false,
            object_range_km: 25.0,
            object_path: "WIDE1-1".to_string(),
            default_path: "WIDE1-1,WIDE2-1".to_string(),
            always_rf: None,
            tocall: "APZRS1".to_string(),
        }
    }
}

/// Duplicate packet detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Window in which identical packets count as one transmission (s)
    pub window_secs: u32,
    /// Upper bound on remembered packets
    pub max_entries: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_secs: aprs_core::infra::dedup::DEFAULT_WINDOW_SECS as u32,
            max_entries: aprs_core::infra::dedup::DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Heard-station tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeardConfig {
    /// Minutes after which a heard station is forgotten
    pub timeout_mins: u32,
}

impl Default for HeardConfig {
    fn default() -> Self {
        Self {
            timeout_mins: aprs_core::infra::heard::DEFAULT_TIMEOUT_MINS as u32,
        }
    }
}

/// Infrastructure graph aging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Edges older than this lose primary status (hours)
    pub primary_max_age_hours: u32,
    /// Edges older than this are removed (hours)
    pub remove_age_hours: u32,
    /// Sweep interval (minutes)
    pub sweep_interval_mins: u32,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            primary_max_age_hours: aprs_core::infra::topology::DEFAULT_PRIMARY_MAX_AGE_HOURS as u32,
            remove_age_hours: aprs_core::infra::topology::DEFAULT_REMOVE_AGE_HOURS as u32,
            sweep_interval_mins: 10,
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;
        validate_coordinates(self.general.latitude, self.general.longitude)?;
        if let Some(call) = &self.general.callsign {
            if call.trim().is_empty() {
                return Err("[general].callsign must not be empty".to_string());
            }
        }

        let mut ids = HashSet::new();
        for (idx, ch) in self.channels.iter().enumerate() {
            if ch.id.trim().is_empty() {
                return Err(format!("[[channels]] entry {} has an empty id", idx));
            }
            if !ids.insert(ch.id.as_str()) {
                return Err(format!("[[channels]] id '{}' is used twice", ch.id));
            }
            validate_channel(ch, self.general.callsign.is_some())?;
        }
        for ch in &self.channels {
            if let Some(backup) = &ch.backup {
                if backup == &ch.id {
                    return Err(format!("channel '{}' cannot be its own backup", ch.id));
                }
                if !ids.contains(backup.as_str()) {
                    return Err(format!(
                        "channel '{}' backup '{}' is not a configured channel",
                        ch.id, backup
                    ));
                }
            }
        }

        self.validate_igate(&ids)?;

        if self.dedup.window_secs == 0 {
            return Err("[dedup].window_secs must be > 0".to_string());
        }
        if self.dedup.max_entries == 0 {
            return Err("[dedup].max_entries must be > 0".to_string());
        }
        if self.heard.timeout_mins == 0 {
            return Err("[heard].timeout_mins must be > 0".to_string());
        }
        if self.topology.primary_max_age_hours > self.topology.remove_age_hours {
            return Err(
                "[topology].primary_max_age_hours must not exceed remove_age_hours".to_string(),
            );
        }
        if self.topology.sweep_interval_mins == 0 {
            return Err("[topology].sweep_interval_mins must be > 0".to_string());
        }
        Ok(())
    }

    fn validate_igate(&self, ids: &HashSet<&str>) -> Result<(), String> {
        let igate = &self.igate;
        if !igate.enabled {
            return Ok(());
        }
        if self.general.callsign.is_none() {
            return Err("[general].callsign is required when [igate] is enabled".to_string());
        }
        let sides = [
            ("rf_channel", &igate.rf_channel),
            ("inet_channel", &igate.inet_channel),
        ];
        for (key, value) in sides {
            match value {
                Some(id) if ids.contains(id.as_str()) => {}
                Some(id) => {
                    return Err(format!("[igate].{} '{}' is not a configured channel", key, id))
                }
                None => return Err(format!("[igate].{} must be set", key)),
            }
        }
        if igate.rf_channel == igate.inet_channel {
            return Err("[igate].rf_channel and inet_channel must differ".to_string());
        }
        if let Some(pattern) = &igate.always_rf {
            regex::Regex::new(pattern)
                .map_err(|e| format!("[igate].always_rf is not a valid regex: {}", e))?;
        }
        if igate.gate_objects {
            if self.general.latitude.is_none() {
                return Err(
                    "[igate].gate_objects requires [general].latitude and longitude".to_string(),
                );
            }
            if igate.object_range_km <= 0.0 {
                return Err("[igate].object_range_km must be > 0".to_string());
            }
        }
        if igate.tocall.trim().is_empty() {
            return Err("[igate].tocall must not be empty".to_string());
        }
        Ok(())
    }

    /// Example configuration under the `[aprs-node]` section header.
    pub fn example_toml() -> String {
        #[derive(Serialize)]
        struct Wrapper {
            #[serde(rename = "aprs-node")]
            inner: NodeConfig,
        }
        let example = NodeConfig {
            general: GeneralConfig {
                callsign: Some("N0CALL-10".to_string()),
                log_level: Some("info".to_string()),
                latitude: Some(52.2297),
                longitude: Some(21.0122),
            },
            channels: vec![
                ChannelConfig {
                    id: "rf".to_string(),
                    channel_type: "kiss-serial".to_string(),
                    device: Some("/dev/ttyUSB0".to_string()),
                    baud: Some(9600),
                    ..ChannelConfig::default()
                },
                ChannelConfig {
                    id: "aprs-is".to_string(),
                    channel_type: "aprs-is".to_string(),
                    host: Some("rotate.aprs.net".to_string()),
                    port: Some(14580),
                    filter: Some("m/50".to_string()),
                    backup: Some("aprs-is-backup".to_string()),
                    retry: RetryConfig {
                        max_retries: 5,
                        ..RetryConfig::default()
                    },
                    ..ChannelConfig::default()
                },
                ChannelConfig {
                    id: "aprs-is-backup".to_string(),
                    channel_type: "aprs-is".to_string(),
                    enabled: false,
                    host: Some("euro.aprs2.net".to_string()),
                    port: Some(14580),
                    filter: Some("m/50".to_string()),
                    ..ChannelConfig::default()
                },
            ],
            igate: IgateConfig {
                enabled: true,
                rf_channel: Some("rf".to_string()),
                inet_channel: Some("aprs-is".to_string()),
                ..IgateConfig::default()
            },
            dedup: DedupConfig::default(),
            heard: HeardConfig::default(),
            topology: TopologyConfig::default(),
            packet_log: PacketLogConfig::default(),
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), String> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) {
                return Err("[general].latitude must be in range -90..=90".to_string());
            }
            if !(-180.0..=180.0).contains(&lon) {
                return Err("[general].longitude must be in range -180..=180".to_string());
            }
            Ok(())
        }
        (None, None) => Ok(()),
        _ => Err(
            "[general].latitude and [general].longitude must be set together or both omitted"
                .to_string(),
        ),
    }
}

/// Checks the fields each built-in channel type needs. Unknown types are
/// left to the channel registry.
fn validate_channel(ch: &ChannelConfig, has_callsign: bool) -> Result<(), String> {
    let id = &ch.id;
    let needs_serial = matches!(ch.channel_type.as_str(), "kiss-serial" | "tnc2-serial");
    let needs_tcp = matches!(ch.channel_type.as_str(), "kiss-tcp" | "aprs-is");

    if ch.channel_type.trim().is_empty() {
        return Err(format!("channel '{}' has no type", id));
    }
    if needs_serial {
        if ch.device.as_deref().unwrap_or("").trim().is_empty() {
            return Err(format!("channel '{}' needs a serial device", id));
        }
        if ch.baud.unwrap_or(0) == 0 {
            return Err(format!("channel '{}' baud must be > 0", id));
        }
    }
    if needs_tcp {
        if ch.host.as_deref().unwrap_or("").trim().is_empty() {
            return Err(format!("channel '{}' needs a host", id));
        }
        if ch.port.unwrap_or(0) == 0 {
            return Err(format!("channel '{}' port must be > 0", id));
        }
    }
    if ch.channel_type == "aprs-is" && !has_callsign {
        return Err(format!(
            "channel '{}' logs in to APRS-IS and needs [general].callsign",
            id
        ));
    }
    if ch.kiss_port > 15 {
        return Err(format!("channel '{}' kiss_port must be in range 0..=15", id));
    }
    if ch.retry.base_interval_ms == 0 {
        return Err(format!("channel '{}' retry.base_interval_ms must be > 0", id));
    }
    if ch.retry.max_interval_ms < ch.retry.base_interval_ms {
        return Err(format!(
            "channel '{}' retry.max_interval_ms must be >= base_interval_ms",
            id
        ));
    }
    Ok(())
}

impl ConfigFile for NodeConfig {
    fn app_name() -> &'static str {
        "aprs-node"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NodeConfig {
        let toml_str = r#"
[general]
callsign = "N0CALL-10"
latitude = 49.0
longitude = -72.0

[[channels]]
id = "rf"
type = "kiss-serial"
device = "/dev/ttyUSB0"
baud = 9600

[[channels]]
id = "is"
type = "aprs-is"
host = "rotate.aprs.net"
port = 14580

[igate]
enabled = true
rf_channel = "rf"
inet_channel = "is"
"#;
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert!(config.channels.is_empty());
        assert!(!config.igate.enabled);
        assert_eq!(config.igate.tocall, "APZRS1");
        assert_eq!(config.dedup.window_secs, 30);
        assert_eq!(config.dedup.max_entries, 4096);
        assert_eq!(config.heard.timeout_mins, 40);
        assert_eq!(config.topology.primary_max_age_hours, 72);
        assert!(!config.packet_log.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_channels_and_defaults() {
        let config = base();
        assert_eq!(config.channels.len(), 2);
        let rf = &config.channels[0];
        assert_eq!(rf.channel_type, "kiss-serial");
        assert!(rf.enabled);
        assert_eq!(rf.passcode, -1);
        assert_eq!(rf.retry.base_interval_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_policy_from_config() {
        use aprs_core::channel::RetryPolicy;
        let retry = RetryConfig {
            max_retries: 2,
            base_interval_ms: 1000,
            max_interval_ms: 2500,
        };
        let policy = retry.policy();
        assert_eq!(policy.delay(2), Duration::from_millis(2000));
        assert_eq!(policy.delay(5), Duration::from_millis(2500));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_rejects_duplicate_and_unknown_ids() {
        let mut config = base();
        config.channels[1].id = "rf".to_string();
        assert!(config.validate().unwrap_err().contains("used twice"));

        let mut config = base();
        config.channels[0].backup = Some("missing".to_string());
        assert!(config.validate().unwrap_err().contains("backup"));

        let mut config = base();
        config.igate.inet_channel = Some("nowhere".to_string());
        assert!(config.validate().unwrap_err().contains("inet_channel"));
    }

    #[test]
    fn test_rejects_incomplete_channels() {
        let mut config = base();
        config.channels[0].device = None;
        assert!(config.validate().unwrap_err().contains("serial device"));

        let mut config = base();
        config.channels[1].port = Some(0);
        assert!(config.validate().unwrap_err().contains("port"));

        let mut config = base();
        config.general.callsign = None;
        config.igate.enabled = false;
        assert!(config.validate().unwrap_err().contains("callsign"));

        let mut config = base();
        config.channels[0].retry.max_interval_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_igate_checks() {
        let mut config = base();
        config.igate.always_rf = Some("(".to_string());
        assert!(config.validate().unwrap_err().contains("always_rf"));

        let mut config = base();
        config.igate.gate_objects = true;
        config.general.latitude = None;
        config.general.longitude = None;
        assert!(config.validate().unwrap_err().contains("gate_objects"));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = base();
        config.general.log_level = Some("loud".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_example_round_trips() {
        let example = NodeConfig::example_toml();
        assert!(example.contains("[aprs-node.general]"));
        let table: toml::Table = toml::from_str(&example).unwrap();
        let inner = table.get("aprs-node").unwrap().clone();
        let config: NodeConfig = inner.try_into().unwrap();
        assert_eq!(config.channels.len(), 3);
        assert!(config.validate().is_ok());
    }
}
