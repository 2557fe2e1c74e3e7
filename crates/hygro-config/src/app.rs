use anyhow::{anyhow, bail, Result};
use hygro_core::RecordSchema;
use hygro_logging::LoggingConfig;
use hygro_monitor::{
    AlertTemplate, StalenessPolicy, DEFAULT_HEALTH_THRESHOLD_SECS,
    DEFAULT_SUPPRESSION_THRESHOLD_SECS,
};
use hygro_notify::{
    NotifyChannel, NotifyLevel, NtfyConfig, PushoverConfig, SlackConfig, WebhookConfig,
};
use hygro_replicator::GitLogConfig;
use hygro_timeseries::InfluxConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// 应用配置（对应 `hygro.toml`）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// 传感器提交日志位置；`replicate` 时必填
    #[serde(default)]
    pub source: Option<GitLogConfig>,

    /// 检查点位置；`replicate` 和 `checkpoint` 时必填
    #[serde(default)]
    pub checkpoint: Option<CheckpointConfig>,

    #[serde(default)]
    pub record: RecordConfig,

    /// 时序库连接；非 dry-run 的 `replicate` 时必填
    #[serde(default)]
    pub store: Option<StoreConfig>,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub path: PathBuf,
}

/// 记录解析配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordConfig {
    #[serde(flatten)]
    pub schema: RecordSchema,

    /// 写入时序库时使用的 measurement
    #[serde(default = "default_measurement")]
    pub measurement: String,
}

fn default_measurement() -> String {
    "climate".to_string()
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            schema: RecordSchema::default(),
            measurement: default_measurement(),
        }
    }
}

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Timescale,
    Influx,
    Memory,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// TimescaleDB 连接串或 InfluxDB 地址
    #[serde(default)]
    pub url: Option<String>,

    /// InfluxDB API token
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub org: Option<String>,

    #[serde(default)]
    pub bucket: Option<String>,

    /// TimescaleDB 表名
    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_table() -> String {
    "climate_readings".to_string()
}

fn default_store_timeout() -> u64 {
    10
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: None,
            token: None,
            org: None,
            bucket: None,
            table: default_table(),
            timeout_secs: default_store_timeout(),
        }
    }

    pub fn require_url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| anyhow!("store.url is required for the {:?} backend", self.backend))
    }

    /// 组装 InfluxDB 连接配置
    pub fn influx(&self) -> Result<InfluxConfig> {
        let field = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("store.{} is required for the influx backend", name))
        };

        Ok(InfluxConfig {
            url: self.require_url()?.to_string(),
            org: field(&self.org, "org")?,
            bucket: field(&self.bucket, "bucket")?,
            token: field(&self.token, "token")?,
            timeout_secs: self.timeout_secs,
        })
    }
}

/// 监控配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_health_threshold")]
    pub health_threshold_secs: u64,

    #[serde(default = "default_suppression_threshold")]
    pub suppression_threshold_secs: u64,

    /// 调度周期 P，仅用于校验通知覆盖率
    #[serde(default = "default_schedule_period")]
    pub schedule_period_secs: u64,

    /// 最新快照地址；`check` 时必填
    #[serde(default)]
    pub latest_url: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub alert: AlertTemplate,
}

fn default_health_threshold() -> u64 {
    DEFAULT_HEALTH_THRESHOLD_SECS
}

fn default_suppression_threshold() -> u64 {
    DEFAULT_SUPPRESSION_THRESHOLD_SECS
}

fn default_schedule_period() -> u64 {
    3600
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            health_threshold_secs: default_health_threshold(),
            suppression_threshold_secs: default_suppression_threshold(),
            schedule_period_secs: default_schedule_period(),
            latest_url: None,
            request_timeout_secs: default_request_timeout(),
            alert: AlertTemplate::default(),
        }
    }
}

impl MonitorConfig {
    pub fn policy(&self) -> Result<StalenessPolicy> {
        StalenessPolicy::from_secs(self.health_threshold_secs, self.suppression_threshold_secs)
            .map_err(|e| anyhow!("invalid monitor thresholds: {}", e))
    }
}

/// 通知渠道配置，`kind` 字段区分类型
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelConfig {
    Webhook(WebhookConfig),
    Slack(SlackConfig),
    Pushover(PushoverConfig),
    Ntfy(NtfyConfig),
}

impl ChannelConfig {
    pub fn channel(&self) -> NotifyChannel {
        match self {
            ChannelConfig::Webhook(_) => NotifyChannel::Webhook,
            ChannelConfig::Slack(_) => NotifyChannel::Slack,
            ChannelConfig::Pushover(_) => NotifyChannel::Pushover,
            ChannelConfig::Ntfy(_) => NotifyChannel::Ntfy,
        }
    }

    /// 抹去凭据，用于展示
    fn redacted(&self) -> Self {
        let mut channel = self.clone();
        match &mut channel {
            ChannelConfig::Webhook(config) => {
                if let Some(headers) = config.headers.as_mut() {
                    headers.values_mut().for_each(|v| *v = REDACTED.to_string());
                }
            }
            ChannelConfig::Slack(config) => config.webhook_url = REDACTED.to_string(),
            ChannelConfig::Pushover(config) => {
                config.token = REDACTED.to_string();
                config.user = REDACTED.to_string();
            }
            ChannelConfig::Ntfy(config) => {
                if config.token.is_some() {
                    config.token = Some(REDACTED.to_string());
                }
            }
        }
        channel
    }
}

const REDACTED: &str = "***";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_min_level")]
    pub min_level: NotifyLevel,

    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

fn default_min_level() -> NotifyLevel {
    NotifyLevel::Info
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            min_level: default_min_level(),
            channels: Vec::new(),
        }
    }
}

impl AppConfig {
    /// 校验与命令无关的约束
    pub fn validate(&self) -> Result<()> {
        self.monitor.policy()?;

        if self.monitor.schedule_period_secs == 0 {
            bail!("monitor.schedule_period_secs must be greater than 0");
        }
        if self.record.schema.required_fields.is_empty() {
            bail!("record.required_fields must not be empty");
        }
        if self.record.schema.timestamp_key.is_empty() {
            bail!("record.timestamp_key must not be empty");
        }
        if self.record.measurement.is_empty() {
            bail!("record.measurement must not be empty");
        }

        // 陈旧告警以 warning 级别发送
        if self.notify.min_level > NotifyLevel::Warning {
            bail!(
                "notify.min_level {:?} would filter out staleness alerts, which are sent at warning level",
                self.notify.min_level
            );
        }

        let mut seen = HashSet::new();
        for channel in &self.notify.channels {
            if !seen.insert(channel.channel()) {
                bail!(
                    "notify channel '{:?}' is configured more than once",
                    channel.channel()
                );
            }
        }

        Ok(())
    }

    /// 不致命但值得提示的配置问题
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Ok(policy) = self.monitor.policy() {
            let period = self.monitor.schedule_period_secs;
            let window = policy.alert_window().num_seconds();
            if period as i64 > window {
                warnings.push(format!(
                    "monitor.schedule_period_secs ({}) exceeds the alert window ({}s); \
                     a stale incident may never be reported",
                    period, window
                ));
            }
        }

        if self.notify.channels.is_empty() {
            warnings.push("no notify channels configured; stale alerts will fail".to_string());
        }

        warnings
    }

    pub fn source(&self) -> Result<&GitLogConfig> {
        self.source
            .as_ref()
            .ok_or_else(|| anyhow!("[source] section is required"))
    }

    pub fn checkpoint(&self) -> Result<&CheckpointConfig> {
        self.checkpoint
            .as_ref()
            .ok_or_else(|| anyhow!("[checkpoint] section is required"))
    }

    pub fn store(&self) -> Result<&StoreConfig> {
        self.store
            .as_ref()
            .ok_or_else(|| anyhow!("[store] section is required"))
    }

    pub fn latest_url(&self) -> Result<&str> {
        self.monitor
            .latest_url
            .as_deref()
            .ok_or_else(|| anyhow!("monitor.latest_url is required"))
    }

    /// 去除凭据后的 TOML 表示
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut config = self.clone();
        if let Some(store) = config.store.as_mut() {
            if store.token.is_some() {
                store.token = Some(REDACTED.to_string());
            }
        }
        config.notify.channels = self.notify.channels.iter().map(|c| c.redacted()).collect();

        Ok(toml::to_string_pretty(&config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.record.measurement, "climate");
        assert_eq!(config.monitor.health_threshold_secs, 3600);
        assert_eq!(config.monitor.suppression_threshold_secs, 10800);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let mut config = AppConfig::default();
        config.monitor.health_threshold_secs = 10800;
        config.monitor.suppression_threshold_secs = 3600;
        assert!(config.validate().is_err());

        config.monitor.health_threshold_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_required_fields() {
        let mut config = AppConfig::default();
        config.record.schema.required_fields.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_warns_when_period_exceeds_window() {
        let mut config = AppConfig::default();
        config.monitor.schedule_period_secs = 3 * 3600;
        let warnings = config.warnings();
        assert!(warnings.iter().any(|w| w.contains("schedule_period_secs")));

        config.monitor.schedule_period_secs = 3600;
        assert!(!config
            .warnings()
            .iter()
            .any(|w| w.contains("schedule_period_secs")));
    }

    #[test]
    fn test_rejects_min_level_above_warning() {
        let mut config = AppConfig::default();
        config.notify.min_level = NotifyLevel::Error;
        assert!(config.validate().is_err());

        config.notify.min_level = NotifyLevel::Warning;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_are_reported() {
        let config = AppConfig::default();
        assert!(config.source().is_err());
        assert!(config.checkpoint().is_err());
        assert!(config.store().is_err());
        assert!(config.latest_url().is_err());
    }

    #[test]
    fn test_influx_requires_credentials() {
        let mut store = StoreConfig::memory();
        store.backend = StoreBackend::Influx;
        store.url = Some("http://localhost:8086".to_string());
        assert!(store.influx().is_err());

        store.org = Some("home".to_string());
        store.bucket = Some("sensors".to_string());
        store.token = Some("secret".to_string());
        let influx = store.influx().unwrap();
        assert_eq!(influx.bucket, "sensors");
    }
}
