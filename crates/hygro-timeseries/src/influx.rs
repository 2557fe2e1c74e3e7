use crate::store::TimeSeriesStore;
use async_trait::async_trait;
use hygro_core::{HygroError, Record, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// InfluxDB v2 连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

/// InfluxDB 存储实现
///
/// 行协议写入天然以 measurement + tag 集合 + 时间戳为键，重复写入即覆盖。
pub struct InfluxStore {
    config: InfluxConfig,
    measurement: String,
    client: reqwest::Client,
}

impl InfluxStore {
    pub fn new(config: InfluxConfig, measurement: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HygroError::config(format!("http client: {}", e)))?;

        Ok(Self {
            config,
            measurement: measurement.to_string(),
            client,
        })
    }

    fn write_url(&self) -> String {
        format!("{}/api/v2/write", self.config.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TimeSeriesStore for InfluxStore {
    async fn upsert(&self, record: &Record) -> Result<()> {
        let line = to_line_protocol(&self.measurement, record)?;

        let response = self
            .client
            .post(self.write_url())
            .query(&[
                ("org", self.config.org.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Authorization", format!("Token {}", self.config.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(line)
            .send()
            .await
            .map_err(|e| HygroError::store_write(format!("influx request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(HygroError::store_write(format!(
                "influx write failed with status: {}",
                response.status()
            )));
        }

        debug!(timestamp = %record.timestamp, "Record written to InfluxDB");
        Ok(())
    }

    fn name(&self) -> &str {
        "influx"
    }
}

/// 将记录编码为 InfluxDB 行协议
///
/// null 字段不写入；至少需要一个非 null 字段。
pub fn to_line_protocol(measurement: &str, record: &Record) -> Result<String> {
    let mut line = escape(measurement, &[',', ' ']);

    // 空标签在行协议中不合法，直接省略
    for (key, value) in record.tags.iter().filter(|(k, v)| !k.is_empty() && !v.is_empty()) {
        line.push(',');
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        line.push_str(&escape(value, &[',', '=', ' ']));
    }

    let fields: Vec<String> = record
        .present_fields()
        .map(|(key, value)| format!("{}={}", escape(key, &[',', '=', ' ']), value))
        .collect();

    if fields.is_empty() {
        return Err(HygroError::store_write(format!(
            "record at {} has no non-null fields",
            record.timestamp
        )));
    }

    let nanos = record.timestamp.timestamp_nanos_opt().ok_or_else(|| {
        HygroError::store_write(format!("timestamp {} out of range", record.timestamp))
    })?;

    line.push(' ');
    line.push_str(&fields.join(","));
    line.push(' ');
    line.push_str(&nanos.to_string());

    Ok(line)
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
