use async_trait::async_trait;
use hygro_core::{HygroError, Record, RecordSchema, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// 最新记录来源
///
/// 错误必须与判定结果区分：取数失败返回 `SourceUnavailable` 或 `Parse`，
/// 绝不能被当作 `Healthy` 或 `Stale` 处理。
#[async_trait]
pub trait LatestRecordSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Record>;

    fn name(&self) -> &str;
}

/// HTTP 来源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSourceConfig {
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    10
}

impl HttpSourceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: default_timeout(),
        }
    }
}

/// 通过 HTTP GET 获取最新快照（与复制器读取的同一份 JSON 文档）
pub struct HttpLatestRecord {
    config: HttpSourceConfig,
    schema: RecordSchema,
    client: reqwest::Client,
}

impl HttpLatestRecord {
    pub fn new(config: HttpSourceConfig, schema: RecordSchema) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HygroError::config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            config,
            schema,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl LatestRecordSource for HttpLatestRecord {
    async fn fetch_latest(&self) -> Result<Record> {
        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|e| HygroError::source_unavailable(format!("{}: {}", self.config.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HygroError::source_unavailable(format!(
                "{} returned {}",
                self.config.url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| HygroError::source_unavailable(format!("failed to read body: {}", e)))?;
        debug!(url = %self.config.url, bytes = body.len(), "Fetched latest snapshot");

        // 只关心时间戳，字段缺失不影响新鲜度判定
        self.schema.parse(&body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// 固定记录来源，用于本地演练和测试
pub struct StaticLatestRecord {
    record: RwLock<Option<Record>>,
}

impl StaticLatestRecord {
    pub fn new(record: Record) -> Self {
        Self {
            record: RwLock::new(Some(record)),
        }
    }

    pub fn empty() -> Self {
        Self {
            record: RwLock::new(None),
        }
    }

    pub async fn set(&self, record: Option<Record>) {
        *self.record.write().await = record;
    }
}

#[async_trait]
impl LatestRecordSource for StaticLatestRecord {
    async fn fetch_latest(&self) -> Result<Record> {
        self.record
            .read()
            .await
            .clone()
            .ok_or_else(|| HygroError::source_unavailable("no record available"))
    }

    fn name(&self) -> &str {
        "static"
    }
}
