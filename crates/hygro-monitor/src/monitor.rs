use crate::policy::{MonitorObservation, StalenessPolicy, StalenessStatus};
use crate::source::LatestRecordSource;
use chrono::{DateTime, Utc};
use hygro_core::{HygroError, Result};
use hygro_notify::{Notifier, NotifyMessage};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// 告警内容模板（固定的标题/正文）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertTemplate {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_body")]
    pub body: String,
}

fn default_title() -> String {
    "Sensor data is stale".to_string()
}

fn default_body() -> String {
    "No new sensor reading has arrived within the health threshold. Check the sensor and its upload job."
        .to_string()
}

impl Default for AlertTemplate {
    fn default() -> Self {
        Self {
            title: default_title(),
            body: default_body(),
        }
    }
}

/// 单次检查报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
    pub status: StalenessStatus,
    pub record_timestamp: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
    pub age_secs: i64,

    /// 本次检查是否发送了通知
    pub notified: bool,
}

/// 无状态数据陈旧监控
///
/// 每次调用独立完成：取最新记录、计算年龄、按策略判定，只有在
/// `StaleAlerting` 时调用一次通知器。两次调用之间不保留任何状态。
pub struct StalenessMonitor {
    source: Arc<dyn LatestRecordSource>,
    notifier: Arc<dyn Notifier>,
    policy: StalenessPolicy,
    template: AlertTemplate,
}

impl StalenessMonitor {
    pub fn new(
        source: Arc<dyn LatestRecordSource>,
        notifier: Arc<dyn Notifier>,
        policy: StalenessPolicy,
    ) -> Self {
        Self {
            source,
            notifier,
            policy,
            template: AlertTemplate::default(),
        }
    }

    pub fn with_template(mut self, template: AlertTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn policy(&self) -> &StalenessPolicy {
        &self.policy
    }

    pub async fn check(&self) -> Result<StalenessStatus> {
        Ok(self.check_at(Utc::now()).await?.status)
    }

    /// 以给定时刻作为 "now" 执行一次检查
    pub async fn check_at(&self, now: DateTime<Utc>) -> Result<MonitorReport> {
        let span = info_span!("monitor.check", source = self.source.name());
        self.check_inner(now).instrument(span).await
    }

    async fn check_inner(&self, now: DateTime<Utc>) -> Result<MonitorReport> {
        let record = self.source.fetch_latest().await.map_err(|e| match e {
            HygroError::SourceUnavailable(_) | HygroError::Parse(_) => e,
            other => HygroError::source_unavailable(other.to_string()),
        })?;

        let observation = MonitorObservation {
            record_timestamp: record.timestamp,
            observed_at: now,
        };
        let age = observation.age();
        let status = self.policy.classify(age);

        let mut report = MonitorReport {
            status,
            record_timestamp: observation.record_timestamp,
            observed_at: observation.observed_at,
            age_secs: age.num_seconds(),
            notified: false,
        };

        match status {
            StalenessStatus::Healthy => {
                debug!(age_secs = report.age_secs, "Latest record is fresh");
            }
            StalenessStatus::StaleAlerting => {
                warn!(age_secs = report.age_secs, "Latest record is stale, notifying");
                self.notify(&observation).await?;
                report.notified = true;
            }
            StalenessStatus::StaleSuppressed => {
                info!(
                    age_secs = report.age_secs,
                    "Latest record is stale beyond the alert window, notification suppressed"
                );
            }
        }

        Ok(report)
    }

    async fn notify(&self, observation: &MonitorObservation) -> Result<()> {
        let message = NotifyMessage::warning(&self.template.title, &self.template.body)
            .with_timestamp(observation.observed_at)
            .with_metadata(json!({
                "record_timestamp": observation.record_timestamp.to_rfc3339(),
                "age_secs": observation.age().num_seconds(),
            }));

        self.notifier
            .send_checked(&message)
            .await
            .map_err(|e| HygroError::notify(e.to_string()))?;

        info!(notifier = self.notifier.name(), "Staleness notification sent");
        Ok(())
    }
}
