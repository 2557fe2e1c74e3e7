use chrono::{DateTime, Duration, Utc};
use hygro_core::{HygroError, Result};
use serde::{Deserialize, Serialize};

/// 默认健康阈值 H（1 小时）
pub const DEFAULT_HEALTH_THRESHOLD_SECS: u64 = 3600;

/// 默认抑制阈值 S（3 小时）
pub const DEFAULT_SUPPRESSION_THRESHOLD_SECS: u64 = 3 * 3600;

/// 一次检查的判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StalenessStatus {
    /// `age <= H`
    Healthy,
    /// `H < age <= S`：需要发送通知
    StaleAlerting,
    /// `age > S`：视为之前的检查已经通知过
    StaleSuppressed,
}

impl StalenessStatus {
    pub fn is_stale(&self) -> bool {
        !matches!(self, StalenessStatus::Healthy)
    }
}

/// 单次检查的观测值，仅在本次调用内有效，从不持久化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorObservation {
    pub record_timestamp: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
}

impl MonitorObservation {
    pub fn age(&self) -> Duration {
        self.observed_at - self.record_timestamp
    }
}

/// 基于时间窗口的无状态去重策略
///
/// 判定只取决于记录年龄。若调度周期 `P <= S - H`，每个事故至少会在
/// `(H, S]` 窗口内被观测一次，且通知次数不超过 `ceil((S - H) / P)`。
///
/// 已知缺口：如果监控本身在整个 `(H, S]` 窗口内都未运行，该事故将直接落入
/// `StaleSuppressed`，直到有新记录到达前都不会再通知。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    health_threshold: Duration,
    suppression_threshold: Duration,
}

impl StalenessPolicy {
    pub fn new(health_threshold: Duration, suppression_threshold: Duration) -> Result<Self> {
        if health_threshold <= Duration::zero() {
            return Err(HygroError::config("health threshold must be positive"));
        }
        if suppression_threshold <= health_threshold {
            return Err(HygroError::config(format!(
                "suppression threshold ({}s) must be greater than health threshold ({}s)",
                suppression_threshold.num_seconds(),
                health_threshold.num_seconds()
            )));
        }

        Ok(Self {
            health_threshold,
            suppression_threshold,
        })
    }

    pub fn from_secs(health_secs: u64, suppression_secs: u64) -> Result<Self> {
        Self::new(secs(health_secs)?, secs(suppression_secs)?)
    }

    pub fn health_threshold(&self) -> Duration {
        self.health_threshold
    }

    pub fn suppression_threshold(&self) -> Duration {
        self.suppression_threshold
    }

    /// 三区间判定
    pub fn classify(&self, age: Duration) -> StalenessStatus {
        if age <= self.health_threshold {
            StalenessStatus::Healthy
        } else if age <= self.suppression_threshold {
            StalenessStatus::StaleAlerting
        } else {
            StalenessStatus::StaleSuppressed
        }
    }

    /// 通知窗口长度 `S - H`
    pub fn alert_window(&self) -> Duration {
        self.suppression_threshold - self.health_threshold
    }

    /// 给定调度周期下，每个事故的通知次数上限
    pub fn max_alerts_per_incident(&self, period: Duration) -> Option<u64> {
        let period_secs = period.num_seconds();
        if period_secs <= 0 {
            return None;
        }
        let window_secs = self.alert_window().num_seconds();
        Some(((window_secs + period_secs - 1) / period_secs) as u64)
    }

    /// 调度周期是否保证每个事故至少通知一次
    pub fn guarantees_alert(&self, period: Duration) -> bool {
        period > Duration::zero() && period <= self.alert_window()
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            health_threshold: Duration::seconds(DEFAULT_HEALTH_THRESHOLD_SECS as i64),
            suppression_threshold: Duration::seconds(DEFAULT_SUPPRESSION_THRESHOLD_SECS as i64),
        }
    }
}

fn secs(value: u64) -> Result<Duration> {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| HygroError::config(format!("duration out of range: {}s", value)))
}
