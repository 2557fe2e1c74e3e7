use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hygro_core::{HygroError, Record};
use hygro_monitor::{
    AlertTemplate, StalenessMonitor, StalenessPolicy, StalenessStatus, StaticLatestRecord,
};
use hygro_notify::{Notifier, NotifyChannel, NotifyLevel, NotifyManager, NotifyMessage, NotifyResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 记录所有收到的消息
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<NotifyMessage>>,
    reject: AtomicBool,
    broken: AtomicBool,
}

impl RecordingNotifier {
    async fn sent(&self) -> Vec<NotifyMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &NotifyMessage) -> anyhow::Result<NotifyResult> {
        if self.broken.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        self.sent.lock().await.push(message.clone());
        if self.reject.load(Ordering::SeqCst) {
            return Ok(NotifyResult::failure("HTTP 401"));
        }
        Ok(NotifyResult::success())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

fn last_reading() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap()
}

struct Fixture {
    source: Arc<StaticLatestRecord>,
    notifier: Arc<RecordingNotifier>,
    monitor: StalenessMonitor,
}

impl Fixture {
    fn new() -> Self {
        let source = Arc::new(StaticLatestRecord::new(
            Record::new(last_reading())
                .with_field("temperature", 19.0)
                .with_field("humidity", 52.0),
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = StalenessMonitor::new(
            source.clone(),
            notifier.clone(),
            StalenessPolicy::default(),
        );
        Self {
            source,
            notifier,
            monitor,
        }
    }

    async fn check_after(&self, age: Duration) -> hygro_core::Result<StalenessStatus> {
        Ok(self.monitor.check_at(last_reading() + age).await?.status)
    }
}

#[tokio::test]
async fn test_zones_and_notifications() {
    let cases = [
        (Duration::minutes(59), StalenessStatus::Healthy, 0),
        (Duration::minutes(61), StalenessStatus::StaleAlerting, 1),
        (Duration::minutes(179), StalenessStatus::StaleAlerting, 1),
        (Duration::minutes(181), StalenessStatus::StaleSuppressed, 0),
    ];

    for (age, expected, notifications) in cases {
        let fx = Fixture::new();
        let status = fx.check_after(age).await.unwrap();
        assert_eq!(status, expected, "age {}m", age.num_minutes());
        assert_eq!(fx.notifier.sent().await.len(), notifications);
    }
}

#[tokio::test]
async fn test_hourly_checks_over_long_incident_alert_twice() {
    let fx = Fixture::new();

    let mut alerted_at = Vec::new();
    for hour in 1..=10 {
        let report = fx
            .monitor
            .check_at(last_reading() + Duration::hours(hour))
            .await
            .unwrap();
        if report.notified {
            alerted_at.push(hour);
        }
    }

    assert_eq!(alerted_at, vec![2, 3]);
    assert_eq!(fx.notifier.sent().await.len(), 2);
    assert_eq!(
        fx.monitor
            .policy()
            .max_alerts_per_incident(Duration::hours(1)),
        Some(2)
    );
}

#[tokio::test]
async fn test_fresh_record_resets_the_incident() {
    let fx = Fixture::new();
    assert_eq!(
        fx.check_after(Duration::hours(5)).await.unwrap(),
        StalenessStatus::StaleSuppressed
    );

    let now = last_reading() + Duration::hours(5);
    fx.source
        .set(Some(Record::new(now - Duration::minutes(10))))
        .await;
    let report = fx.monitor.check_at(now).await.unwrap();
    assert_eq!(report.status, StalenessStatus::Healthy);
    assert!(!report.notified);
}

#[tokio::test]
async fn test_alert_message_carries_template_and_age() {
    let source = Arc::new(StaticLatestRecord::new(Record::new(last_reading())));
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = StalenessMonitor::new(source, notifier.clone(), StalenessPolicy::default())
        .with_template(AlertTemplate {
            title: "Greenhouse sensor silent".to_string(),
            body: "Check the Raspberry Pi.".to_string(),
        });

    let report = monitor
        .check_at(last_reading() + Duration::minutes(90))
        .await
        .unwrap();
    assert_eq!(report.age_secs, 90 * 60);

    let sent = notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "Greenhouse sensor silent");
    assert_eq!(sent[0].content, "Check the Raspberry Pi.");
    let metadata = sent[0].metadata.as_ref().unwrap();
    assert_eq!(metadata["age_secs"], 5400);
}

#[tokio::test]
async fn test_fetch_failure_is_not_a_status() {
    let fx = Fixture::new();
    fx.source.set(None).await;

    let err = fx.check_after(Duration::hours(2)).await.unwrap_err();

    assert!(matches!(err, HygroError::SourceUnavailable(_)));
    assert!(fx.notifier.sent().await.is_empty());
}

#[tokio::test]
async fn test_rejected_notification_is_surfaced() {
    let fx = Fixture::new();
    fx.notifier.reject.store(true, Ordering::SeqCst);

    let err = fx.check_after(Duration::minutes(90)).await.unwrap_err();
    assert!(matches!(err, HygroError::NotifyFailed(_)));
    // 不重试
    assert_eq!(fx.notifier.sent().await.len(), 1);
}

#[tokio::test]
async fn test_transport_error_is_surfaced() {
    let fx = Fixture::new();
    fx.notifier.broken.store(true, Ordering::SeqCst);

    let err = fx.check_after(Duration::minutes(90)).await.unwrap_err();
    assert!(matches!(err, HygroError::NotifyFailed(msg) if msg.contains("connection refused")));
}

#[tokio::test]
async fn test_custom_thresholds() {
    let source = Arc::new(StaticLatestRecord::new(Record::new(last_reading())));
    let notifier = Arc::new(RecordingNotifier::default());
    let policy = StalenessPolicy::from_secs(600, 1800).unwrap();
    let monitor = StalenessMonitor::new(source, notifier.clone(), policy);

    let at = |minutes| last_reading() + Duration::minutes(minutes);
    assert_eq!(monitor.check_at(at(5)).await.unwrap().status, StalenessStatus::Healthy);
    assert_eq!(
        monitor.check_at(at(20)).await.unwrap().status,
        StalenessStatus::StaleAlerting
    );
    assert_eq!(
        monitor.check_at(at(31)).await.unwrap().status,
        StalenessStatus::StaleSuppressed
    );
    assert_eq!(notifier.sent().await.len(), 1);
}

struct CountingChannel {
    deliveries: Arc<AtomicUsize>,
}

#[async_trait]
impl Notifier for CountingChannel {
    async fn send(&self, _message: &NotifyMessage) -> anyhow::Result<NotifyResult> {
        self.deliveries.fetch_add(1, Ordering::SeqCst);
        Ok(NotifyResult::success())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

#[tokio::test]
async fn test_alert_filtered_by_min_level_is_a_notify_failure() {
    let deliveries = Arc::new(AtomicUsize::new(0));
    let manager = NotifyManager::new(NotifyLevel::Error);
    manager
        .register(
            NotifyChannel::Webhook,
            Box::new(CountingChannel {
                deliveries: deliveries.clone(),
            }),
        )
        .await;

    let source = Arc::new(StaticLatestRecord::new(Record::new(last_reading())));
    let monitor = StalenessMonitor::new(source, Arc::new(manager), StalenessPolicy::default());

    let err = monitor
        .check_at(last_reading() + Duration::minutes(90))
        .await
        .unwrap_err();

    assert!(matches!(err, HygroError::NotifyFailed(msg) if msg.contains("min_level")));
    assert_eq!(deliveries.load(Ordering::SeqCst), 0);
}
