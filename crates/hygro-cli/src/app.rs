use anyhow::Result;
use hygro_config::{AppConfig, ChannelConfig, NotifyConfig, StoreBackend, StoreConfig};
use hygro_monitor::{HttpLatestRecord, HttpSourceConfig, StalenessMonitor};
use hygro_notify::{
    Notifier, NotifyManager, NtfyNotifier, PushoverNotifier, SlackNotifier, WebhookNotifier,
};
use hygro_replicator::{FileCheckpointStore, GitCommitLog, Replicator};
use hygro_timeseries::{InfluxStore, MemoryStore, TimeSeriesStore, TimescaleStore};
use std::sync::Arc;
use tracing::info;

/// 根据配置创建时序存储
pub async fn build_store(config: &StoreConfig, measurement: &str) -> Result<Arc<dyn TimeSeriesStore>> {
    let store: Arc<dyn TimeSeriesStore> = match config.backend {
        StoreBackend::Timescale => Arc::new(
            TimescaleStore::connect(config.require_url()?, &config.table, measurement).await?,
        ),
        StoreBackend::Influx => Arc::new(InfluxStore::new(config.influx()?, measurement)?),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };

    info!(store = store.name(), "Time-series store ready");
    Ok(store)
}

pub fn build_checkpoint_store(config: &AppConfig) -> Result<Arc<FileCheckpointStore>> {
    Ok(Arc::new(FileCheckpointStore::new(&config.checkpoint()?.path)))
}

/// 组装复制器；`store` 由调用方决定（dry-run 时传入内存存储）
pub fn build_replicator(
    config: &AppConfig,
    checkpoints: Arc<FileCheckpointStore>,
    store: Arc<dyn TimeSeriesStore>,
) -> Result<Replicator> {
    let log = Arc::new(GitCommitLog::new(config.source()?.clone()));
    Ok(Replicator::new(
        log,
        checkpoints,
        store,
        config.record.schema.clone(),
    ))
}

/// 按配置注册全部通知渠道
pub async fn build_notifier(config: &NotifyConfig) -> Arc<NotifyManager> {
    let manager = NotifyManager::new(config.min_level);

    for channel in &config.channels {
        let notifier: Box<dyn Notifier> = match channel.clone() {
            ChannelConfig::Webhook(c) => Box::new(WebhookNotifier::new(c)),
            ChannelConfig::Slack(c) => Box::new(SlackNotifier::new(c)),
            ChannelConfig::Pushover(c) => Box::new(PushoverNotifier::new(c)),
            ChannelConfig::Ntfy(c) => Box::new(NtfyNotifier::new(c)),
        };
        manager.register(channel.channel(), notifier).await;
    }

    Arc::new(manager)
}

pub async fn build_monitor(config: &AppConfig) -> Result<StalenessMonitor> {
    let source = HttpLatestRecord::new(
        HttpSourceConfig {
            url: config.latest_url()?.to_string(),
            timeout_secs: config.monitor.request_timeout_secs,
        },
        config.record.schema.clone(),
    )?;
    let notifier = build_notifier(&config.notify).await;

    Ok(
        StalenessMonitor::new(Arc::new(source), notifier, config.monitor.policy()?)
            .with_template(config.monitor.alert.clone()),
    )
}
