use crate::app;
use anyhow::Result;
use chrono::Utc;
use hygro_config::AppConfig;
use hygro_core::{Checkpoint, CheckpointStore};
use hygro_monitor::MonitorReport;
use hygro_replicator::ReplicationReport;
use hygro_timeseries::{MemoryStore, TimeSeriesStore};
use std::sync::Arc;
use tracing::info;

/// 执行一次复制
///
/// dry-run 时写入内存存储并且不推进检查点，报告即为正式运行将会写入的内容。
pub async fn replicate(config: &AppConfig, dry_run: bool) -> Result<ReplicationReport> {
    let checkpoints = app::build_checkpoint_store(config)?;

    if dry_run {
        let store: Arc<dyn TimeSeriesStore> = Arc::new(MemoryStore::new());
        let replicator = app::build_replicator(config, checkpoints.clone(), store)?;
        let previous = checkpoints.load().await?;
        info!(checkpoint = %previous, "Dry run, checkpoint will not be advanced");
        return Ok(replicator.replay(previous).await?);
    }

    let store = app::build_store(config.store()?, &config.record.measurement).await?;
    let replicator = app::build_replicator(config, checkpoints, store)?;
    Ok(replicator.run().await?)
}

pub async fn check(config: &AppConfig) -> Result<MonitorReport> {
    let monitor = app::build_monitor(config).await?;
    Ok(monitor.check_at(Utc::now()).await?)
}

pub async fn checkpoint_show(config: &AppConfig) -> Result<Checkpoint> {
    let checkpoints = app::build_checkpoint_store(config)?;
    Ok(checkpoints.load().await?)
}

pub async fn checkpoint_reset(config: &AppConfig) -> Result<Checkpoint> {
    let checkpoints = app::build_checkpoint_store(config)?;
    let previous = checkpoints.load().await?;
    checkpoints.clear().await?;
    info!(previous = %previous, "Checkpoint cleared, next run will backfill the full history");
    Ok(previous)
}
