use crate::extractor::RecordExtractor;
use hygro_core::{
    Checkpoint, CheckpointStore, CommitLog, HygroError, RecordSchema, Result, RevisionId,
};
use hygro_timeseries::TimeSeriesStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// 一次复制运行的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationReport {
    /// 运行开始时读取的检查点
    pub previous_checkpoint: Checkpoint,

    /// 运行开始时的最新修订；日志为空时为 None
    pub pending_checkpoint: Option<RevisionId>,

    /// 检查点之后被访问的修订数
    pub examined: usize,

    /// 写入存储的记录数
    pub written: usize,

    /// 因校验/解析失败被跳过的修订数
    pub skipped_invalid: usize,
}

impl ReplicationReport {
    fn empty(previous: Checkpoint) -> Self {
        Self {
            previous_checkpoint: previous,
            pending_checkpoint: None,
            examined: 0,
            written: 0,
            skipped_invalid: 0,
        }
    }

    pub fn records_written(&self) -> usize {
        self.written
    }

    /// 运行完成后应持有的检查点
    pub fn new_checkpoint(&self) -> Checkpoint {
        match &self.pending_checkpoint {
            Some(revision) => Checkpoint::at(revision.clone()),
            None => self.previous_checkpoint.clone(),
        }
    }
}

/// 增量复制器
///
/// 从 head 向旧遍历修订，遇到上次保存的检查点即停止；每条有效记录按时间戳
/// upsert 到时序库，全部写完后才推进检查点。检查点要么整体推进，要么不动：
/// 中途失败时下一次运行会完整重放同一区间，依赖 upsert 的幂等性保证结果一致。
///
/// 同一检查点/存储组合上的并发运行是不安全的（可能重复处理），
/// 需要由调用方在外部加锁保证同一时刻只有一个运行。
pub struct Replicator {
    log: Arc<dyn CommitLog>,
    extractor: RecordExtractor,
    checkpoints: Arc<dyn CheckpointStore>,
    store: Arc<dyn TimeSeriesStore>,
}

impl Replicator {
    pub fn new(
        log: Arc<dyn CommitLog>,
        checkpoints: Arc<dyn CheckpointStore>,
        store: Arc<dyn TimeSeriesStore>,
        schema: RecordSchema,
    ) -> Self {
        Self {
            extractor: RecordExtractor::new(log.clone(), schema),
            log,
            checkpoints,
            store,
        }
    }

    /// 读取检查点、重放增量并持久化新检查点
    pub async fn run(&self) -> Result<ReplicationReport> {
        let previous = self.checkpoints.load().await?;
        let report = self.replay(previous).await?;

        if let Some(revision) = &report.pending_checkpoint {
            self.checkpoints.save(revision).await.map_err(|e| match e {
                HygroError::CheckpointPersistFailed(_) => e,
                other => HygroError::checkpoint_persist(other.to_string()),
            })?;
            debug!(revision = %revision.short(), "Checkpoint advanced");
        }

        Ok(report)
    }

    /// 以显式传入的检查点重放增量，不读写检查点存储
    ///
    /// 返回的报告中 `pending_checkpoint` 是调用方在成功后应保存的值。
    pub async fn replay(&self, previous: Checkpoint) -> Result<ReplicationReport> {
        let span = info_span!(
            "replicator.run",
            store = self.store.name(),
            checkpoint = %previous
        );
        self.replay_inner(previous).instrument(span).await
    }

    async fn replay_inner(&self, previous: Checkpoint) -> Result<ReplicationReport> {
        self.log.sync().await?;

        let revisions = self.log.list_revisions_newest_first().await?;
        let Some(head) = revisions.first() else {
            info!("Commit log is empty, nothing to replicate");
            return Ok(ReplicationReport::empty(previous));
        };

        let mut report = ReplicationReport::empty(previous.clone());
        report.pending_checkpoint = Some(head.id.clone());

        let mut reached_checkpoint = false;
        for revision in &revisions {
            if previous.matches(&revision.id) {
                reached_checkpoint = true;
                break;
            }
            report.examined += 1;

            let record = match self.extractor.extract(&revision.id).await {
                Ok(record) => record,
                Err(e) if e.is_recoverable() => {
                    warn!(revision = %revision.id.short(), error = %e, "Skipping invalid record");
                    report.skipped_invalid += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.store.upsert(&record).await.map_err(|e| match e {
                HygroError::StoreWriteFailed(_) => e,
                other => HygroError::store_write(other.to_string()),
            })?;
            report.written += 1;

            debug!(
                revision = %revision.id.short(),
                timestamp = %record.timestamp,
                "Record replicated"
            );
        }

        if !previous.is_unset() && !reached_checkpoint {
            warn!(
                checkpoint = %previous,
                "Checkpoint not found in history, replayed the full log"
            );
        }

        info!(
            examined = report.examined,
            written = report.written,
            skipped_invalid = report.skipped_invalid,
            head = %head.id.short(),
            "Replication pass complete"
        );

        Ok(report)
    }
}
