use crate::error::{HygroError, Result};
use crate::model::{Checkpoint, RevisionId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// 单槽检查点存储，覆盖写语义，需跨进程重启持久
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 读取检查点，从未保存过时返回 unset
    async fn load(&self) -> Result<Checkpoint>;

    /// 覆盖保存检查点
    async fn save(&self, revision: &RevisionId) -> Result<()>;

    /// 清空检查点，下一次运行将全量回填
    async fn clear(&self) -> Result<()>;
}

/// 内存检查点存储
#[derive(Default)]
pub struct MemoryCheckpointStore {
    slot: RwLock<Checkpoint>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            slot: RwLock::new(checkpoint),
            ..Self::default()
        }
    }

    /// 模拟持久化失败（例如在写入检查点前进程崩溃）
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// 成功保存的次数
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Checkpoint> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, revision: &RevisionId) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(HygroError::checkpoint_persist("simulated persist failure"));
        }
        *self.slot.write().await = Checkpoint::at(revision.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.write().await = Checkpoint::unset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_checkpoint_overwrite() {
        let store = MemoryCheckpointStore::new();
        assert!(store.load().await.unwrap().is_unset());

        store.save(&RevisionId::from("r1")).await.unwrap();
        store.save(&RevisionId::from("r2")).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Checkpoint::at("r2"));
        assert_eq!(store.save_count(), 2);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_unset());
    }

    #[tokio::test]
    async fn test_memory_checkpoint_failure_keeps_previous() {
        let store = MemoryCheckpointStore::with_checkpoint(Checkpoint::at("r1"));
        store.set_fail_saves(true);

        let err = store.save(&RevisionId::from("r2")).await.unwrap_err();
        assert!(matches!(err, HygroError::CheckpointPersistFailed(_)));
        assert_eq!(store.load().await.unwrap(), Checkpoint::at("r1"));
    }
}
