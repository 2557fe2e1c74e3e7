use crate::error::{HygroError, Result};
use crate::model::{Revision, RevisionId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// 只追加的提交日志
///
/// 实现必须在一次运行内给出稳定一致的全序。
#[async_trait]
pub trait CommitLog: Send + Sync {
    /// 与上游同步本地视图
    async fn sync(&self) -> Result<()>;

    /// 从最新到最旧列出 head 可达的所有修订
    async fn list_revisions_newest_first(&self) -> Result<Vec<Revision>>;

    /// 读取指定修订的快照内容
    async fn read_snapshot(&self, revision: &RevisionId) -> Result<Vec<u8>>;
}

/// 内存提交日志
///
/// 修订按追加顺序保存，并记录快照读取顺序，便于验证遍历方向。
#[derive(Default)]
pub struct MemoryCommitLog {
    revisions: RwLock<Vec<(RevisionId, Vec<u8>)>>,
    reads: RwLock<Vec<RevisionId>>,
    unreachable: AtomicBool,
}

impl MemoryCommitLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个修订（成为新的 head）
    pub async fn append(&self, id: impl Into<RevisionId>, snapshot: impl Into<Vec<u8>>) {
        self.revisions
            .write()
            .await
            .push((id.into(), snapshot.into()));
    }

    /// 模拟上游不可达
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// 已读取的快照（按读取顺序）
    pub async fn reads(&self) -> Vec<RevisionId> {
        self.reads.read().await.clone()
    }

    pub async fn clear_reads(&self) {
        self.reads.write().await.clear();
    }
}

#[async_trait]
impl CommitLog for MemoryCommitLog {
    async fn sync(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(HygroError::source_unavailable("upstream unreachable"));
        }
        Ok(())
    }

    async fn list_revisions_newest_first(&self) -> Result<Vec<Revision>> {
        let revisions = self.revisions.read().await;
        let listed = revisions
            .iter()
            .enumerate()
            .rev()
            .map(|(idx, (id, _))| {
                let predecessor = idx
                    .checked_sub(1)
                    .map(|prev| revisions[prev].0.clone());
                Revision::new(id.clone(), predecessor)
            })
            .collect();
        Ok(listed)
    }

    async fn read_snapshot(&self, revision: &RevisionId) -> Result<Vec<u8>> {
        self.reads.write().await.push(revision.clone());

        let revisions = self.revisions.read().await;
        revisions
            .iter()
            .find(|(id, _)| id == revision)
            .map(|(_, snapshot)| snapshot.clone())
            .ok_or_else(|| HygroError::source_unavailable(format!("unknown revision {}", revision)))
    }
}
