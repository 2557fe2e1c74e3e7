use crate::store::TimeSeriesStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hygro_core::{Record, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// 内存时序存储
///
/// 以时间戳为键的有序映射，用于测试和 dry-run。
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<DateTime<Utc>, Record>>,
    upserts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按时间升序返回所有记录
    pub async fn records(&self) -> Vec<Record> {
        self.records.read().await.values().cloned().collect()
    }

    pub async fn get(&self, timestamp: &DateTime<Utc>) -> Option<Record> {
        self.records.read().await.get(timestamp).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// `upsert` 调用总次数（包括覆盖写）
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn upsert(&self, record: &Record) -> Result<()> {
        let replaced = self
            .records
            .write()
            .await
            .insert(record.timestamp, record.clone())
            .is_some();
        self.upserts.fetch_add(1, Ordering::SeqCst);

        debug!(timestamp = %record.timestamp, replaced, "Record upserted to memory store");
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
