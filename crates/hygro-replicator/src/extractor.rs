use hygro_core::{CommitLog, Record, RecordSchema, Result, RevisionId};
use std::sync::Arc;

/// 读取修订快照并解析、校验为记录
pub struct RecordExtractor {
    log: Arc<dyn CommitLog>,
    schema: RecordSchema,
}

impl RecordExtractor {
    pub fn new(log: Arc<dyn CommitLog>, schema: RecordSchema) -> Self {
        Self { log, schema }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub async fn extract(&self, revision: &RevisionId) -> Result<Record> {
        let raw = self.log.read_snapshot(revision).await?;
        self.schema.extract(&raw)
    }
}
