use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hygro_core::{Checkpoint, CheckpointStore, HygroError, Result, RevisionId};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    revision: RevisionId,
    saved_at: DateTime<Utc>,
}

/// 文件检查点存储
///
/// 先写临时文件再原子重命名，进程中断时要么保留旧值要么是新值。
/// 也能读取只包含一行提交哈希的纯文本文件。
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    async fn write_atomic(&self, contents: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Result<Checkpoint> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Checkpoint::unset()),
            Err(e) => return Err(e.into()),
        };

        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(Checkpoint::unset());
        }

        if trimmed.starts_with('{') {
            let file: CheckpointFile = serde_json::from_str(trimmed)?;
            return Ok(Checkpoint::at(file.revision));
        }

        Ok(Checkpoint::at(trimmed))
    }

    async fn save(&self, revision: &RevisionId) -> Result<()> {
        let file = CheckpointFile {
            revision: revision.clone(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_vec_pretty(&file)
            .map_err(|e| HygroError::checkpoint_persist(e.to_string()))?;

        self.write_atomic(&contents).await.map_err(|e| {
            HygroError::checkpoint_persist(format!("{}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), revision = %revision.short(), "Checkpoint saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HygroError::checkpoint_persist(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}
