use async_trait::async_trait;
use hygro_core::{CommitLog, HygroError, Result, Revision, RevisionId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Git 提交日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLogConfig {
    /// 本地工作副本路径
    pub repo_path: PathBuf,

    /// 上游远端；为空时不做同步（仅读取本地历史）
    #[serde(default)]
    pub remote: Option<String>,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// 快照文件在仓库中的相对路径
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    /// 每次 git 调用的超时（秒）
    #[serde(default = "default_git_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_snapshot_path() -> String {
    "data.json".to_string()
}

fn default_git_timeout_secs() -> u64 {
    60
}

impl GitLogConfig {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            remote: None,
            branch: default_branch(),
            snapshot_path: default_snapshot_path(),
            timeout_secs: default_git_timeout_secs(),
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self.branch = branch.into();
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<String>) -> Self {
        self.snapshot_path = path.into();
        self
    }
}

/// 基于 git 命令行的提交日志
///
/// 每个提交中的快照文件就是一条历史读数。
///
/// 假定历史是线性的（单一写入者只做追加提交）。若出现合并提交，
/// 按拓扑顺序遍历，前驱取第一父提交。
pub struct GitCommitLog {
    config: GitLogConfig,
    timeout: Duration,
}

impl GitCommitLog {
    pub fn new(config: GitLogConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        Self { config, timeout }
    }

    pub fn config(&self) -> &GitLogConfig {
        &self.config
    }

    async fn git(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(&self.config.repo_path)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let subcommand = args.first().copied().unwrap_or("");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                HygroError::source_unavailable(format!(
                    "git {} timed out after {:?}",
                    subcommand, self.timeout
                ))
            })?
            .map_err(|e| HygroError::source_unavailable(format!("failed to run git: {}", e)))?;

        Ok(output)
    }

    fn failure(subcommand: &str, output: &Output) -> HygroError {
        HygroError::source_unavailable(format!(
            "git {} exited with {}: {}",
            subcommand,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}

#[async_trait]
impl CommitLog for GitCommitLog {
    async fn sync(&self) -> Result<()> {
        let Some(remote) = self.config.remote.as_deref() else {
            debug!("No remote configured, skipping sync");
            return Ok(());
        };

        let output = self
            .git(&["pull", "--ff-only", "--quiet", remote, &self.config.branch])
            .await?;
        if !output.status.success() {
            return Err(Self::failure("pull", &output));
        }

        info!(remote = %remote, branch = %self.config.branch, "Commit log synchronized");
        Ok(())
    }

    async fn list_revisions_newest_first(&self) -> Result<Vec<Revision>> {
        let output = self.git(&["rev-parse", "--git-dir"]).await?;
        if !output.status.success() {
            return Err(Self::failure("rev-parse", &output));
        }

        // 没有任何提交的仓库
        let output = self.git(&["rev-parse", "--verify", "--quiet", "HEAD"]).await?;
        if !output.status.success() {
            debug!("Repository has no commits");
            return Ok(Vec::new());
        }

        let output = self
            .git(&["rev-list", "--topo-order", "--parents", "HEAD"])
            .await?;
        if !output.status.success() {
            return Err(Self::failure("rev-list", &output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let revisions: Vec<Revision> = stdout
            .lines()
            .filter_map(|line| {
                let mut ids = line.split_whitespace();
                let id = ids.next()?;
                let predecessor = ids.next().map(RevisionId::from);
                Some(Revision::new(id, predecessor))
            })
            .collect();

        debug!(count = revisions.len(), "Listed revisions");
        Ok(revisions)
    }

    async fn read_snapshot(&self, revision: &RevisionId) -> Result<Vec<u8>> {
        let object = format!("{}:{}", revision, self.config.snapshot_path);

        // 按退出码区分"提交里没有快照"和"提交本身不存在"
        let output = self.git(&["cat-file", "-e", &object]).await?;
        if !output.status.success() {
            let commit = format!("{}^{{commit}}", revision);
            let output = self.git(&["cat-file", "-e", &commit]).await?;
            if !output.status.success() {
                return Err(Self::failure("cat-file", &output));
            }
            return Err(HygroError::invalid_record(format!(
                "revision {} has no '{}'",
                revision.short(),
                self.config.snapshot_path
            )));
        }

        let output = self.git(&["show", &object]).await?;
        if !output.status.success() {
            return Err(Self::failure("show", &output));
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: GitLogConfig = serde_json::from_str(r#"{"repo_path": "/srv/sensor-data"}"#).unwrap();
        assert_eq!(config.branch, "main");
        assert_eq!(config.snapshot_path, "data.json");
        assert_eq!(config.timeout_secs, 60);
        assert!(config.remote.is_none());
    }

    #[tokio::test]
    async fn test_missing_repository_is_source_unavailable() {
        let log = GitCommitLog::new(GitLogConfig::new("/nonexistent/hygro/repo"));
        let err = log.list_revisions_newest_first().await.unwrap_err();
        assert!(matches!(err, HygroError::SourceUnavailable(_)));
    }
}
