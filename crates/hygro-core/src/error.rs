use thiserror::Error;

/// HYGRO 统一错误类型
#[derive(Error, Debug)]
pub enum HygroError {
    /// 提交日志同步/读取失败，或最新记录端点不可用
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// 记录校验失败（必填字段缺失或为 null）
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// 快照或响应内容无法解析
    #[error("Parse error: {0}")]
    Parse(String),

    /// 时序库写入失败
    #[error("Store write failed: {0}")]
    StoreWriteFailed(String),

    /// 检查点持久化失败
    #[error("Checkpoint persist failed: {0}")]
    CheckpointPersistFailed(String),

    /// 通知发送失败
    #[error("Notification failed: {0}")]
    NotifyFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, HygroError>;

impl HygroError {
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        HygroError::SourceUnavailable(msg.into())
    }

    pub fn invalid_record(msg: impl Into<String>) -> Self {
        HygroError::InvalidRecord(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        HygroError::Parse(msg.into())
    }

    pub fn store_write(msg: impl Into<String>) -> Self {
        HygroError::StoreWriteFailed(msg.into())
    }

    pub fn checkpoint_persist(msg: impl Into<String>) -> Self {
        HygroError::CheckpointPersistFailed(msg.into())
    }

    pub fn notify(msg: impl Into<String>) -> Self {
        HygroError::NotifyFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        HygroError::Config(msg.into())
    }

    /// 单条记录级别的错误：跳过该记录并继续处理其余记录
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HygroError::InvalidRecord(_) | HygroError::Parse(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(HygroError::invalid_record("humidity is null").is_recoverable());
        assert!(HygroError::parse("not json").is_recoverable());
        assert!(!HygroError::source_unavailable("pull failed").is_recoverable());
        assert!(!HygroError::store_write("timeout").is_recoverable());
        assert!(!HygroError::checkpoint_persist("disk full").is_recoverable());
        assert!(!HygroError::notify("503").is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = HygroError::store_write("connection reset");
        assert_eq!(err.to_string(), "Store write failed: connection reset");
    }
}
