use crate::message::NotifyMessage;
use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// 单次发送的结果
///
/// `success == false` 表示对端明确拒绝（非 2xx、API 返回错误等），
/// 与传输层错误 `Err` 区分开。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyResult {
    pub success: bool,
    pub message: String,
}

impl NotifyResult {
    pub fn success() -> Self {
        Self {
            success: true,
            message: "delivered".to_string(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    /// 拒绝折叠为错误
    pub fn into_result(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(anyhow!(self.message))
        }
    }
}

/// 通知器
///
/// 实现不得在内部重试；失败交给调用方上报，下一次调度即是重试。
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult>;

    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    /// 发送一次，传输错误和对端拒绝都返回 `Err`
    async fn send_checked(&self, message: &NotifyMessage) -> Result<()> {
        self.send(message).await?.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Rejecting {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for Rejecting {
        async fn send(&self, _message: &NotifyMessage) -> Result<NotifyResult> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(NotifyResult::failure("HTTP 429"))
        }

        fn name(&self) -> &str {
            "rejecting"
        }
    }

    #[tokio::test]
    async fn test_send_checked_surfaces_rejection_without_retry() {
        let notifier = Rejecting {
            attempts: AtomicUsize::new(0),
        };
        let err = notifier
            .send_checked(&NotifyMessage::warning("stale", "no data"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "HTTP 429");
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_into_result() {
        assert!(NotifyResult::success().into_result().is_ok());
        assert!(NotifyResult::failure("nope").into_result().is_err());
    }
}
