use crate::message::{NotifyChannel, NotifyLevel, NotifyMessage};
use crate::notifier::{Notifier, NotifyResult};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{error, info};

/// 通知管理器
///
/// 向所有已注册渠道扇出；任一渠道失败则整体失败，由调用方上报。
pub struct NotifyManager {
    notifiers: RwLock<HashMap<NotifyChannel, Box<dyn Notifier>>>,

    /// 最小通知级别
    min_level: NotifyLevel,
}

impl NotifyManager {
    pub fn new(min_level: NotifyLevel) -> Self {
        Self {
            notifiers: RwLock::new(HashMap::new()),
            min_level,
        }
    }

    /// 注册通知器（同一渠道会被覆盖）
    pub async fn register(&self, channel: NotifyChannel, notifier: Box<dyn Notifier>) {
        let mut notifiers = self.notifiers.write().await;
        info!("Registered notifier: {}", notifier.name());
        notifiers.insert(channel, notifier);
    }

    pub async fn channel_count(&self) -> usize {
        self.notifiers.read().await.len()
    }

    /// 发送通知到指定渠道
    pub async fn send_to(&self, channel: NotifyChannel, message: &NotifyMessage) -> Result<NotifyResult> {
        if !self.should_notify(message.level) {
            return Ok(self.filtered(message));
        }

        let notifiers = self.notifiers.read().await;
        let notifier = notifiers
            .get(&channel)
            .ok_or_else(|| anyhow!("No notifier registered for {:?}", channel))?;

        Self::deliver(notifier.as_ref(), message).await
    }

    /// 发送通知到所有渠道
    pub async fn broadcast(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        if !self.should_notify(message.level) {
            return Ok(self.filtered(message));
        }

        let notifiers = self.notifiers.read().await;
        let mut delivered = 0usize;
        let mut failures = Vec::new();

        for notifier in notifiers.values().filter(|n| n.is_enabled()) {
            match Self::deliver(notifier.as_ref(), message).await {
                Ok(result) if result.success => delivered += 1,
                Ok(result) => failures.push(format!("{}: {}", notifier.name(), result.message)),
                Err(e) => failures.push(format!("{}: {}", notifier.name(), e)),
            }
        }

        if !failures.is_empty() {
            return Ok(NotifyResult::failure(failures.join("; ")));
        }
        if delivered == 0 {
            return Ok(NotifyResult::failure("No enabled notifiers"));
        }

        Ok(NotifyResult::success())
    }

    async fn deliver(notifier: &dyn Notifier, message: &NotifyMessage) -> Result<NotifyResult> {
        match notifier.send(message).await {
            Ok(result) => {
                if result.success {
                    info!("Notification sent via {}: {}", notifier.name(), message.title);
                } else {
                    error!("Notification failed via {}: {}", notifier.name(), result.message);
                }
                Ok(result)
            }
            Err(e) => {
                error!("Notification error via {}: {}", notifier.name(), e);
                Err(e)
            }
        }
    }

    /// 低于最小级别的消息不会发往任何渠道，视为未送达
    fn filtered(&self, message: &NotifyMessage) -> NotifyResult {
        NotifyResult::failure(format!(
            "message level {:?} is below min_level {:?}, not delivered",
            message.level, self.min_level
        ))
    }

    fn should_notify(&self, level: NotifyLevel) -> bool {
        level >= self.min_level
    }
}

impl Default for NotifyManager {
    fn default() -> Self {
        Self::new(NotifyLevel::Info)
    }
}

#[async_trait]
impl Notifier for NotifyManager {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        self.broadcast(message).await
    }

    fn name(&self) -> &str {
        "manager"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingNotifier {
        sent: Arc<AtomicUsize>,
        succeed: bool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send(&self, _message: &NotifyMessage) -> Result<NotifyResult> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(NotifyResult::success())
            } else {
                Ok(NotifyResult::failure("rejected"))
            }
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_level_filter() {
        let manager = NotifyManager::new(NotifyLevel::Warning);
        assert!(manager.should_notify(NotifyLevel::Warning));
        assert!(manager.should_notify(NotifyLevel::Critical));
        assert!(!manager.should_notify(NotifyLevel::Info));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_channel() {
        let sent = Arc::new(AtomicUsize::new(0));
        let manager = NotifyManager::default();
        manager
            .register(
                NotifyChannel::Webhook,
                Box::new(CountingNotifier { sent: sent.clone(), succeed: true }),
            )
            .await;
        manager
            .register(
                NotifyChannel::Ntfy,
                Box::new(CountingNotifier { sent: sent.clone(), succeed: true }),
            )
            .await;

        let result = manager
            .broadcast(&NotifyMessage::warning("Sensor offline", "No data"))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_broadcast_surfaces_failure() {
        let sent = Arc::new(AtomicUsize::new(0));
        let manager = NotifyManager::default();
        manager
            .register(
                NotifyChannel::Webhook,
                Box::new(CountingNotifier { sent: sent.clone(), succeed: true }),
            )
            .await;
        manager
            .register(
                NotifyChannel::Slack,
                Box::new(CountingNotifier { sent: sent.clone(), succeed: false }),
            )
            .await;

        let result = manager
            .send(&NotifyMessage::warning("Sensor offline", "No data"))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.contains("rejected"));
        // 不重试
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_message_below_min_level_is_not_reported_as_sent() {
        let sent = Arc::new(AtomicUsize::new(0));
        let manager = NotifyManager::new(NotifyLevel::Error);
        manager
            .register(
                NotifyChannel::Webhook,
                Box::new(CountingNotifier { sent: sent.clone(), succeed: true }),
            )
            .await;

        let message = NotifyMessage::warning("Sensor offline", "No data");
        let result = manager.broadcast(&message).await.unwrap();
        assert!(!result.success);
        assert!(result.message.contains("min_level"));

        let result = manager.send_to(NotifyChannel::Webhook, &message).await.unwrap();
        assert!(!result.success);
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_broadcast_without_channels_fails() {
        let manager = NotifyManager::default();
        let result = manager
            .broadcast(&NotifyMessage::warning("Sensor offline", "No data"))
            .await
            .unwrap();
        assert!(!result.success);
    }
}
