use crate::message::{NotifyLevel, NotifyMessage};
use crate::notifier::{Notifier, NotifyResult};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

fn default_timeout_secs() -> u64 {
    10
}

// ============================================================================
// Webhook 通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// 以 JSON 形式 POST 整条消息
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let mut request = self
            .client
            .post(&self.config.url)
            .timeout(Duration::from_secs(self.config.timeout_secs));

        if let Some(headers) = &self.config.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        let response = request.json(message).send().await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "Webhook failed with status: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

// ============================================================================
// Slack 通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub struct SlackNotifier {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_message(&self, message: &NotifyMessage) -> serde_json::Value {
        let color = match message.level {
            NotifyLevel::Info => "good",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Error | NotifyLevel::Critical => "danger",
        };

        serde_json::json!({
            "attachments": [{
                "color": color,
                "title": message.title,
                "text": message.content,
                "fields": [
                    {
                        "title": "Level",
                        "value": format!("{:?}", message.level),
                        "short": true
                    },
                    {
                        "title": "Time",
                        "value": message.timestamp.to_rfc3339(),
                        "short": true
                    }
                ]
            }]
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let body = self.build_message(message);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "Slack failed: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "slack"
    }
}

// ============================================================================
// Pushover 推送
// ============================================================================

fn default_pushover_url() -> String {
    "https://api.pushover.net/1/messages.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushoverConfig {
    /// 应用 token
    pub token: String,
    /// 用户或分组 key
    pub user: String,
    #[serde(default = "default_pushover_url")]
    pub api_url: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub struct PushoverNotifier {
    config: PushoverConfig,
    client: reqwest::Client,
}

impl PushoverNotifier {
    pub fn new(config: PushoverConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_message(&self, message: &NotifyMessage) -> serde_json::Value {
        // 优先级 2 需要 retry/expire 参数，推送端统一降为 1
        let priority = message.level.priority().min(1);

        let mut body = serde_json::json!({
            "token": self.config.token,
            "user": self.config.user,
            "title": message.title,
            "message": message.content,
            "priority": priority,
            "timestamp": message.timestamp.timestamp(),
        });
        if let Some(device) = &self.config.device {
            body["device"] = serde_json::Value::String(device.clone());
        }
        body
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let body = self.build_message(message);

        let response = self
            .client
            .post(&self.config.api_url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "Pushover failed: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "pushover"
    }
}

// ============================================================================
// ntfy 推送
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NtfyConfig {
    /// 例如 https://ntfy.sh
    pub server: String,
    pub topic: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub struct NtfyNotifier {
    config: NtfyConfig,
    client: reqwest::Client,
}

impl NtfyNotifier {
    pub fn new(config: NtfyConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn topic_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.server.trim_end_matches('/'),
            self.config.topic
        )
    }

    fn priority(level: NotifyLevel) -> &'static str {
        match level {
            NotifyLevel::Info => "3",
            NotifyLevel::Warning => "4",
            NotifyLevel::Error | NotifyLevel::Critical => "5",
        }
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let mut request = self
            .client
            .post(self.topic_url())
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .header("Title", message.title.as_str())
            .header("Priority", Self::priority(message.level))
            .body(message.content.clone());

        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "ntfy failed: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "ntfy"
    }
}
