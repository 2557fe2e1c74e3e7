pub mod manager;
pub mod message;
pub mod notifier;
pub mod providers;

pub use manager::NotifyManager;
pub use message::{NotifyChannel, NotifyLevel, NotifyMessage};
pub use notifier::{Notifier, NotifyResult};
pub use providers::{
    NtfyConfig, NtfyNotifier, PushoverConfig, PushoverNotifier, SlackConfig, SlackNotifier,
    WebhookConfig, WebhookNotifier,
};
