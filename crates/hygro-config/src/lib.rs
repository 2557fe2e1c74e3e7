pub mod app;
pub mod loader;

pub use app::{
    AppConfig, ChannelConfig, CheckpointConfig, MonitorConfig, NotifyConfig, RecordConfig,
    StoreBackend, StoreConfig,
};
pub use loader::{ConfigLoader, DEFAULT_CONFIG_FILE, ENV_PREFIX};
