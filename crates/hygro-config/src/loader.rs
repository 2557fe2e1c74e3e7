use crate::app::AppConfig;
use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "hygro.toml";

/// 环境变量前缀，例如 `HYGRO__MONITOR__LATEST_URL`
pub const ENV_PREFIX: &str = "HYGRO";

/// 配置加载器
///
/// 文件在下，环境变量在上；文件不存在时只使用默认值和环境变量。
pub struct ConfigLoader {
    path: PathBuf,
    env_prefix: String,
    require_file: bool,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            env_prefix: ENV_PREFIX.to_string(),
            require_file: false,
        }
    }

    /// 文件缺失时报错（用于显式传入 `--config` 的情况）
    pub fn require_file(mut self) -> Self {
        self.require_file = true;
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载并校验配置
    pub fn load(&self) -> Result<AppConfig> {
        let config = self.load_unchecked()?;
        config.validate()?;

        for warning in config.warnings() {
            warn!("{}", warning);
        }

        Ok(config)
    }

    /// 只加载，不做校验
    pub fn load_unchecked(&self) -> Result<AppConfig> {
        let mut builder = Config::builder();

        if self.path.exists() {
            debug!(path = %self.path.display(), "Loading config file");
            builder = builder.add_source(File::new(
                self.path
                    .to_str()
                    .ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ));
        } else if self.require_file {
            return Err(anyhow!("Config file not found: {}", self.path.display()));
        } else {
            debug!(path = %self.path.display(), "Config file not found, using defaults");
        }

        let config = builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 从字符串加载（不读取环境变量）
    pub fn load_str(contents: &str) -> Result<AppConfig> {
        let config = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILE)
    }
}
