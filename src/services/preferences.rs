//! 用户偏好存储
//!
//! 只保存自动重跑开关和间隔，控制器本身不接触存储

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::{AppResult, ConfigError};
use crate::models::job::{AutoRerunConfig, DEFAULT_RERUN_INTERVAL_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub auto_rerun_enabled: bool,
    pub auto_rerun_interval: i64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_rerun_enabled: false,
            auto_rerun_interval: DEFAULT_RERUN_INTERVAL_SECS as i64,
        }
    }
}

impl From<AutoRerunConfig> for Preferences {
    fn from(config: AutoRerunConfig) -> Self {
        Self {
            auto_rerun_enabled: config.enabled,
            auto_rerun_interval: config.interval_seconds() as i64,
        }
    }
}

/// TOML 文件形式的偏好存储
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 读取偏好，文件不存在时返回默认值
    pub async fn load(&self) -> AppResult<Preferences> {
        if !fs::try_exists(&self.path).await? {
            debug!("偏好文件 {} 不存在，使用默认值", self.path.display());
            return Ok(Preferences::default());
        }

        let content = fs::read_to_string(&self.path).await?;
        let prefs = toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(prefs)
    }

    pub async fn save(&self, prefs: &Preferences) -> AppResult<()> {
        let content =
            toml::to_string(prefs).map_err(|source| ConfigError::TomlSerializeFailed {
                what: "preferences".to_string(),
                source,
            })?;
        fs::write(&self.path, content).await?;
        debug!("偏好已保存到 {}", self.path.display());
        Ok(())
    }
}
