use std::path::PathBuf;

pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::{AppConfig, StoreConfig, SyncSettings};
pub use core::{ScanEntry, SyncConfig, SyncEngine, SyncReport, SyncState};
pub use error::{StoreError, SyncError};
pub use storage::{create_store, MemoryStore, ObjectLookup, ObjectStore, S3Store};

/// 应用状态，在各命令之间共享
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub config_path: PathBuf,
}

impl AppState {
    /// 加载配置文件和环境变量；命令行指定的 bucket 优先级最高
    ///
    /// 显式传入的空 bucket 原样生效，由 `engine` 报配置错误，不回退到配置文件。
    pub fn load(config_path: Option<PathBuf>, bucket: Option<String>) -> anyhow::Result<Self> {
        let config_path = config_path.unwrap_or_else(AppConfig::default_path);
        let mut config = AppConfig::load_with_env(&config_path)?;

        if let Some(bucket) = bucket {
            config.bucket = bucket;
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// 为当前配置的 bucket 创建同步引擎
    pub fn engine(&self) -> Result<SyncEngine, SyncError> {
        if self.config.bucket.trim().is_empty() {
            return Err(SyncError::Config("bucket name is missing".to_string()));
        }

        let store = create_store(&self.config.store, &self.config.bucket).map_err(|e| match e {
            StoreError::Config(msg) => SyncError::Config(msg),
            other => SyncError::Store(other),
        })?;

        Ok(SyncEngine::with_config(
            store,
            SyncConfig::from(&self.config.sync),
        ))
    }
}

pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            // Linux，优先 XDG_CONFIG_HOME
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }
    }
}
