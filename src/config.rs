//! 应用配置模块

use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置文件名
pub const CONFIG_FILE: &str = "config.json";

/// 对象存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// 兼容 S3 的自定义端点（MinIO 等）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// bucket 内的根前缀
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// 达到该大小（字节）的文件使用分块上传
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: u64,
    /// 分块大小（字节）
    #[serde(default = "default_multipart_chunksize")]
    pub multipart_chunksize: u64,
    /// 单个文件上传时并发的分块数
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_multipart_threshold() -> u64 {
    8 * 1024 * 1024 // 8MB
}

fn default_multipart_chunksize() -> u64 {
    8 * 1024 * 1024 // 8MB
}

fn default_max_concurrency() -> usize {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            access_key: None,
            secret_key: None,
            endpoint: None,
            root: None,
            multipart_threshold: default_multipart_threshold(),
            multipart_chunksize: default_multipart_chunksize(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// 同步行为配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// 是否递归扫描子目录
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    /// 排除规则（glob patterns）
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// 远端临时故障的最大重试次数，0 表示失败立即中止
    #[serde(default)]
    pub max_retries: u32,
    /// 重试基础延迟（毫秒）
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_recursive() -> bool {
    true
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            recursive: default_recursive(),
            exclude_patterns: Vec::new(),
            max_retries: 0,
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// 要同步的本地目录
    #[serde(default = "default_target_path")]
    pub target_path: PathBuf,
    /// 同步目标 bucket
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_target_path() -> PathBuf {
    PathBuf::from(".")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_path: default_target_path(),
            bucket: String::new(),
            store: StoreConfig::default(),
            sync: SyncSettings::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        config_dir().join(CONFIG_FILE)
    }

    /// 从配置文件加载；文件不存在时返回默认配置
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("配置文件不存在，使用默认配置: {:?}", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str::<AppConfig>(&content)
            .map_err(|e| anyhow::anyhow!("配置文件格式错误 {:?}: {}", path, e))?;
        Ok(config)
    }

    /// 加载配置并应用环境变量覆盖
    pub fn load_with_env(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 用环境变量覆盖配置项，空值忽略
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(bucket) = get("BUCKETSYNC_BUCKET") {
            self.bucket = bucket;
        }
        if let Some(path) = get("BUCKETSYNC_TARGET_PATH") {
            self.target_path = PathBuf::from(path);
        }
        if let Some(region) = get("AWS_REGION") {
            self.store.region = region;
        }
        if let Some(ak) = get("AWS_ACCESS_KEY_ID") {
            self.store.access_key = Some(ak);
        }
        if let Some(sk) = get("AWS_SECRET_ACCESS_KEY") {
            self.store.secret_key = Some(sk);
        }
        if let Some(ep) = get("AWS_ENDPOINT_URL") {
            self.store.endpoint = Some(ep);
        }
    }

    /// 保存配置，保留文件中其他未知字段
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut root: serde_json::Value = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        if !root.is_object() {
            root = serde_json::json!({});
        }

        if let (Some(existing), serde_json::Value::Object(ours)) =
            (root.as_object_mut(), serde_json::to_value(self)?)
        {
            existing.extend(ours);
        }

        fs::write(path, serde_json::to_string_pretty(&root)?)?;
        Ok(())
    }

    /// 用于展示的副本，隐藏密钥
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let mask = |s: &mut Option<String>| {
            if s.is_some() {
                *s = Some("********".to_string());
            }
        };
        mask(&mut copy.store.access_key);
        mask(&mut copy.store.secret_key);
        copy
    }
}

/// 应用配置目录
pub fn config_dir() -> PathBuf {
    crate::dirs::config_dir()
        .map(|p| p.join("bucketsync"))
        .unwrap_or_else(|| PathBuf::from(".bucketsync"))
}
