pub mod memory;
pub mod s3;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub use memory::MemoryStore;
pub use s3::S3Store;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, list 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 对象元数据中记录内容指纹的键
///
/// 键名沿用 `md5sum` 以保持 bucket 布局不变，但值是 128 位 BLAKE3 十六进制摘要，
/// 不是 MD5。由 MD5 工具上传的对象会被判定为 NOT_SYNCED 并重新上传一次。
pub const FINGERPRINT_KEY: &str = "md5sum";

/// 对象的用户元数据（扁平的字符串映射）
pub type Metadata = HashMap<String, String>;

/// 远端对象信息
#[derive(Debug, Clone, Default)]
pub struct ObjectMeta {
    pub size: u64,
    pub metadata: Metadata,
}

impl ObjectMeta {
    /// 上传时记录的指纹
    pub fn fingerprint(&self) -> Option<&str> {
        self.metadata.get(FINGERPRINT_KEY).map(String::as_str)
    }
}

/// 按 key 查询对象的结果；其他失败走 `Err`
#[derive(Debug, Clone)]
pub enum ObjectLookup {
    Found(ObjectMeta),
    NotFound,
}

/// 对象存储抽象接口，所有操作都限定在一个 bucket 内
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 当前绑定的 bucket
    fn bucket(&self) -> &str;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;

    /// 查询对象，区分 "不存在" 与其他失败
    async fn head(&self, key: &str) -> StoreResult<ObjectLookup>;

    /// 获取对象元数据，对象不存在时返回 `StoreError::NotFound`
    async fn metadata(&self, key: &str) -> StoreResult<Metadata> {
        match self.head(key).await? {
            ObjectLookup::Found(meta) => Ok(meta.metadata),
            ObjectLookup::NotFound => Err(StoreError::NotFound(key.to_string())),
        }
    }

    /// 检查对象是否存在
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(matches!(self.head(key).await?, ObjectLookup::Found(_)))
    }

    /// 用本地文件整体替换对象及其元数据
    async fn put_object(&self, key: &str, local_path: &Path, metadata: Metadata) -> StoreResult<()>;

    /// 列出 bucket 内所有对象的 key
    async fn list_objects(&self) -> StoreResult<Vec<String>>;

    /// 下载对象到本地路径（自动创建父目录）
    async fn download_object(&self, key: &str, local_path: &Path) -> StoreResult<()>;

    /// 构造一个绑定到另一个 bucket 的新客户端
    fn with_bucket(&self, bucket: &str) -> StoreResult<Arc<dyn ObjectStore>>;
}

/// 根据配置创建 S3 存储实例
pub fn create_store(config: &StoreConfig, bucket: &str) -> StoreResult<Arc<dyn ObjectStore>> {
    tracing::info!("初始化S3存储: bucket={}, region={}", bucket, config.region);
    Ok(Arc::new(S3Store::new(config.clone(), bucket)?) as Arc<dyn ObjectStore>)
}

/// 规范化对象 key（统一使用 /，去掉开头的分隔符）
pub fn normalize_key(key: &str) -> String {
    key.replace('\\', "/").trim_start_matches('/').to_string()
}
