//! 错误类型

use std::path::PathBuf;
use thiserror::Error;

/// 对象存储操作的结果类型
pub type StoreResult<T> = Result<T, StoreError>;

/// 同步操作的结果类型
pub type SyncResult<T> = Result<T, SyncError>;

/// 对象存储客户端返回的错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 对象不存在（404）
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// 网络抖动、超时、限流等可重试的失败
    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("invalid store configuration: {0}")]
    Config(String),

    #[error("local io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store operation failed: {0}")]
    Other(String),
}

impl StoreError {
    /// 是否值得重试
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<opendal::Error> for StoreError {
    fn from(e: opendal::Error) -> Self {
        use opendal::ErrorKind;

        let message = e.to_string();
        match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(message),
            ErrorKind::PermissionDenied => StoreError::PermissionDenied(message),
            ErrorKind::ConfigInvalid => StoreError::Config(message),
            _ if e.is_temporary() => StoreError::Transient(message),
            ErrorKind::RateLimited => StoreError::Transient(message),
            _ => StoreError::Other(message),
        }
    }
}

/// 同步引擎对调用方暴露的错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// 配置错误：bucket 为空、根目录不可读等，在任何工作开始前抛出
    #[error("configuration error: {0}")]
    Config(String),

    /// 远端存储失败（不含 404，404 由分类逻辑消化）
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}
