use crate::core::fingerprint::Fingerprint;
use crate::error::StoreResult;
use crate::storage::{ObjectLookup, ObjectStore};
use serde::Serialize;
use std::fmt;

/// 本地文件相对远端的同步状态，每次扫描重新计算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    /// 远端不存在
    NotUploaded,
    /// 指纹一致
    Synced,
    /// 远端存在但指纹不同或缺失
    NotSynced,
    /// 本次运行已上传
    Uploaded,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::NotUploaded => "NOT_UPLOADED",
            SyncState::Synced => "SYNCED",
            SyncState::NotSynced => "NOT_SYNCED",
            SyncState::Uploaded => "UPLOADED",
        }
    }

    /// 是否需要上传
    pub fn needs_upload(&self) -> bool {
        matches!(self, SyncState::NotUploaded | SyncState::NotSynced)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 条目类型，扫描只产出普通文件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    File,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => f.write_str("FILE"),
        }
    }
}

/// 根据远端查询结果判定状态；指纹按字符串精确比较
pub fn compare(lookup: &ObjectLookup, local: &Fingerprint) -> SyncState {
    match lookup {
        ObjectLookup::NotFound => SyncState::NotUploaded,
        ObjectLookup::Found(meta) => match meta.fingerprint() {
            Some(remote) if remote == local.as_str() => SyncState::Synced,
            _ => SyncState::NotSynced,
        },
    }
}

/// 查询远端并判定状态。除 "不存在" 以外的远端失败原样返回
pub async fn classify(
    store: &dyn ObjectStore,
    key: &str,
    local: &Fingerprint,
) -> StoreResult<SyncState> {
    let lookup = store.head(key).await?;
    Ok(compare(&lookup, local))
}
