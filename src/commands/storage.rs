//! bucket 诊断命令

use crate::AppState;
use anyhow::{Context, Result};
use std::path::Path;

/// 列出 bucket 内所有对象
pub async fn list(state: &AppState) -> Result<()> {
    let engine = state.engine()?;
    let store = engine.store();
    let keys = store
        .list_objects()
        .await
        .with_context(|| format!("无法列出 {}", store.name()))?;

    for key in &keys {
        println!("{}", key);
    }
    tracing::info!("{} 中共有 {} 个对象", store.name(), keys.len());
    Ok(())
}

/// 下载单个对象到本地
pub async fn download(state: &AppState, key: &str, dest: &Path) -> Result<()> {
    let engine = state.engine()?;
    engine
        .store()
        .download_object(key, dest)
        .await
        .with_context(|| format!("下载失败: {} -> {}", key, dest.display()))?;

    tracing::info!("已下载: {} -> {}", key, dest.display());
    Ok(())
}
