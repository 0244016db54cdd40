//! 配置相关命令

use crate::{AppConfig, AppState};
use anyhow::Result;

/// 打印生效的配置（隐藏密钥）
pub fn show(state: &AppState) -> Result<()> {
    println!("# {}", state.config_path.display());
    println!(
        "{}",
        serde_json::to_string_pretty(&state.config.redacted())?
    );
    Ok(())
}

/// 把默认 bucket 写回配置文件
pub fn set_bucket(state: &mut AppState, bucket: &str) -> Result<()> {
    if bucket.trim().is_empty() {
        anyhow::bail!("bucket 名称不能为空");
    }
    // 基于文件内容修改，避免把环境变量里的凭证写进配置文件
    let mut on_disk = AppConfig::load(&state.config_path)?;
    on_disk.bucket = bucket.to_string();
    on_disk.save(&state.config_path)?;

    state.config.bucket = bucket.to_string();
    tracing::info!("默认 bucket 已设置为 {}", bucket);
    Ok(())
}
