//! 扫描与同步命令

use crate::core::{ScanEntry, SyncReport, SyncState};
use crate::AppState;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// 解析要同步的目录：命令行参数优先，其次是配置文件
fn resolve_root(state: &AppState, path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| state.config.target_path.clone())
}

/// 预览每个文件的同步状态
pub async fn scan(state: &AppState, path: Option<PathBuf>, json: bool) -> Result<()> {
    let root = resolve_root(state, path);
    let engine = state.engine()?;
    let entries = engine
        .scan(&root)
        .await
        .with_context(|| format!("扫描失败: {}", root.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print_entries(&entries);
        println!("{}", summarize(&entries));
    }
    Ok(())
}

/// 执行同步
pub async fn sync(
    state: &AppState,
    path: Option<PathBuf>,
    dry_run: bool,
    no_recursive: bool,
    json: bool,
) -> Result<()> {
    let root = resolve_root(state, path);

    let mut state = state.clone();
    if no_recursive {
        state.config.sync.recursive = false;
    }

    let engine = state.engine()?;
    let report = engine
        .sync(&root, dry_run)
        .await
        .with_context(|| format!("同步失败: {} -> {}", root.display(), engine.bucket()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_entries(&report.entries);
        println!("{}", report_line(&report));
    }
    Ok(())
}

fn print_entries(entries: &[ScanEntry]) {
    let width = entries.iter().map(|e| e.path.len()).max().unwrap_or(0);
    for entry in entries {
        println!(
            "{:<width$}  {}  {}",
            entry.path,
            entry.kind,
            entry.state,
            width = width
        );
    }
}

/// 按状态统计扫描结果
pub fn summarize(entries: &[ScanEntry]) -> String {
    let count = |s: SyncState| entries.iter().filter(|e| e.state == s).count();
    format!(
        "{} files: {} synced, {} not synced, {} not uploaded",
        entries.len(),
        count(SyncState::Synced),
        count(SyncState::NotSynced),
        count(SyncState::NotUploaded)
    )
}

fn report_line(report: &SyncReport) -> String {
    let elapsed = report.finished_at - report.started_at;
    if report.dry_run {
        format!(
            "[dry-run] {} files scanned, {} would be uploaded, {} up to date ({} ms)",
            report.files_scanned,
            report.files_pending,
            report.files_skipped,
            elapsed.num_milliseconds()
        )
    } else {
        format!(
            "{} files scanned, {} uploaded ({} bytes), {} up to date ({} ms)",
            report.files_scanned,
            report.files_uploaded,
            report.bytes_uploaded,
            report.files_skipped,
            elapsed.num_milliseconds()
        )
    }
}
