use crate::config::SyncSettings;
use crate::core::classifier::{self, EntryKind, SyncState};
use crate::core::fingerprint::{self, Fingerprint};
use crate::core::scanner::{FileEntry, FileScanner, ScanConfig};
use crate::error::{StoreError, StoreResult, SyncError, SyncResult};
use crate::storage::{Metadata, ObjectStore, FINGERPRINT_KEY};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 扫描配置
    pub scan_config: ScanConfig,
    /// 远端临时故障的最大重试次数
    pub max_retries: u32,
    /// 重试基础延迟（毫秒）
    pub retry_base_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scan_config: ScanConfig::default(),
            max_retries: 0,
            retry_base_delay_ms: 500,
        }
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            scan_config: ScanConfig {
                recursive: settings.recursive,
                exclude_patterns: settings.exclude_patterns.clone(),
            },
            max_retries: settings.max_retries,
            retry_base_delay_ms: settings.retry_base_delay_ms,
        }
    }
}

/// 已计算指纹的本地文件
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub entry: FileEntry,
    pub kind: EntryKind,
    pub fingerprint: Fingerprint,
}

/// 单个文件的扫描/同步结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEntry {
    pub path: String,
    pub kind: EntryKind,
    pub state: SyncState,
    pub fingerprint: Fingerprint,
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub bucket: String,
    pub dry_run: bool,
    pub files_scanned: u32,
    pub files_uploaded: u32,
    /// 演练模式下需要上传但未上传的文件数
    pub files_pending: u32,
    pub files_skipped: u32,
    pub bytes_uploaded: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<ScanEntry>,
}

impl SyncReport {
    fn new(bucket: &str, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            bucket: bucket.to_string(),
            dry_run,
            files_scanned: 0,
            files_uploaded: 0,
            files_pending: 0,
            files_skipped: 0,
            bytes_uploaded: 0,
            started_at: now,
            finished_at: now,
            entries: Vec::new(),
        }
    }
}

/// 同步引擎
///
/// 逐个文件顺序处理：遍历 -> 计算指纹 -> 查询远端 -> 决定是否上传。
/// 远端失败（404 除外）会中止整个运行。
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
    config: SyncConfig,
    scanner: FileScanner,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_config(store, SyncConfig::default())
    }

    pub fn with_config(store: Arc<dyn ObjectStore>, config: SyncConfig) -> Self {
        let scanner = FileScanner::new(config.scan_config.clone());
        Self {
            store,
            config,
            scanner,
        }
    }

    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// 切换目标 bucket，旧客户端随之丢弃
    pub fn set_bucket(&mut self, bucket: &str) -> SyncResult<()> {
        if bucket.trim().is_empty() {
            return Err(SyncError::Config("bucket name is missing".to_string()));
        }
        debug!("切换 bucket: {} -> {}", self.store.bucket(), bucket);
        self.store = self.store.with_bucket(bucket).map_err(|e| match e {
            StoreError::Config(msg) => SyncError::Config(msg),
            other => SyncError::Store(other),
        })?;
        Ok(())
    }

    fn ensure_bucket(&self) -> SyncResult<()> {
        if self.store.bucket().trim().is_empty() {
            return Err(SyncError::Config("bucket name is missing".to_string()));
        }
        Ok(())
    }

    /// 只读扫描：为每个文件计算状态，不做任何上传
    pub async fn scan(&self, root: &Path) -> SyncResult<Vec<ScanEntry>> {
        self.ensure_bucket()?;

        let mut entries = Vec::new();
        for entry in self.scanner.walk(root)? {
            let (file, state) = self.inspect(entry?).await?;
            entries.push(ScanEntry {
                path: file.entry.path,
                kind: file.kind,
                state,
                fingerprint: file.fingerprint,
            });
        }

        debug!("扫描完成: {} 个文件", entries.len());
        Ok(entries)
    }

    /// 同步目录到 bucket；`dry_run` 时只输出日志，不修改远端
    pub async fn sync(&self, root: &Path, dry_run: bool) -> SyncResult<SyncReport> {
        info!("Dry run is {}", if dry_run { "on" } else { "off" });
        self.ensure_bucket()?;

        let walk = self.scanner.walk(root)?;
        let target = walk
            .root()
            .canonicalize()
            .unwrap_or_else(|_| walk.root().to_path_buf());
        info!("目标目录: {}, 目标存储: {}", target.display(), self.store.name());

        let mut report = SyncReport::new(self.store.bucket(), dry_run);

        for entry in walk {
            let (file, state) = match self.inspect(entry?).await {
                Ok(v) => v,
                Err(e) => {
                    error!("同步中止: {}", e);
                    return Err(e);
                }
            };
            report.files_scanned += 1;

            let reported = if !state.needs_upload() {
                debug!("文件未变化，跳过: {}", file.entry.path);
                report.files_skipped += 1;
                state
            } else if dry_run {
                info!("[dry-run] 需要上传 ({}): {}", state, file.entry.path);
                report.files_pending += 1;
                state
            } else {
                if let Err(e) = self.upload(&file).await {
                    error!("上传失败，同步中止: {} - {}", file.entry.path, e);
                    return Err(e.into());
                }
                info!("已上传 ({} -> {}): {}", state, SyncState::Uploaded, file.entry.path);
                report.files_uploaded += 1;
                report.bytes_uploaded += file.entry.size;
                SyncState::Uploaded
            };

            report.entries.push(ScanEntry {
                path: file.entry.path,
                kind: file.kind,
                state: reported,
                fingerprint: file.fingerprint,
            });
        }

        report.finished_at = Utc::now();
        info!(
            "同步完成: {} - 扫描 {}, 上传 {}, 待上传 {}, 跳过 {}",
            self.store.name(),
            report.files_scanned,
            report.files_uploaded,
            report.files_pending,
            report.files_skipped
        );

        Ok(report)
    }

    /// 计算指纹并判定状态
    async fn inspect(&self, entry: FileEntry) -> SyncResult<(LocalFile, SyncState)> {
        let fingerprint = fingerprint::fingerprint(entry.full_path.clone()).await?;
        let state = self
            .with_retry("查询", &entry.path, || {
                classifier::classify(self.store.as_ref(), &entry.path, &fingerprint)
            })
            .await?;

        Ok((
            LocalFile {
                entry,
                kind: EntryKind::File,
                fingerprint,
            },
            state,
        ))
    }

    /// 整体上传文件，元数据记录本地指纹
    async fn upload(&self, file: &LocalFile) -> StoreResult<()> {
        self.with_retry("上传", &file.entry.path, || {
            let mut metadata = Metadata::new();
            metadata.insert(
                FINGERPRINT_KEY.to_string(),
                file.fingerprint.as_str().to_string(),
            );
            self.store
                .put_object(&file.entry.path, &file.entry.full_path, metadata)
        })
        .await
    }

    /// 对临时故障做指数退避重试，其他错误直接返回
    async fn with_retry<T, F, Fut>(&self, op: &str, key: &str, mut action: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let max_retries = self.config.max_retries;
        let mut attempt = 0u32;

        loop {
            match action().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    // 指数退避
                    let delay = self
                        .config
                        .retry_base_delay_ms
                        .saturating_mul(2_u64.saturating_pow(attempt));
                    attempt += 1;
                    warn!(
                        "{}失败，{}ms 后重试 ({}/{}): {} - {}",
                        op, delay, attempt, max_retries, key, e
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
