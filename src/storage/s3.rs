use super::{
    normalize_key, Metadata, ObjectLookup, ObjectMeta, ObjectStore, IO_TIMEOUT_SECS,
    OP_TIMEOUT_SECS,
};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Operator};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// S3 分块上传除最后一块外的最小块大小
pub const MIN_MULTIPART_CHUNK: u64 = 5 * 1024 * 1024;

pub struct S3Store {
    operator: Operator,
    config: StoreConfig,
    bucket: String,
    name: String,
}

impl S3Store {
    pub fn new(config: StoreConfig, bucket: &str) -> StoreResult<Self> {
        use opendal::services::S3;

        if bucket.trim().is_empty() {
            return Err(StoreError::Config("bucket name is missing".to_string()));
        }

        let mut builder = S3::default().bucket(bucket).region(&config.region);

        // 未配置时交给 opendal 从环境变量加载凭证
        if let Some(ref ak) = config.access_key {
            builder = builder.access_key_id(ak);
        }
        if let Some(ref sk) = config.secret_key {
            builder = builder.secret_access_key(sk);
        }
        if let Some(ref ep) = config.endpoint {
            builder = builder.endpoint(ep);
        }
        if let Some(ref root) = config.root {
            builder = builder.root(root);
        }

        // 添加超时层
        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        let name = format!(
            "s3://{}{}",
            bucket,
            config
                .root
                .as_deref()
                .map(|p| format!("/{}", p.trim_matches('/')))
                .unwrap_or_default()
        );

        Ok(Self {
            operator,
            config,
            bucket: bucket.to_string(),
            name,
        })
    }

    /// 大文件分块写入，读满一块再提交，内存占用不超过 chunk 大小
    async fn put_multipart(
        &self,
        key: &str,
        local_path: &Path,
        metadata: Metadata,
    ) -> StoreResult<()> {
        let chunk_size = multipart_chunk_size(&self.config);
        let mut writer = self
            .operator
            .writer_with(key)
            .chunk(chunk_size)
            .concurrent(self.config.max_concurrency.max(1))
            .user_metadata(metadata)
            .await?;

        let mut file = tokio::fs::File::open(local_path).await?;
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let filled = match fill_buffer(&mut file, &mut buffer).await {
                Ok(n) => n,
                Err(e) => {
                    let _ = writer.abort().await;
                    return Err(e.into());
                }
            };
            if filled == 0 {
                break;
            }
            if let Err(e) = writer.write(buffer[..filled].to_vec()).await {
                let _ = writer.abort().await;
                return Err(e.into());
            }
        }

        writer.close().await?;
        Ok(())
    }
}

/// 配置的块大小低于 S3 下限时按下限处理
fn multipart_chunk_size(config: &StoreConfig) -> usize {
    config.multipart_chunksize.max(MIN_MULTIPART_CHUNK) as usize
}

/// 尽量填满缓冲区，返回 0 表示已到文件末尾
async fn fill_buffer(file: &mut tokio::fs::File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectLookup> {
        match self.operator.stat(&normalize_key(key)).await {
            Ok(meta) => Ok(ObjectLookup::Found(ObjectMeta {
                size: meta.content_length(),
                metadata: meta.user_metadata().cloned().unwrap_or_default(),
            })),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(ObjectLookup::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_object(&self, key: &str, local_path: &Path, metadata: Metadata) -> StoreResult<()> {
        let key = normalize_key(key);
        let size = tokio::fs::metadata(local_path).await?.len();

        if size >= self.config.multipart_threshold {
            debug!("分块上传: {} ({} bytes)", key, size);
            return self.put_multipart(&key, local_path, metadata).await;
        }

        let data = tokio::fs::read(local_path).await?;
        self.operator
            .write_with(&key, data)
            .user_metadata(metadata)
            .await?;
        Ok(())
    }

    async fn list_objects(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut lister = self.operator.lister_with("").recursive(true).await?;

        while let Some(entry) = lister.try_next().await? {
            let path = entry.path();
            // 跳过根目录和目录占位对象
            if path.is_empty() || path.ends_with('/') {
                continue;
            }
            keys.push(path.trim_start_matches('/').to_string());
        }

        Ok(keys)
    }

    async fn download_object(&self, key: &str, local_path: &Path) -> StoreResult<()> {
        let data = self.operator.read(&normalize_key(key)).await?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, data.to_vec()).await?;
        Ok(())
    }

    fn with_bucket(&self, bucket: &str) -> StoreResult<Arc<dyn ObjectStore>> {
        debug!("为新的 bucket 重新创建 S3 客户端: {}", bucket);
        Ok(Arc::new(S3Store::new(self.config.clone(), bucket)?))
    }
}
