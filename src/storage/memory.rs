//! 进程内对象存储，用于测试和离线演练
//!
//! 同一个 `MemoryStore` 派生出的所有客户端共享同一组 bucket，
//! 因此 `with_bucket` 的语义与真实 S3 一致：切换的只是绑定关系。

use super::{normalize_key, Metadata, ObjectLookup, ObjectMeta, ObjectStore};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// 存储的对象
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub metadata: Metadata,
}

/// 注入的失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Transient,
    PermissionDenied,
}

impl InjectedFailure {
    fn to_error(self, key: &str) -> StoreError {
        match self {
            InjectedFailure::Transient => StoreError::Transient(format!("injected timeout: {}", key)),
            InjectedFailure::PermissionDenied => {
                StoreError::PermissionDenied(format!("injected access denied: {}", key))
            }
        }
    }
}

#[derive(Debug)]
struct FailurePlan {
    kind: InjectedFailure,
    /// 剩余触发次数，None 表示一直失败
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct World {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    failures: HashMap<String, FailurePlan>,
}

/// 内存对象存储
#[derive(Clone)]
pub struct MemoryStore {
    world: Arc<Mutex<World>>,
    puts: Arc<AtomicUsize>,
    bucket: String,
    name: String,
}

impl MemoryStore {
    /// 创建一个只含 `bucket` 的新存储
    pub fn new(bucket: &str) -> Self {
        let mut world = World::default();
        world.buckets.insert(bucket.to_string(), BTreeMap::new());
        Self {
            world: Arc::new(Mutex::new(world)),
            puts: Arc::new(AtomicUsize::new(0)),
            bucket: bucket.to_string(),
            name: format!("memory://{}", bucket),
        }
    }

    fn lock(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 与当前存储共享数据、绑定到另一个 bucket 的句柄
    pub fn bind(&self, bucket: &str) -> MemoryStore {
        MemoryStore {
            world: self.world.clone(),
            puts: self.puts.clone(),
            bucket: bucket.to_string(),
            name: format!("memory://{}", bucket),
        }
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.lock().buckets.entry(bucket.to_string()).or_default();
    }

    /// 让后续针对 `key` 的请求失败；`times` 为 None 时一直失败
    pub fn inject_failure(&self, key: &str, kind: InjectedFailure, times: Option<usize>) {
        self.lock().failures.insert(
            normalize_key(key),
            FailurePlan {
                kind,
                remaining: times,
            },
        );
    }

    /// 所有派生客户端累计的上传次数
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// 当前 bucket 中对象的快照
    pub fn snapshot(&self) -> BTreeMap<String, StoredObject> {
        self.lock()
            .buckets
            .get(&self.bucket)
            .cloned()
            .unwrap_or_default()
    }

    /// 直接写入对象，绕过上传计数
    pub fn insert(&self, key: &str, data: Vec<u8>, metadata: Metadata) {
        let mut world = self.lock();
        world
            .buckets
            .entry(self.bucket.clone())
            .or_default()
            .insert(normalize_key(key), StoredObject { data, metadata });
    }

    fn check_failure(world: &mut World, key: &str) -> StoreResult<()> {
        let Some((kind, remaining)) = world.failures.get(key).map(|p| (p.kind, p.remaining)) else {
            return Ok(());
        };
        match remaining {
            Some(0) => {
                world.failures.remove(key);
                Ok(())
            }
            Some(n) => {
                if let Some(plan) = world.failures.get_mut(key) {
                    plan.remaining = Some(n - 1);
                }
                Err(kind.to_error(key))
            }
            None => Err(kind.to_error(key)),
        }
    }

    fn missing_bucket(&self) -> StoreError {
        StoreError::Other(format!("bucket does not exist: {}", self.bucket))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectLookup> {
        let key = normalize_key(key);
        let mut world = self.lock();
        Self::check_failure(&mut world, &key)?;

        let objects = world
            .buckets
            .get(&self.bucket)
            .ok_or_else(|| self.missing_bucket())?;

        Ok(match objects.get(&key) {
            Some(obj) => ObjectLookup::Found(ObjectMeta {
                size: obj.data.len() as u64,
                metadata: obj.metadata.clone(),
            }),
            None => ObjectLookup::NotFound,
        })
    }

    async fn put_object(&self, key: &str, local_path: &Path, metadata: Metadata) -> StoreResult<()> {
        let key = normalize_key(key);
        {
            let mut world = self.lock();
            Self::check_failure(&mut world, &key)?;
            if !world.buckets.contains_key(&self.bucket) {
                return Err(self.missing_bucket());
            }
        }

        let data = tokio::fs::read(local_path).await?;

        let mut world = self.lock();
        let objects = world
            .buckets
            .get_mut(&self.bucket)
            .ok_or_else(|| self.missing_bucket())?;
        objects.insert(key, StoredObject { data, metadata });
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_objects(&self) -> StoreResult<Vec<String>> {
        let world = self.lock();
        let objects = world
            .buckets
            .get(&self.bucket)
            .ok_or_else(|| self.missing_bucket())?;
        Ok(objects.keys().cloned().collect())
    }

    async fn download_object(&self, key: &str, local_path: &Path) -> StoreResult<()> {
        let key = normalize_key(key);
        let data = {
            let mut world = self.lock();
            Self::check_failure(&mut world, &key)?;
            let objects = world
                .buckets
                .get(&self.bucket)
                .ok_or_else(|| self.missing_bucket())?;
            objects
                .get(&key)
                .map(|obj| obj.data.clone())
                .ok_or_else(|| StoreError::NotFound(key.clone()))?
        };

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, data).await?;
        Ok(())
    }

    fn with_bucket(&self, bucket: &str) -> StoreResult<Arc<dyn ObjectStore>> {
        Ok(Arc::new(self.bind(bucket)))
    }
}
