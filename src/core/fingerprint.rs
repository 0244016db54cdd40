//! 文件内容指纹

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// 读取文件时的分块大小
pub const CHUNK_SIZE: usize = 4 * 1024 * 1024; // 4MB

/// 内容指纹：BLAKE3 的前 16 字节，32 个小写十六进制字符
///
/// 存放在元数据键 `md5sum` 下，但不是 MD5，见 `storage::FINGERPRINT_KEY`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_hasher(hasher: &blake3::Hasher) -> Self {
        // 只取前 16 字节（32 个十六进制字符），足够检测变化
        Self(hasher.finalize().to_hex()[..32].to_string())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 计算内存数据的指纹
pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(data);
    Fingerprint::from_hasher(&hasher)
}

/// 分块读取文件计算指纹，峰值内存不超过一个分块
pub fn fingerprint_file(path: &Path) -> io::Result<Fingerprint> {
    fingerprint_reader(File::open(path)?)
}

/// 从任意 reader 计算指纹
pub fn fingerprint_reader<R: Read>(mut reader: R) -> io::Result<Fingerprint> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
    }

    Ok(Fingerprint::from_hasher(&hasher))
}

/// 在阻塞线程池中计算文件指纹
pub async fn fingerprint(path: PathBuf) -> SyncResult<Fingerprint> {
    let task_path = path.clone();
    match tokio::task::spawn_blocking(move || fingerprint_file(&task_path)).await {
        Ok(result) => result.map_err(|e| SyncError::io(path, e)),
        Err(join) => Err(SyncError::io(path, io::Error::other(join))),
    }
}
