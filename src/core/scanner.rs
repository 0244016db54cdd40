use crate::error::{SyncError, SyncResult};
use regex::Regex;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// 文件扫描器配置
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// 是否递归进入子目录
    pub recursive: bool,
    /// 排除规则（glob patterns）
    pub exclude_patterns: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            exclude_patterns: Vec::new(),
        }
    }
}

/// 扫描得到的本地文件
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// 相对根目录的 POSIX 风格路径，同时作为远端对象 key
    pub path: String,
    /// 磁盘上的完整路径
    pub full_path: PathBuf,
    pub size: u64,
}

/// 本地目录扫描器
///
/// 只产出普通文件；目录、符号链接和特殊文件都会被跳过。
/// 每次调用 `walk` 都重新遍历磁盘，不保留任何状态。
pub struct FileScanner {
    config: ScanConfig,
    excludes: Vec<Regex>,
}

impl FileScanner {
    pub fn new(config: ScanConfig) -> Self {
        let excludes = config
            .exclude_patterns
            .iter()
            .filter_map(|p| match glob_to_regex(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("忽略无效的排除规则 {}: {}", p, e);
                    None
                }
            })
            .collect();
        Self { config, excludes }
    }

    /// 检查路径是否应该被排除
    pub fn should_exclude(&self, path: &str) -> bool {
        let path = path.to_lowercase();
        self.excludes.iter().any(|re| re.is_match(&path))
    }

    /// 校验根目录后开始遍历
    pub fn walk(&self, root: &Path) -> SyncResult<FileWalk<'_>> {
        let root = validate_root(root)?;
        let max_depth = if self.config.recursive { usize::MAX } else { 1 };

        let inner = WalkDir::new(&root)
            .follow_links(false)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter();

        Ok(FileWalk {
            root,
            inner,
            scanner: self,
        })
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

/// 惰性的文件遍历序列，按文件名排序
pub struct FileWalk<'a> {
    root: PathBuf,
    inner: walkdir::IntoIter,
    scanner: &'a FileScanner,
}

impl FileWalk<'_> {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Iterator for FileWalk<'_> {
    type Item = SyncResult<FileEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    return Some(Err(SyncError::io(path, e.into())));
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = match relative_key(&self.root, entry.path()) {
                Ok(key) => key,
                Err(e) => return Some(Err(SyncError::io(entry.path(), e))),
            };

            if self.scanner.should_exclude(&relative) {
                debug!("排除文件: {}", relative);
                continue;
            }

            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => return Some(Err(SyncError::io(entry.path(), e.into()))),
            };

            return Some(Ok(FileEntry {
                path: relative,
                full_path: entry.into_path(),
                size,
            }));
        }
    }
}

/// 根目录必须存在、是目录且可读
fn validate_root(root: &Path) -> SyncResult<PathBuf> {
    let meta = fs::metadata(root).map_err(|e| {
        SyncError::Config(format!("root directory {} is not accessible: {}", root.display(), e))
    })?;

    if !meta.is_dir() {
        return Err(SyncError::Config(format!(
            "root path {} is not a directory",
            root.display()
        )));
    }

    fs::read_dir(root).map_err(|e| {
        SyncError::Config(format!("root directory {} is not readable: {}", root.display(), e))
    })?;

    Ok(root.to_path_buf())
}

/// 计算相对路径并转换为 `/` 分隔的 key
fn relative_key(root: &Path, path: &Path) -> std::io::Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is outside {}", path.display(), root.display()),
        )
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(name) = component {
            let name = name.to_str().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("file name is not valid UTF-8: {}", path.display()),
                )
            })?;
            parts.push(name);
        }
    }

    Ok(parts.join("/"))
}

/// 把简单的 glob 规则转换为正则
///
/// `**` 跨目录匹配（`**/` 可匹配零层目录），`*` 和 `?` 不跨越 `/`；不含 `/` 的规则可匹配任意层级的文件名。
fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = pattern.trim().to_lowercase();
    let mut out = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                // `**/` 也匹配零层目录
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }

    let anchored = if pattern.contains('/') {
        format!("^{}$", out)
    } else {
        format!("^(.*/)?{}$", out)
    };
    Regex::new(&anchored)
}
