//! 日志模块 - 控制台输出与按天滚动的文件日志

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// 日志文件名前缀
pub const LOG_FILE_PREFIX: &str = "bucketsync.log";

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用日志记录
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
    /// 是否同时写入日志文件
    #[serde(default)]
    pub file_enabled: bool,
    /// 日志目录，默认在配置目录下的 logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            level: default_level(),
            file_enabled: false,
            directory: None,
        }
    }
}

impl LogConfig {
    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }

    /// 日志目录
    pub fn log_dir(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| crate::config::config_dir().join("logs"))
    }

    fn env_filter(&self, verbose: bool) -> EnvFilter {
        let level = if verbose {
            tracing::Level::DEBUG
        } else {
            self.tracing_level()
        };

        let mut filter = EnvFilter::from_default_env().add_directive(level.into());
        for directive in ["hyper=warn", "reqwest=warn", "opendal=warn"] {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
        filter
    }
}

/// 初始化日志系统
///
/// 返回的 guard 需要一直持有到进程退出，否则文件日志可能丢失尾部内容。
pub fn init_logging(config: &LogConfig, verbose: bool) -> Option<WorkerGuard> {
    if !config.enabled && !verbose {
        // 日志已禁用，只初始化一个空的 subscriber
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return None;
    }

    let env_filter = config.env_filter(verbose);
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    if config.file_enabled {
        let log_dir = config.log_dir();
        match std::fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
                let (file_writer, guard) = tracing_appender::non_blocking(appender);

                // 文件日志层 - 不带颜色
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .with_target(false);

                let subscriber = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .with(file_layer);
                let _ = tracing::subscriber::set_global_default(subscriber);
                return Some(guard);
            }
            Err(e) => {
                // 文件日志创建失败，回退到控制台
                eprintln!("无法创建日志目录 {:?}: {}", log_dir, e);
            }
        }
    }

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
    None
}
