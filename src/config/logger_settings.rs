// src/config/logger_settings.rs

use std::path::{Path, PathBuf};

use thiserror::Error;

const DEFAULT_PATH: &str = "/opt/adserving/logs/auction_events.pb.log";
const DEFAULT_CHANNEL_BUFFER: usize = 10_000;
const DEFAULT_MAX_FILE_SIZE_MB: u64 = 100;
const DEFAULT_MAX_BACKUPS: usize = 5;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// 竞价事件日志配置，来自 `key=value` 形式的 properties 文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidLoggerSettings {
    pub path: PathBuf,
    pub channel_buffer: usize,
    pub max_file_size_mb: u64,
    pub max_backups: usize,
}

impl Default for BidLoggerSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            channel_buffer: DEFAULT_CHANNEL_BUFFER,
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }
}

impl BidLoggerSettings {
    /// 读取 properties 文件。`#` 和 `!` 开头的行是注释，未出现的键取默认值。
    pub fn from_properties_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_properties(&contents)
    }

    pub fn from_properties(contents: &str) -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "logging.bid_combo.path" => settings.path = PathBuf::from(value),
                "logging.bid_combo.channel_buffer" => {
                    settings.channel_buffer = parse_num(key, value)?;
                }
                "logging.bid_combo.max_file_size_mb" => {
                    settings.max_file_size_mb = parse_num(key, value)?;
                }
                "logging.bid_combo.max_backups" => {
                    settings.max_backups = parse_num(key, value)?;
                }
                _ => {} // 其他键留给别的组件
            }
        }
        Ok(settings)
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SettingsError> {
    value.parse().map_err(|_| SettingsError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}
