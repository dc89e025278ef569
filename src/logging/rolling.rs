// src/logging/rolling.rs

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::warn;

/// **按大小轮转的行式写入器**
///
/// 追加写当前文件；一旦写入会使文件超过 `max_bytes`，就把当前文件改名为
/// 带时间戳的备份、gzip 压缩后重开新文件。备份最多保留 `max_backups` 份，
/// 更旧的删除。
pub struct RollingWriter {
    path: PathBuf,
    max_bytes: u64,
    max_backups: usize,
    file: BufWriter<File>,
    written: u64,
}

impl RollingWriter {
    pub fn new(path: PathBuf, max_bytes: u64, max_backups: usize) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            max_backups,
            file: BufWriter::new(file),
            written,
        })
    }

    /// 写入一行（自动追加换行符）。必要时先轮转。
    pub fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        let needed = line.len() as u64 + 1;
        if self.written > 0 && self.written + needed > self.max_bytes {
            self.rotate()?;
        }
        self.file.write_all(line)?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        self.written += needed;
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        let backup = self.backup_path();
        fs::rename(&self.path, &backup)?;

        // 压缩失败不致命，保留未压缩的备份
        if let Err(e) = gzip_file(&backup) {
            warn!("failed to compress rotated log {}: {e}", backup.display());
        }
        self.prune_backups();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.file = BufWriter::new(file);
        self.written = 0;
        Ok(())
    }

    fn backup_path(&self) -> PathBuf {
        let ts = Utc::now().format("%Y%m%dT%H%M%S%.3f");
        let name = self.path.file_name().unwrap_or_default().to_string_lossy();
        self.path.with_file_name(format!("{name}.{ts}"))
    }

    /// 删除超出保留份数的最旧备份。
    fn prune_backups(&self) {
        let Some(dir) = self.path.parent() else { return };
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        let live_name = self.path.file_name().unwrap_or_default().to_string_lossy().into_owned();
        let prefix = format!("{live_name}.");

        let Ok(entries) = fs::read_dir(dir) else { return };
        let mut backups: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(&prefix))
                    .unwrap_or(false)
            })
            .collect();
        if backups.len() <= self.max_backups {
            return;
        }
        // 备份名携带时间戳，字典序即时间序
        backups.sort();
        let excess = backups.len() - self.max_backups;
        for path in backups.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&path) {
                warn!("failed to delete old log backup {}: {e}", path.display());
            }
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn gzip_file(path: &Path) -> io::Result<()> {
    let gz_path = {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        path.with_file_name(format!("{name}.gz"))
    };
    let input = File::open(path)?;
    let output = File::create(&gz_path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut BufReader::new(input), &mut encoder)?;
    encoder.finish()?.flush()?;
    fs::remove_file(path)?;
    Ok(())
}
