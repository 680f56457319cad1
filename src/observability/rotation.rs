//! Size-based rotating log file.
//!
//! # Responsibilities
//! - Append records to the active file, opening it lazily
//! - Rotate before a write would push the file past its maximum size
//! - Prune backups by count and age, gzip the survivors on request
//!
//! Backups sit next to the active file as `<stem>-<UTC timestamp><ext>`,
//! e.g. `app-2024-05-01T13-07-42.118.log` (`.log.gz` once compressed).

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{NaiveDateTime, TimeDelta, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::RotationConfig;
use crate::observability::sink::{lock, WriteSyncer};

const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const COMPRESS_SUFFIX: &str = ".gz";
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const MEGABYTE: u64 = 1024 * 1024;

/// A log file with its own, unshared rotation state.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    max_backups: usize,
    max_age_days: u32,
    compress: bool,
    active: Mutex<ActiveFile>,
}

#[derive(Debug, Default)]
struct ActiveFile {
    file: Option<File>,
    size: u64,
    dirty: bool,
    failed: Option<String>,
    last_backup: Option<NaiveDateTime>,
}

#[derive(Debug)]
struct Backup {
    path: PathBuf,
    time: NaiveDateTime,
    compressed: bool,
}

impl RotatingFile {
    pub fn new(path: impl Into<PathBuf>, policy: &RotationConfig) -> Self {
        let max_mb = if policy.max_size_mb == 0 {
            DEFAULT_MAX_SIZE_MB
        } else {
            policy.max_size_mb
        };
        Self {
            path: path.into(),
            max_bytes: max_mb.saturating_mul(MEGABYTE),
            max_backups: policy.max_backups,
            max_age_days: policy.max_age_days,
            compress: policy.compress,
            active: Mutex::new(ActiveFile::default()),
        }
    }

    #[cfg(test)]
    fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// File name split into the prefix and extension backups share.
    fn name_parts(&self) -> (String, String) {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (format!("{}-", stem), ext)
    }

    /// Open the active file now instead of on the first write.
    pub fn open(&self) -> io::Result<()> {
        let mut active = lock(&self.active);
        if active.file.is_none() {
            self.open_active(&mut active)?;
        }
        Ok(())
    }

    fn open_active(&self, active: &mut ActiveFile) -> io::Result<()> {
        fs::create_dir_all(self.dir())?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        active.size = file.metadata()?.len();
        active.file = Some(file);
        Ok(())
    }

    /// Move the active file aside and start a fresh one.
    fn rotate(&self, active: &mut ActiveFile) -> io::Result<()> {
        active.file = None;
        if self.path.exists() {
            let (backup, time) = self.backup_path(active.last_backup);
            fs::rename(&self.path, backup)?;
            active.last_backup = Some(time);
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        active.file = Some(file);
        active.size = 0;
        Ok(())
    }

    /// A free backup name stamped later than `after`, so backup order
    /// always follows rotation order.
    fn backup_path(&self, after: Option<NaiveDateTime>) -> (PathBuf, NaiveDateTime) {
        let (prefix, ext) = self.name_parts();
        let mut time = Utc::now().naive_utc();
        if let Some(after) = after {
            time = time.max(after + TimeDelta::milliseconds(1));
        }
        loop {
            let name = format!("{}{}{}", prefix, time.format(BACKUP_TIME_FORMAT), ext);
            let candidate = self.dir().join(&name);
            let compressed = self.dir().join(format!("{}{}", name, COMPRESS_SUFFIX));
            if !candidate.exists() && !compressed.exists() {
                return (candidate, time);
            }
            time += TimeDelta::milliseconds(1);
        }
    }

    /// Backups of this file, newest first.
    fn backups(&self) -> io::Result<Vec<Backup>> {
        let (prefix, ext) = self.name_parts();
        let mut backups = Vec::new();

        for entry in fs::read_dir(self.dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let (rest, compressed) = match rest.strip_suffix(COMPRESS_SUFFIX) {
                Some(r) => (r, true),
                None => (rest, false),
            };
            let Some(stamp) = rest.strip_suffix(ext.as_str()) else {
                continue;
            };
            if let Ok(time) = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT) {
                backups.push(Backup {
                    path: entry.path(),
                    time,
                    compressed,
                });
            }
        }

        backups.sort_by(|a, b| b.time.cmp(&a.time));
        Ok(backups)
    }

    /// Apply the retention policy to existing backups.
    fn prune(&self) -> io::Result<()> {
        if self.max_backups == 0 && self.max_age_days == 0 && !self.compress {
            return Ok(());
        }

        let mut backups = self.backups()?;
        let mut remove = Vec::new();

        if self.max_backups > 0 {
            // A backup and its compressed twin count once.
            let mut preserved = HashSet::new();
            let mut keep = Vec::new();
            for backup in backups {
                preserved.insert(backup.time);
                if preserved.len() > self.max_backups {
                    remove.push(backup);
                } else {
                    keep.push(backup);
                }
            }
            backups = keep;
        }

        if self.max_age_days > 0 {
            let cutoff = Utc::now().naive_utc() - TimeDelta::days(i64::from(self.max_age_days));
            let (old, keep): (Vec<_>, Vec<_>) =
                backups.into_iter().partition(|b| b.time < cutoff);
            remove.extend(old);
            backups = keep;
        }

        for backup in &remove {
            match fs::remove_file(&backup.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
        }

        if self.compress {
            for backup in backups.iter().filter(|b| !b.compressed) {
                compress_file(&backup.path)?;
            }
        }

        Ok(())
    }
}

impl RotatingFile {
    fn write_locked(&self, active: &mut ActiveFile, record: &[u8]) -> io::Result<()> {
        let len = record.len() as u64;

        if active.file.is_none() {
            self.open_active(active)?;
        }

        // An oversized record still lands, alone, in a fresh file.
        let rotated = active.size > 0 && active.size + len > self.max_bytes;
        if rotated {
            self.rotate(active)?;
        }

        match active.file.as_mut() {
            Some(file) => file.write_all(record)?,
            None => return Err(io::Error::other("log file not open")),
        }
        active.size += len;
        active.dirty = true;

        if rotated {
            self.prune()?;
        }
        Ok(())
    }
}

impl WriteSyncer for RotatingFile {
    fn write_record(&self, record: &[u8]) -> io::Result<()> {
        let mut active = lock(&self.active);
        let result = self.write_locked(&mut active, record);
        if let Err(e) = &result {
            active.failed = Some(format!("{}: {}", self.path.display(), e));
        }
        result
    }

    /// Flush pending data. A write failure since the last sync is reported
    /// here once, after the flush.
    fn sync(&self) -> io::Result<()> {
        let mut active = lock(&self.active);
        let failed = active.failed.take();
        if active.dirty {
            active.dirty = false;
            if let Some(file) = active.file.as_ref() {
                file.sync_data()?;
            }
        }
        match failed {
            Some(message) => Err(io::Error::other(format!("earlier write failed: {}", message))),
            None => Ok(()),
        }
    }
}

/// Gzip `path` into `path.gz` and remove the original.
fn compress_file(path: &Path) -> io::Result<()> {
    let mut gz_name = path.as_os_str().to_owned();
    gz_name.push(COMPRESS_SUFFIX);
    let gz_path = PathBuf::from(gz_name);

    let mut source = File::open(path)?;
    let target = File::create(&gz_path)?;
    let mut encoder = GzEncoder::new(target, Compression::default());
    io::copy(&mut source, &mut encoder)?;
    encoder.finish()?.sync_all()?;

    fs::remove_file(path)
}
