//! Log sinks.
//!
//! # Responsibilities
//! - Serialize concurrent writes to one destination
//! - Track unflushed writes so repeated syncs are no-ops
//! - Resolve configured output paths into writers

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::observability::encoder::Encoder;
use crate::observability::level::Level;

/// A destination that accepts whole encoded records.
///
/// Implementations must write each record atomically with respect to other
/// callers of the same writer.
pub trait WriteSyncer: Send + Sync {
    /// Append one encoded record.
    fn write_record(&self, record: &[u8]) -> io::Result<()>;

    /// Flush anything buffered since the last sync.
    fn sync(&self) -> io::Result<()>;
}

/// One leg of the fan-out: a writer, the encoder feeding it and its minimum level.
#[derive(Clone)]
pub struct Sink {
    pub(crate) level: Level,
    pub(crate) encoder: Encoder,
    pub(crate) writer: Arc<dyn WriteSyncer>,
}

impl Sink {
    pub fn new(writer: Arc<dyn WriteSyncer>, encoder: Encoder, level: Level) -> Self {
        Self {
            level,
            encoder,
            writer,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn encoder(&self) -> Encoder {
        self.encoder
    }

    /// Whether a record at `level` passes this sink's filter.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("level", &self.level)
            .field("encoder", &self.encoder)
            .finish_non_exhaustive()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic mid-write leaves at worst a truncated record behind.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Standard stream selector for console sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    /// Parse the reserved output path names.
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "stdout" => Some(Stream::Stdout),
            "stderr" => Some(Stream::Stderr),
            _ => None,
        }
    }
}

/// Writes to stdout or stderr through the stream's own lock.
#[derive(Debug)]
pub struct ConsoleWriter {
    stream: Stream,
    dirty: AtomicBool,
}

impl ConsoleWriter {
    pub fn new(stream: Stream) -> Self {
        Self {
            stream,
            dirty: AtomicBool::new(false),
        }
    }
}

impl WriteSyncer for ConsoleWriter {
    fn write_record(&self, record: &[u8]) -> io::Result<()> {
        match self.stream {
            Stream::Stdout => io::stdout().lock().write_all(record)?,
            Stream::Stderr => io::stderr().lock().write_all(record)?,
        }
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        match self.stream {
            Stream::Stdout => io::stdout().lock().flush(),
            Stream::Stderr => io::stderr().lock().flush(),
        }
    }
}

/// Plain append-only file without rotation. Used for error outputs.
#[derive(Debug)]
pub struct FileWriter {
    file: Mutex<File>,
    dirty: AtomicBool,
}

impl FileWriter {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            dirty: AtomicBool::new(false),
        })
    }
}

impl WriteSyncer for FileWriter {
    fn write_record(&self, record: &[u8]) -> io::Result<()> {
        lock(&self.file).write_all(record)?;
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        lock(&self.file).sync_data()
    }
}

/// In-memory sink for capturing records.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    buf: Mutex<Vec<u8>>,
    dirty: AtomicBool,
    flushes: AtomicUsize,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&lock(&self.buf)).into_owned()
    }

    /// Parse every line as a JSON record, skipping lines that are not JSON.
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.contents()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Number of syncs that actually had something to flush.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        lock(&self.buf).clear();
    }
}

impl WriteSyncer for MemoryWriter {
    fn write_record(&self, record: &[u8]) -> io::Result<()> {
        lock(&self.buf).extend_from_slice(record);
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            self.flushes.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }
}

/// Open a destination for the logger's own error reports.
pub(crate) fn open_error_output(path: &str) -> io::Result<Arc<dyn WriteSyncer>> {
    Ok(match Stream::from_path(path) {
        Some(stream) => Arc::new(ConsoleWriter::new(stream)),
        None => Arc::new(FileWriter::open(Path::new(path))?),
    })
}
