//! Record encoders.
//!
//! # Design Decisions
//! - JSON for files and machine consumers: one object per line, fixed key order
//! - Console for humans: tab-separated, structured fields as trailing JSON
//! - Colorized level only in development mode

use std::panic::Location;

use chrono::{DateTime, Local};
use serde_json::Map;

use crate::observability::field::Field;
use crate::observability::level::Level;

pub const TIME_KEY: &str = "ts";
pub const LEVEL_KEY: &str = "level";
pub const NAME_KEY: &str = "logger";
pub const CALLER_KEY: &str = "caller";
pub const MESSAGE_KEY: &str = "msg";
pub const STACKTRACE_KEY: &str = "stacktrace";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Keys owned by the record itself. Fields using them are moved under
/// [`RESERVED_PREFIX`] so they never replace the record's own values.
const RESERVED_KEYS: [&str; 6] = [
    TIME_KEY,
    LEVEL_KEY,
    NAME_KEY,
    CALLER_KEY,
    MESSAGE_KEY,
    STACKTRACE_KEY,
];
pub const RESERVED_PREFIX: &str = "fields.";

/// Source position of a logging call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub file: String,
    pub line: u32,
}

impl Caller {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// `dir/file.rs:line`, keeping only the last two path components.
    pub fn short(&self) -> String {
        let normalized = self.file.replace('\\', "/");
        let mut parts = normalized.rsplitn(3, '/');
        let file = parts.next().unwrap_or_default();
        match parts.next() {
            Some(dir) => format!("{}/{}:{}", dir, file, self.line),
            None => format!("{}:{}", file, self.line),
        }
    }
}

impl From<&Location<'_>> for Caller {
    fn from(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }
}

/// Everything about a record except its structured fields.
#[derive(Debug)]
pub struct Entry<'a> {
    pub time: DateTime<Local>,
    pub level: Level,
    pub logger_name: Option<&'a str>,
    pub caller: Option<&'a Caller>,
    pub message: &'a str,
    pub stack: Option<&'a str>,
}

/// Turns an entry plus fields into the bytes of one record, newline included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoder {
    Json,
    Console { color: bool },
}

impl Encoder {
    /// Encode a record. `context` fields precede the call-site `fields`.
    pub fn encode(&self, entry: &Entry<'_>, context: &[Field], fields: &[Field]) -> Vec<u8> {
        match self {
            Encoder::Json => encode_json(entry, context, fields),
            Encoder::Console { color } => encode_console(entry, context, fields, *color),
        }
    }
}

fn fields_map<'f>(fields: impl Iterator<Item = &'f Field>) -> Map<String, serde_json::Value> {
    let mut map = Map::new();
    for field in fields {
        map.insert(field.key.to_string(), field.value.to_json());
    }
    map
}

fn encode_json(entry: &Entry<'_>, context: &[Field], fields: &[Field]) -> Vec<u8> {
    let mut map = Map::new();
    map.insert(
        TIME_KEY.into(),
        entry.time.format(TIME_FORMAT).to_string().into(),
    );
    map.insert(LEVEL_KEY.into(), entry.level.as_str().into());
    if let Some(name) = entry.logger_name {
        map.insert(NAME_KEY.into(), name.into());
    }
    if let Some(caller) = entry.caller {
        map.insert(CALLER_KEY.into(), caller.short().into());
    }
    map.insert(MESSAGE_KEY.into(), entry.message.into());
    for (key, value) in fields_map(context.iter().chain(fields)) {
        if RESERVED_KEYS.contains(&key.as_str()) {
            map.insert(format!("{}{}", RESERVED_PREFIX, key), value);
        } else {
            map.insert(key, value);
        }
    }
    if let Some(stack) = entry.stack {
        map.insert(STACKTRACE_KEY.into(), stack.into());
    }

    // A map of strings and JSON values always serializes.
    let mut buf = serde_json::to_vec(&map).unwrap_or_default();
    buf.push(b'\n');
    buf
}

fn encode_console(entry: &Entry<'_>, context: &[Field], fields: &[Field], color: bool) -> Vec<u8> {
    let mut parts: Vec<String> = Vec::with_capacity(6);
    parts.push(entry.time.format(TIME_FORMAT).to_string());
    if color {
        parts.push(format!(
            "\x1b[{}m{}\x1b[0m",
            entry.level.color(),
            entry.level.as_str()
        ));
    } else {
        parts.push(entry.level.as_str().to_string());
    }
    if let Some(name) = entry.logger_name {
        parts.push(name.to_string());
    }
    if let Some(caller) = entry.caller {
        parts.push(caller.short());
    }
    parts.push(entry.message.to_string());

    let map = fields_map(context.iter().chain(fields));
    if !map.is_empty() {
        parts.push(serde_json::Value::Object(map).to_string());
    }

    let mut line = parts.join("\t");
    if let Some(stack) = entry.stack {
        line.push('\n');
        line.push_str(stack);
    }
    line.push('\n');
    line.into_bytes()
}
