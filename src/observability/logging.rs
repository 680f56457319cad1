//! Structured logging.
//!
//! # Responsibilities
//! - Build the sink set from [`LogConfig`] once, at startup
//! - Fan every record out to each sink whose level admits it
//! - Provide leveled, formatted and key/value logging on a cloneable handle
//!
//! # Design Decisions
//! - No global logger: the handle is created by `main` and passed down
//! - Each sink carries its own level, so console and files can differ
//! - Sink failures are reported to the error outputs, never to the caller
//! - `panic` hands back a [`PanicSignal`]; escalation is the caller's call

use std::backtrace::Backtrace;
use std::fmt;
use std::io;
use std::panic::Location;
use std::sync::Arc;

use chrono::Local;
use thiserror::Error;

use crate::config::LogConfig;
use crate::observability::encoder::{Caller, Encoder, Entry};
use crate::observability::field::{sweeten, Field, Value};
use crate::observability::level::Level;
use crate::observability::rotation::RotatingFile;
use crate::observability::sink::{open_error_output, ConsoleWriter, Sink, Stream, WriteSyncer};

/// Upper bound on the stack snapshot taken by [`Logger::error_with_stack`].
pub const MAX_STACK_BYTES: usize = 4096;

/// Errors raised while building or flushing a logger.
#[derive(Debug, Error)]
pub enum LogError {
    /// Level name not recognized.
    #[error("unrecognized level: {0:?}")]
    InvalidLevel(String),

    /// An output path could not be opened.
    #[error("failed to open log output {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Flushing a sink failed.
    #[error("failed to sync log sink: {0}")]
    Sync(#[source] io::Error),
}

/// A record written at [`Level::Panic`], waiting for the caller to decide.
#[must_use = "a panic-level record should be escalated or explicitly handled"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicSignal {
    message: String,
}

impl PanicSignal {
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Turn the signal into an actual panic.
    pub fn escalate(self) -> ! {
        panic!("{}", self.message)
    }
}

impl fmt::Display for PanicSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PanicSignal {}

/// Logger-wide options that are not per sink.
#[derive(Clone)]
pub struct LoggerOptions {
    /// Record the caller's `file:line`.
    pub add_caller: bool,
    /// Attach a stack trace to records at or above this level.
    pub stacktrace_level: Option<Level>,
    /// Where the logger reports its own write failures.
    pub error_outputs: Vec<Arc<dyn WriteSyncer>>,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            add_caller: true,
            stacktrace_level: Some(Level::Error),
            error_outputs: vec![Arc::new(ConsoleWriter::new(Stream::Stderr))],
        }
    }
}

struct Core {
    sinks: Vec<Sink>,
    add_caller: bool,
    stacktrace_level: Option<Level>,
    error_outputs: Vec<Arc<dyn WriteSyncer>>,
}

impl Core {
    fn enabled(&self, level: Level) -> bool {
        self.sinks.iter().any(|sink| sink.enabled(level))
    }

    fn report_failure(&self, err: &io::Error) {
        let line = format!(
            "{} write error: {}\n",
            Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%z"),
            err
        );
        for output in &self.error_outputs {
            let _ = output.write_record(line.as_bytes());
            let _ = output.sync();
        }
    }
}

/// Cloneable logging handle.
///
/// Children made with [`with`](Logger::with) or [`named`](Logger::named)
/// share the parent's sinks and add their own context.
#[derive(Clone)]
pub struct Logger {
    core: Arc<Core>,
    name: Option<Arc<str>>,
    context: Arc<[Field]>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("sinks", &self.core.sinks)
            .field("context", &self.context)
            .finish()
    }
}

impl Logger {
    /// Build a logger from configuration.
    ///
    /// In development mode stdout gets a colorized console sink. Outside it,
    /// `stdout`/`stderr` targets get a console sink in the configured
    /// encoding. Every other target is a JSON rotating file with its own
    /// rotation state.
    pub fn new(config: &LogConfig) -> Result<Self, LogError> {
        let level: Level = config.level.parse()?;
        let file_level = match &config.file_level {
            Some(name) => name.parse()?,
            None => level,
        };

        let mut sinks = Vec::new();
        let mut consoles: Vec<Stream> = Vec::new();

        if config.development {
            sinks.push(Sink::new(
                Arc::new(ConsoleWriter::new(Stream::Stdout)),
                Encoder::Console { color: true },
                level,
            ));
            consoles.push(Stream::Stdout);
        }

        for path in &config.output_paths {
            if let Some(stream) = Stream::from_path(path) {
                if consoles.contains(&stream) {
                    continue;
                }
                consoles.push(stream);
                sinks.push(Sink::new(
                    Arc::new(ConsoleWriter::new(stream)),
                    config.encoding.encoder(config.development),
                    level,
                ));
                continue;
            }

            let file = RotatingFile::new(path, &config.rotation);
            file.open().map_err(|source| LogError::Open {
                path: path.clone(),
                source,
            })?;
            sinks.push(Sink::new(Arc::new(file), Encoder::Json, file_level));
        }

        let error_outputs = config
            .error_output_paths
            .iter()
            .map(|path| {
                open_error_output(path).map_err(|source| LogError::Open {
                    path: path.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_sinks(
            sinks,
            LoggerOptions {
                add_caller: !config.disable_caller,
                stacktrace_level: (!config.disable_stacktrace).then_some(Level::Error),
                error_outputs,
            },
        ))
    }

    /// Assemble a logger from explicit sinks.
    pub fn from_sinks(sinks: Vec<Sink>, options: LoggerOptions) -> Self {
        Self {
            core: Arc::new(Core {
                sinks,
                add_caller: options.add_caller,
                stacktrace_level: options.stacktrace_level,
                error_outputs: options.error_outputs,
            }),
            name: None,
            context: Arc::from(Vec::new()),
        }
    }

    /// A logger that writes nowhere.
    pub fn disabled() -> Self {
        Self::from_sinks(
            Vec::new(),
            LoggerOptions {
                add_caller: false,
                stacktrace_level: None,
                error_outputs: Vec::new(),
            },
        )
    }

    /// Whether any sink would accept a record at `level`.
    pub fn enabled(&self, level: Level) -> bool {
        self.core.enabled(level)
    }

    /// The sinks records fan out to, in construction order.
    pub fn sinks(&self) -> &[Sink] {
        &self.core.sinks
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Child logger that adds `fields` to every record.
    pub fn with(&self, fields: &[Field]) -> Logger {
        let mut context = self.context.to_vec();
        context.extend_from_slice(fields);
        Logger {
            core: self.core.clone(),
            name: self.name.clone(),
            context: Arc::from(context),
        }
    }

    /// [`with`](Logger::with) taking an alternating key/value list.
    pub fn with_kv(&self, pairs: Vec<Value>) -> Logger {
        self.with(&sweeten(pairs))
    }

    /// Child logger with a name segment appended (`parent.child`).
    pub fn named(&self, name: &str) -> Logger {
        let name: Arc<str> = match &self.name {
            Some(parent) if !name.is_empty() => format!("{}.{}", parent, name).into(),
            Some(parent) => parent.clone(),
            None => name.into(),
        };
        Logger {
            core: self.core.clone(),
            name: Some(name),
            context: self.context.clone(),
        }
    }

    /// Flush every sink. The first failure is returned after all were tried.
    pub fn sync(&self) -> Result<(), LogError> {
        let mut first = None;
        for sink in &self.core.sinks {
            if let Err(e) = sink.writer.sync() {
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(LogError::Sync(e)),
            None => Ok(()),
        }
    }

    /// Write a record with an explicit caller and logger name.
    ///
    /// Entry point for adapters that know the source position themselves.
    pub fn log_at(
        &self,
        level: Level,
        message: &str,
        fields: &[Field],
        caller: Option<Caller>,
        name: Option<&str>,
    ) {
        if !self.core.enabled(level) {
            return;
        }

        let stack = match self.core.stacktrace_level {
            Some(min) if level >= min => {
                let trace = Backtrace::force_capture().to_string();
                Some(bounded_stack(caller_frames(&trace)))
            }
            _ => None,
        };
        let caller = caller.filter(|_| self.core.add_caller);
        let entry = Entry {
            time: Local::now(),
            level,
            logger_name: name.or(self.name.as_deref()),
            caller: caller.as_ref(),
            message,
            stack: stack.as_deref(),
        };

        let mut json: Option<Vec<u8>> = None;
        for sink in self.core.sinks.iter().filter(|s| s.enabled(level)) {
            let result = match sink.encoder {
                // Files share one JSON encoding of the record.
                Encoder::Json => {
                    let bytes =
                        json.get_or_insert_with(|| sink.encoder.encode(&entry, &self.context, fields));
                    sink.writer.write_record(bytes)
                }
                encoder => sink
                    .writer
                    .write_record(&encoder.encode(&entry, &self.context, fields)),
            };
            if let Err(e) = result {
                self.core.report_failure(&e);
            }
        }
    }

    #[track_caller]
    fn log(&self, level: Level, message: &str, fields: &[Field]) {
        let caller = Caller::from(Location::caller());
        self.log_at(level, message, fields, Some(caller), None);
    }

    #[track_caller]
    pub fn debug(&self, message: &str, fields: &[Field]) {
        self.log(Level::Debug, message, fields);
    }

    #[track_caller]
    pub fn info(&self, message: &str, fields: &[Field]) {
        self.log(Level::Info, message, fields);
    }

    #[track_caller]
    pub fn warn(&self, message: &str, fields: &[Field]) {
        self.log(Level::Warn, message, fields);
    }

    #[track_caller]
    pub fn error(&self, message: &str, fields: &[Field]) {
        self.log(Level::Error, message, fields);
    }

    /// Write at panic level and hand the decision back to the caller.
    #[track_caller]
    pub fn panic(&self, message: &str, fields: &[Field]) -> PanicSignal {
        self.log(Level::Panic, message, fields);
        PanicSignal {
            message: message.to_string(),
        }
    }

    /// Write at fatal level, flush, and exit the process with status 1.
    #[track_caller]
    pub fn fatal(&self, message: &str, fields: &[Field]) -> ! {
        self.log(Level::Fatal, message, fields);
        let _ = self.sync();
        std::process::exit(1)
    }

    /// Log `err` at error level with a bounded stack snapshot under `stack`.
    #[track_caller]
    pub fn error_with_stack(&self, err: &(dyn std::error::Error + '_), fields: &[Field]) {
        let trace = Backtrace::force_capture().to_string();
        let mut fields = fields.to_vec();
        fields.push(Field::str("stack", bounded_stack(caller_frames(&trace))));
        self.log(Level::Error, &err.to_string(), &fields);
    }

    #[track_caller]
    pub fn debugf(&self, args: fmt::Arguments<'_>) {
        self.log_formatted(Level::Debug, args);
    }

    #[track_caller]
    pub fn infof(&self, args: fmt::Arguments<'_>) {
        self.log_formatted(Level::Info, args);
    }

    #[track_caller]
    pub fn warnf(&self, args: fmt::Arguments<'_>) {
        self.log_formatted(Level::Warn, args);
    }

    #[track_caller]
    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.log_formatted(Level::Error, args);
    }

    #[track_caller]
    pub fn panicf(&self, args: fmt::Arguments<'_>) -> PanicSignal {
        self.panic(&args.to_string(), &[])
    }

    #[track_caller]
    pub fn fatalf(&self, args: fmt::Arguments<'_>) -> ! {
        self.fatal(&args.to_string(), &[])
    }

    #[track_caller]
    fn log_formatted(&self, level: Level, args: fmt::Arguments<'_>) {
        if self.core.enabled(level) {
            self.log(level, &args.to_string(), &[]);
        }
    }

    #[track_caller]
    pub fn debugw(&self, message: &str, pairs: Vec<Value>) {
        self.log_sweetened(Level::Debug, message, pairs);
    }

    #[track_caller]
    pub fn infow(&self, message: &str, pairs: Vec<Value>) {
        self.log_sweetened(Level::Info, message, pairs);
    }

    #[track_caller]
    pub fn warnw(&self, message: &str, pairs: Vec<Value>) {
        self.log_sweetened(Level::Warn, message, pairs);
    }

    #[track_caller]
    pub fn errorw(&self, message: &str, pairs: Vec<Value>) {
        self.log_sweetened(Level::Error, message, pairs);
    }

    #[track_caller]
    pub fn panicw(&self, message: &str, pairs: Vec<Value>) -> PanicSignal {
        self.panic(message, &sweeten(pairs))
    }

    #[track_caller]
    pub fn fatalw(&self, message: &str, pairs: Vec<Value>) -> ! {
        self.fatal(message, &sweeten(pairs))
    }

    #[track_caller]
    fn log_sweetened(&self, level: Level, message: &str, pairs: Vec<Value>) {
        if self.core.enabled(level) {
            self.log(level, message, &sweeten(pairs));
        }
    }
}

/// The part of a rendered backtrace starting at the first frame outside
/// backtrace capture and this module.
fn caller_frames(trace: &str) -> &str {
    let mut offset = 0;
    for line in trace.split_inclusive('\n') {
        let text = line.trim_start();
        let is_frame = text
            .split_once(':')
            .is_some_and(|(n, _)| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
        if is_frame && !text.contains("std::backtrace") && !text.contains(module_path!()) {
            return &trace[offset..];
        }
        offset += line.len();
    }
    trace
}

/// Trim a stack trace and cut it to at most [`MAX_STACK_BYTES`] on a char boundary.
fn bounded_stack(trace: &str) -> String {
    let mut end = trace.len().min(MAX_STACK_BYTES);
    while !trace.is_char_boundary(end) {
        end -= 1;
    }
    trace[..end].trim().to_string()
}
