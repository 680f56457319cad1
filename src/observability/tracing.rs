//! Bridge from `tracing` events into the [`Logger`].
//!
//! # Responsibilities
//! - Receive events from this crate and its dependencies (axum, tower-http)
//! - Convert event fields into typed [`Field`]s
//! - Write them through the same sinks as direct logger calls
//!
//! # Design Decisions
//! - Event target becomes the logger name, event file/line the caller
//! - Spans are not recorded; the request ID travels as an explicit field

use std::fmt;

use tracing::field::{Field as TracingField, Visit};
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::observability::encoder::Caller;
use crate::observability::field::{Field, Value};
use crate::observability::level::Level;
use crate::observability::logging::Logger;

/// `tracing_subscriber` layer writing every event through a [`Logger`].
#[derive(Debug, Clone)]
pub struct LogLayer {
    logger: Logger,
}

impl LogLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S: Subscriber> Layer<S> for LogLayer {
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        !metadata.is_event() || self.logger.enabled(Level::from(metadata.level()))
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = Level::from(metadata.level());
        if !self.logger.enabled(level) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let caller = metadata
            .file()
            .zip(metadata.line())
            .map(|(file, line)| Caller::new(file, line));

        self.logger.log_at(
            level,
            &visitor.message,
            &visitor.fields,
            caller,
            Some(metadata.target()),
        );
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<Field>,
}

impl EventVisitor {
    fn push(&mut self, field: &TracingField, value: Value) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(Field::new(field.name(), value));
        }
    }
}

impl Visit for EventVisitor {
    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.push(field, Value::Float(value));
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.push(field, Value::Int(value));
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &TracingField, value: &str) {
        self.push(field, Value::Str(value.to_string()));
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::Error(value.to_string()));
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn fmt::Debug) {
        self.push(field, Value::Str(format!("{:?}", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::encoder::Encoder;
    use crate::observability::logging::LoggerOptions;
    use crate::observability::sink::{MemoryWriter, Sink};
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_events_reach_logger() {
        let writer = Arc::new(MemoryWriter::new());
        let logger = Logger::from_sinks(
            vec![Sink::new(writer.clone(), Encoder::Json, Level::Info)],
            LoggerOptions {
                error_outputs: Vec::new(),
                stacktrace_level: None,
                ..LoggerOptions::default()
            },
        );
        let subscriber = tracing_subscriber::registry().with(LogLayer::new(logger));

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("dropped by level");
            tracing::info!(address = %"127.0.0.1:8080", max = 10u64, ready = true, "Listener bound");
            tracing::warn!(ratio = 0.5, "Half capacity");
        });

        let records = writer.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["msg"], "Listener bound");
        assert_eq!(records[0]["address"], "127.0.0.1:8080");
        assert_eq!(records[0]["max"], 10);
        assert_eq!(records[0]["ready"], true);
        assert_eq!(records[0]["logger"], module_path!());
        assert!(records[0]["caller"]
            .as_str()
            .unwrap()
            .starts_with("observability/tracing.rs:"));
        assert_eq!(records[1]["level"], "warn");
        assert_eq!(records[1]["ratio"], 0.5);
    }

    #[test]
    fn test_event_field_named_level_keeps_severity() {
        let writer = Arc::new(MemoryWriter::new());
        let logger = Logger::from_sinks(
            vec![Sink::new(writer.clone(), Encoder::Json, Level::Debug)],
            LoggerOptions {
                error_outputs: Vec::new(),
                ..LoggerOptions::default()
            },
        );
        let subscriber = tracing_subscriber::registry().with(LogLayer::new(logger));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(level = %"debug", "Configuration loaded");
        });

        let records = writer.records();
        assert_eq!(records[0]["level"], "info");
        assert_eq!(records[0]["fields.level"], "debug");
    }
}
