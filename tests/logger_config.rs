//! Loggers built from configuration, writing to real files.

use std::fs;

use api_skeleton::config::{parse_config, LogConfig, LogEncoding};
use api_skeleton::observability::{Encoder, Field, Level, LogError, Logger};

fn read_records(path: &std::path::Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn file_config(path: &std::path::Path) -> LogConfig {
    LogConfig {
        level: "debug".into(),
        output_paths: vec![path.to_string_lossy().into_owned()],
        error_output_paths: Vec::new(),
        ..LogConfig::default()
    }
}

#[test]
fn test_file_output_writes_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("app.log");
    let logger = Logger::new(&file_config(&path)).unwrap().named("api");

    logger.info("server started", &[Field::int("port", 8080)]);
    logger.debugf(format_args!("loaded {} routes", 2));
    logger.sync().unwrap();

    let records = read_records(&path);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["level"], "info");
    assert_eq!(records[0]["logger"], "api");
    assert_eq!(records[0]["msg"], "server started");
    assert_eq!(records[0]["port"], 8080);
    assert!(records[0]["caller"]
        .as_str()
        .unwrap()
        .contains("logger_config.rs"));
    assert_eq!(records[1]["msg"], "loaded 2 routes");
}

#[test]
fn test_file_level_gates_file_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let config = LogConfig {
        file_level: Some("warn".into()),
        ..file_config(&path)
    };
    let logger = Logger::new(&config).unwrap();
    assert!(!logger.enabled(Level::Info));
    assert!(logger.enabled(Level::Warn));

    logger.info("ignored", &[]);
    logger.warnw("disk nearly full", vec!["percent".into(), 93i64.into()]);
    logger.sync().unwrap();

    let records = read_records(&path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["msg"], "disk nearly full");
    assert_eq!(records[0]["percent"], 93);
}

#[test]
fn test_level_gates_console_and_file_alike() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let config = LogConfig {
        level: "error".into(),
        ..file_config(&path)
    };
    let logger = Logger::new(&config).unwrap();
    logger.warn("dropped", &[]);
    logger.error("kept", &[]);
    logger.sync().unwrap();

    let records = read_records(&path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["msg"], "kept");
    assert!(records[0]["stacktrace"].is_string());
}

#[test]
fn test_disable_caller_and_stacktrace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let config = LogConfig {
        disable_caller: true,
        disable_stacktrace: true,
        ..file_config(&path)
    };
    let logger = Logger::new(&config).unwrap();
    logger.error("plain", &[]);
    logger.sync().unwrap();

    let records = read_records(&path);
    assert!(records[0].get("caller").is_none());
    assert!(records[0].get("stacktrace").is_none());
}

#[test]
fn test_invalid_levels_are_rejected() {
    let config = LogConfig {
        level: "loud".into(),
        ..LogConfig::default()
    };
    assert!(matches!(
        Logger::new(&config),
        Err(LogError::InvalidLevel(level)) if level == "loud"
    ));

    let config = LogConfig {
        file_level: Some("quiet".into()),
        ..LogConfig::default()
    };
    assert!(matches!(
        Logger::new(&config),
        Err(LogError::InvalidLevel(_))
    ));
}

#[test]
fn test_unopenable_output_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = LogConfig {
        output_paths: vec![dir.path().to_string_lossy().into_owned()],
        error_output_paths: Vec::new(),
        ..LogConfig::default()
    };
    match Logger::new(&config) {
        Err(LogError::Open { path, .. }) => assert_eq!(path, dir.path().to_string_lossy()),
        other => panic!("expected open failure, got {:?}", other.map(|_| ())),
    }
}

fn console_config(development: bool, encoding: LogEncoding, outputs: &[&str]) -> LogConfig {
    LogConfig {
        development,
        encoding,
        output_paths: outputs.iter().map(|p| p.to_string()).collect(),
        error_output_paths: Vec::new(),
        ..LogConfig::default()
    }
}

#[test]
fn test_development_adds_colored_stdout_sink() {
    let config = console_config(true, LogEncoding::Json, &["stdout", "stderr"]);
    let logger = Logger::new(&config).unwrap();

    let encoders: Vec<Encoder> = logger.sinks().iter().map(|s| s.encoder()).collect();
    assert_eq!(encoders, vec![Encoder::Console { color: true }, Encoder::Json]);
    assert!(logger.sinks().iter().all(|s| s.level() == Level::Info));
}

#[test]
fn test_development_without_outputs_still_logs_to_console() {
    let logger = Logger::new(&console_config(true, LogEncoding::Json, &[])).unwrap();
    assert_eq!(logger.sinks().len(), 1);
    assert_eq!(logger.sinks()[0].encoder(), Encoder::Console { color: true });
}

#[test]
fn test_console_encoding_outside_development() {
    let config = console_config(false, LogEncoding::Console, &["stdout", "stdout", "stderr"]);
    let logger = Logger::new(&config).unwrap();

    let encoders: Vec<Encoder> = logger.sinks().iter().map(|s| s.encoder()).collect();
    assert_eq!(
        encoders,
        vec![
            Encoder::Console { color: false },
            Encoder::Console { color: false }
        ]
    );
}

#[test]
fn test_file_sinks_use_json_and_file_level() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let config = LogConfig {
        encoding: LogEncoding::Console,
        file_level: Some("error".into()),
        output_paths: vec!["stdout".into(), path.to_string_lossy().into_owned()],
        error_output_paths: Vec::new(),
        ..LogConfig::default()
    };
    let logger = Logger::new(&config).unwrap();

    let sinks = logger.sinks();
    assert_eq!(sinks.len(), 2);
    assert_eq!(sinks[0].encoder(), Encoder::Console { color: false });
    assert_eq!(sinks[0].level(), Level::Info);
    assert_eq!(sinks[1].encoder(), Encoder::Json);
    assert_eq!(sinks[1].level(), Level::Error);
    assert!(path.exists());
}

#[test]
fn test_sync_is_idempotent_on_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let logger = Logger::new(&file_config(&path)).unwrap();
    logger.info("once", &[]);
    logger.sync().unwrap();
    logger.sync().unwrap();
    logger.sync().unwrap();
    assert_eq!(read_records(&path).len(), 1);
}

#[test]
fn test_children_share_file_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let root = Logger::new(&file_config(&path)).unwrap();
    let child = root
        .named("db")
        .with(&[Field::str("component", "pool")]);

    root.info("from root", &[]);
    child.info("from child", &[]);
    root.sync().unwrap();

    let records = read_records(&path);
    assert_eq!(records.len(), 2);
    assert!(records[0].get("component").is_none());
    assert_eq!(records[1]["logger"], "db");
    assert_eq!(records[1]["component"], "pool");
}

#[test]
fn test_logging_section_from_toml() {
    let config = parse_config(
        r#"
        [logging]
        level = "warn"
        encoding = "console"
        output_paths = ["stderr", "/var/log/api/app.log"]

        [logging.rotation]
        max_size_mb = 10
        compress = true
        "#,
    )
    .unwrap();
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.encoding, LogEncoding::Console);
    assert_eq!(config.logging.output_paths.len(), 2);
    assert_eq!(config.logging.rotation.max_size_mb, 10);
    assert_eq!(config.logging.rotation.max_backups, 3);
    assert!(config.logging.rotation.compress);
}
