//! Log severity levels.

use std::fmt;
use std::str::FromStr;

use crate::observability::logging::LogError;

/// Record severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    /// Written, then handed back to the caller as a [`PanicSignal`](crate::observability::logging::PanicSignal).
    Panic,
    /// Written, flushed, then the process exits.
    Fatal,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Panic,
        Level::Fatal,
    ];

    /// Lowercase name used in JSON records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Panic => "panic",
            Level::Fatal => "fatal",
        }
    }

    /// ANSI color code for the level in development output.
    pub(crate) fn color(&self) -> u8 {
        match self {
            Level::Debug => 35,
            Level::Info => 34,
            Level::Warn => 33,
            Level::Error | Level::Panic | Level::Fatal => 31,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LogError;

    /// Accepts the all-lowercase or all-uppercase name. An empty string is `info`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" | "DEBUG" => Ok(Level::Debug),
            "info" | "INFO" | "" => Ok(Level::Info),
            "warn" | "WARN" => Ok(Level::Warn),
            "error" | "ERROR" => Ok(Level::Error),
            "panic" | "PANIC" => Ok(Level::Panic),
            "fatal" | "FATAL" => Ok(Level::Fatal),
            other => Err(LogError::InvalidLevel(other.to_string())),
        }
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_levels() {
        for level in Level::ALL {
            assert_eq!(level.as_str().parse::<Level>().unwrap(), level);
            assert_eq!(level.as_str().to_uppercase().parse::<Level>().unwrap(), level);
        }
        assert_eq!("".parse::<Level>().unwrap(), Level::Info);
    }

    #[test]
    fn test_parse_unknown_level() {
        let err = "verbose".parse::<Level>().unwrap_err();
        assert!(matches!(err, LogError::InvalidLevel(ref s) if s == "verbose"));
        assert!("Warn".parse::<Level>().is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Error < Level::Panic);
        assert!(Level::Panic < Level::Fatal);
    }
}
