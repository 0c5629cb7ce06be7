//! Logging setup with an explicit transcript.
//!
//! Every line that passes the `env_logger` filter is printed as usual and also
//! appended to a [`LogCapture`]. The capture handle is passed to whoever
//! assembles output documents, so the transcript never has to be re-read
//! from a log file.

use env_logger::Env;
use log::{Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Shared, append-only log transcript.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line);
    }

    /// Copy of every line captured so far.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// `log` backend that forwards to `env_logger` and records into a [`LogCapture`].
pub struct CapturingLogger {
    inner: env_logger::Logger,
    capture: LogCapture,
    start: Instant,
}

impl CapturingLogger {
    pub fn new(inner: env_logger::Logger, capture: LogCapture) -> Self {
        CapturingLogger {
            inner,
            capture,
            start: Instant::now(),
        }
    }

    fn format_line(&self, record: &Record) -> String {
        format!(
            "[{:>10.3}s] {:<8} {}",
            self.start.elapsed().as_secs_f64(),
            record.level(),
            record.args()
        )
    }
}

impl Log for CapturingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.inner.matches(record) {
            self.inner.log(record);
            self.capture.push(self.format_line(record));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Installs the global logger (`RUST_LOG` controls the level, default `info`)
/// and returns the transcript handle.
pub fn init_logging() -> Result<LogCapture, SetLoggerError> {
    let inner = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<8} [map-viruses] {}",
                buf.timestamp(),
                record.level(),
                record.args()
            )
        })
        .build();
    let max_level = inner.filter();

    let capture = LogCapture::new();
    log::set_boxed_logger(Box::new(CapturingLogger::new(inner, capture.clone())))?;
    log::set_max_level(max_level);
    Ok(capture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn test_capture_is_shared_between_clones() {
        let capture = LogCapture::new();
        let other = capture.clone();
        capture.push("first".to_string());
        other.push("second".to_string());
        assert_eq!(capture.snapshot(), vec!["first", "second"]);
    }

    #[test]
    fn test_logger_records_matching_lines() {
        let inner = env_logger::Builder::new()
            .filter_level(log::LevelFilter::Info)
            .is_test(true)
            .build();
        let capture = LogCapture::new();
        let logger = CapturingLogger::new(inner, capture.clone());

        logger.log(
            &Record::builder()
                .args(format_args!("kept"))
                .level(Level::Info)
                .build(),
        );
        logger.log(
            &Record::builder()
                .args(format_args!("dropped"))
                .level(Level::Debug)
                .build(),
        );

        let lines = capture.snapshot();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].ends_with("kept"));
    }
}
