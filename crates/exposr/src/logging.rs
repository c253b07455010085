use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::config::LoggingConfig;

/// Set up tracing-subscriber to write to `exposr.log` in `dir`.
/// A second call is a no-op: the first subscriber stays installed.
pub fn init_tracing(dir: &Path, level: &str) {
    let level = level.parse().unwrap_or(tracing::Level::INFO);
    if fs::create_dir_all(dir).is_err() {
        return;
    }
    let file_appender = tracing_appender::rolling::never(dir, "exposr.log");
    let subscriber = tracing_subscriber::fmt()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn log_directory(config: &LoggingConfig) -> PathBuf {
    config
        .directory
        .as_ref()
        .map_or_else(|| PathBuf::from("logs"), PathBuf::from)
}

/// Human-readable record of this session's analyses.
///
/// Disabled (every call a no-op) when logging is off or the file could not be
/// created.
#[derive(Debug, Clone, Default)]
pub struct AnalysisLog {
    path: Option<PathBuf>,
}

impl AnalysisLog {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create `exposr_<timestamp>.txt` with a header.
    pub fn open(config: &LoggingConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self {
            path: create_session_file(&log_directory(config)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one analysis. Write errors are ignored: logging never fails a flow.
    pub fn log_analysis(&self, image_uri: &str, analysis: &str) {
        let Some(path) = &self.path else { return };

        let Ok(mut file) = OpenOptions::new().append(true).open(path) else {
            return;
        };

        let now = Local::now().format("%H:%M:%S");
        let entry = format!("[{now}] Photo: {image_uri}\n{analysis}\n\n");
        let _ = file.write_all(entry.as_bytes());
    }
}

fn create_session_file(dir: &Path) -> Option<PathBuf> {
    fs::create_dir_all(dir).ok()?;

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let path = dir.join(format!("exposr_{timestamp}.txt"));

    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&path)
        .ok()?;

    let header = format!(
        "=== Exposr - Meal Analysis Log ===\nDate: {}\n==================================\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    file.write_all(header.as_bytes()).ok()?;

    Some(path)
}
