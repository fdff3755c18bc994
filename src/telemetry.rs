//! Tracing/logging initialization.

use std::path::{Path, PathBuf};

use tracing::Span;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Logging settings, taken from the command line.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Default filter, overridden by `RUST_LOG`
    pub level: String,
    /// JSON lines on stdout instead of the human format
    pub json: bool,
    /// Write JSON lines to a daily-rotated file instead of stdout
    pub file: Option<PathBuf>,
    pub service_name: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
            service_name: "saldo".to_string(),
        }
    }
}

/// Initialize the process-wide subscriber.
///
/// Safe to call more than once; later calls are no-ops. When logging to a
/// file the returned guard must be held until shutdown, dropping it flushes
/// pending records.
pub fn init(settings: &LogSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(path) = &settings.file {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "saldo.log".into());

        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(writer)
            .with_target(false)
            .try_init();
        return Some(guard);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let _ = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    None
}

/// Root span tagging everything recorded inside it with the service name.
pub fn service_span(service_name: &str) -> Span {
    tracing::info_span!("service", service = %service_name)
}
