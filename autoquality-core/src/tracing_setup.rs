//! Tracing setup for AutoQuality
//!
//! Console output at a user-chosen level, plus a full trace of the last run
//! on disk. The trace file records when each `attempt` span closes, which
//! gives the wall time of every selection attempt.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File name of the per-run trace log.
pub const LAST_RUN_LOG: &str = "autoquality-last-run.log";

/// Initialize tracing with console output and a trace file.
///
/// `RUST_LOG` overrides the console filter when set. The trace file in
/// `logs_dir` (default `./logs`) is truncated on every run.
///
/// Returns the path of the trace file.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - The logs directory or file could not be created, or a global subscriber is already installed
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;

    let log_file_path = logs_path.join(LAST_RUN_LOG);
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_directives(console_level)));

    let console_layer = fmt::layer()
        .compact()
        .with_target(console_level >= Level::DEBUG)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        "Tracing initialized: console={}, trace_file={}",
        console_level,
        log_file_path.display()
    );

    Ok(log_file_path)
}

/// Console filter directives; the simulator stays at warn unless tracing.
fn console_directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    let sim_level = if level == "trace" { "trace" } else { "warn" };
    format!("{level},autoquality_sim={sim_level}")
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Selections made and settings saved
    Info,
    /// Every attempt step and scheduler decision
    Debug,
    /// Menu polling and simulator internals
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use autoquality_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Info.as_tracing_level();
    /// assert_eq!(level, tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_directives_quiet_simulator_below_trace() {
        assert_eq!(console_directives(Level::DEBUG), "debug,autoquality_sim=warn");
        assert_eq!(console_directives(Level::INFO), "info,autoquality_sim=warn");
        assert_eq!(console_directives(Level::TRACE), "trace,autoquality_sim=trace");
        assert!(EnvFilter::try_new(console_directives(Level::WARN)).is_ok());
    }
}
