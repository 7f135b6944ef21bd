//! Process-wide logging bootstrap.
//!
//! # Responsibility
//! - Start the rolling file logger at most once per process.
//! - Keep store diagnostics metadata-only (`event=... module=... status=...`);
//!   record values and predicate arguments never reach the log.
//!
//! # Invariants
//! - A second start with equal settings is a no-op; differing settings are
//!   rejected with `LoggingError::Conflict`.
//! - Starting the logger never panics.

use crate::config::StoreConfig;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "contentdb";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 4;
const PANIC_SUMMARY_CHARS: usize = 160;

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Logger start-up errors.
#[derive(Debug)]
pub enum LoggingError {
    UnsupportedLevel(String),
    InvalidDirectory(String),
    CreateDirectory { dir: PathBuf, source: std::io::Error },
    Backend(flexi_logger::FlexiLoggerError),
    /// Logging already runs with other settings.
    Conflict { active: LogSettings, requested: LogSettings },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidDirectory(reason) => write!(f, "invalid log directory: {reason}"),
            Self::CreateDirectory { dir, source } => {
                write!(f, "cannot create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(err) => write!(f, "logger backend failed: {err}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logging already running as {active}; cannot restart as {requested}"
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDirectory { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Validated logger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    level: &'static str,
    dir: PathBuf,
}

impl LogSettings {
    /// Normalizes `level` and checks that `dir` is absolute.
    pub fn new(level: &str, dir: impl AsRef<Path>) -> Result<Self, LoggingError> {
        Ok(Self {
            level: parse_level(level)?,
            dir: absolute_dir(dir.as_ref())?,
        })
    }

    pub fn level(&self) -> &'static str {
        self.level
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Display for LogSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "level={} dir={}", self.level, self.dir.display())
    }
}

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Starts file logging at `level` under the absolute directory `log_dir`.
pub fn init_logging(level: &str, log_dir: impl AsRef<Path>) -> Result<(), LoggingError> {
    start(LogSettings::new(level, log_dir)?)
}

/// Starts logging as described by `config`.
///
/// Returns `Ok(false)` without touching the logger when `log_dir` is unset.
pub fn init_logging_from_config(config: &StoreConfig) -> Result<bool, LoggingError> {
    match &config.log_dir {
        Some(dir) => init_logging(&config.log_level, dir).map(|()| true),
        None => Ok(false),
    }
}

/// Settings of the running logger, if one was started.
pub fn logging_status() -> Option<LogSettings> {
    ACTIVE_LOGGER.get().map(|active| active.settings.clone())
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(requested: LogSettings) -> Result<(), LoggingError> {
    let active = ACTIVE_LOGGER.get_or_try_init(|| spawn_logger(requested.clone()))?;
    if active.settings == requested {
        Ok(())
    } else {
        Err(LoggingError::Conflict {
            active: active.settings.clone(),
            requested,
        })
    }
}

fn spawn_logger(settings: LogSettings) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|source| LoggingError::CreateDirectory {
        dir: settings.dir.clone(),
        source,
    })?;

    let handle = Logger::try_with_str(settings.level)
        .map_err(LoggingError::Backend)?
        .log_to_file(
            FileSpec::default()
                .directory(settings.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(LoggingError::Backend)?;

    install_panic_hook();
    info!(
        "event=logging_start module=logging status=ok os={} debug_build={} version={} {}",
        std::env::consts::OS,
        cfg!(debug_assertions),
        env!("CARGO_PKG_VERSION"),
        settings
    );

    Ok(ActiveLogger {
        settings,
        _handle: handle,
    })
}

fn parse_level(level: &str) -> Result<&'static str, LoggingError> {
    let normalized = level.trim().to_ascii_lowercase();
    let parsed = match normalized.as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => return Err(LoggingError::UnsupportedLevel(normalized)),
    };
    Ok(parsed)
}

fn absolute_dir(dir: &Path) -> Result<PathBuf, LoggingError> {
    if dir.as_os_str().is_empty() {
        return Err(LoggingError::InvalidDirectory("path is empty".to_string()));
    }
    if !dir.is_absolute() {
        return Err(LoggingError::InvalidDirectory(format!(
            "`{}` is not absolute",
            dir.display()
        )));
    }
    Ok(dir.to_path_buf())
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let chained = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map_or_else(|| "unknown".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            single_line(&payload, PANIC_SUMMARY_CHARS)
        );
        chained(info);
    }));
}

/// Collapses line breaks and truncates to `max_chars`, marking the cut.
fn single_line(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .collect();
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}
