// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Logging setup shared by the memfs binaries
//!
//! Library crates only emit `tracing` events; binaries install a subscriber
//! through [`CliLoggingArgs`] or one of the `init*` functions. `RUST_LOG`
//! always wins over the level picked here.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

pub use tracing::Level;

/// Directory (under the platform data dir) that holds log files
const LOG_DIR_NAME: &str = "memfs";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Plaintext,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Plaintext => "plaintext",
            LogFormat::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
            .map_err(|_| format!("unknown log format '{s}', expected plaintext or json"))
    }
}

/// Verbosity as accepted on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogLevel {
    Error,
    /// Stale stream commits show up here
    #[default]
    Warn,
    Info,
    /// Every mutating filesystem operation
    Debug,
    /// Lookups, stream commits and permission denials
    Trace,
}

impl CliLogLevel {
    pub fn as_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl From<CliLogLevel> for Level {
    fn from(level: CliLogLevel) -> Self {
        level.as_level()
    }
}

/// Logging flags; embed with `#[command(flatten)]`.
///
/// Events go to stderr unless `--log-file` or `--log-dir` is given, so
/// stdout stays reserved for command output.
#[derive(Clone, Debug, Default, clap::Args)]
pub struct CliLoggingArgs {
    /// Log verbosity [default: warn]
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<CliLogLevel>,

    /// Log output format [default: plaintext]
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Directory for log files
    #[arg(long, value_name = "DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Log file; relative names go under --log-dir, or the per-user data dir
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

impl CliLoggingArgs {
    pub fn init(&self, component: &str) -> anyhow::Result<()> {
        self.init_with_default_level(component, CliLogLevel::default())
    }

    pub fn init_with_default_level(
        &self,
        component: &str,
        fallback: CliLogLevel,
    ) -> anyhow::Result<()> {
        let level = self.log_level.unwrap_or(fallback).as_level();
        let format = self.log_format.unwrap_or_default();
        match self.log_path(component) {
            Some(path) => init_to_file(component, level, format, &path),
            None => init(component, level, format),
        }
    }

    /// File that logging writes to, or `None` for stderr
    pub fn log_path(&self, component: &str) -> Option<PathBuf> {
        match (&self.log_file, &self.log_dir) {
            (Some(file), _) if file.is_absolute() => Some(file.clone()),
            (Some(file), Some(dir)) => Some(dir.join(file)),
            (Some(file), None) => Some(default_log_dir().join(file)),
            (None, Some(dir)) => Some(dir.join(format!("{component}.log"))),
            (None, None) => None,
        }
    }
}

/// Per-user directory for log files named without a directory
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(LOG_DIR_NAME)
}

/// Log to stderr
pub fn init(component: &str, level: Level, format: LogFormat) -> anyhow::Result<()> {
    init_with_writer(component, level, format, io::stderr)
}

/// Append to `log_path`, creating missing directories
pub fn init_to_file(
    component: &str,
    level: Level,
    format: LogFormat,
    log_path: &Path,
) -> anyhow::Result<()> {
    if let Some(dir) = log_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;
    init_with_writer(component, level, format, file)
}

pub fn init_with_writer<W>(
    component: &str,
    level: Level,
    format: LogFormat,
    writer: W,
) -> anyhow::Result<()>
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(component, level)));

    let events = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_file(cfg!(debug_assertions))
        .with_line_number(cfg!(debug_assertions));
    let events = match format {
        LogFormat::Json => events.json().boxed(),
        LogFormat::Plaintext => events.boxed(),
    };

    tracing_subscriber::registry().with(events.with_filter(filter)).try_init()?;
    Ok(())
}

/// Filter used when `RUST_LOG` is unset: `level` applies globally, to the
/// component and to the engine crate
fn default_directives(component: &str, level: Level) -> String {
    let target = component.replace('-', "_");
    format!("{level},{target}={level},memfs_core={level}")
}
