//! Logging system configuration and initialization
//!
//! Console output plus an optional log file written through a non-blocking
//! appender. `RUST_LOG` overrides the configured level when set. Old log
//! files beyond the configured count are removed on startup.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

/// Log file name inside the log directory
pub const LOG_FILE_PREFIX: &str = "catalog-sync";

// Keeps the file writer alive for the whole process
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

/// Local wall-clock timestamps with milliseconds
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Log directory from the configuration, falling back to `./logs`
pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    if config.log_dir.as_os_str().is_empty() {
        std::env::current_dir().unwrap_or_default().join("logs")
    } else {
        config.log_dir.clone()
    }
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut filter = EnvFilter::new(&config.level);

    // Dependencies stay quiet unless TRACE is requested
    if !config.level.to_lowercase().contains("trace") {
        for (module, level) in &config.module_filters {
            match format!("{}={}", module, level).parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => warn!("Ignoring log filter {}={}: {}", module, level, e),
            }
        }
    }

    if let Ok(directive) = format!("catalog_sync_lib={}", config.level).parse() {
        filter = filter.add_directive(directive);
    }

    filter
}

/// Initialize the global subscriber. Fails if no output is enabled or a
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let log_dir = get_log_directory(config);

    if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
    }

    let registry = Registry::default().with(build_env_filter(config));
    let log_file_name = format!("{}-{}.log", LOG_FILE_PREFIX, Local::now().format("%Y%m%dT%H%M%S"));

    let init_result = match (config.file_output, config.console_output) {
        (true, console) => {
            let file_appender = rolling::never(&log_dir, &log_file_name);
            let (file_writer, file_guard) = non_blocking(file_appender);

            LOG_GUARDS
                .lock()
                .map_err(|_| anyhow!("Log guard registry is poisoned"))?
                .push(file_guard);

            let console_layer = console.then(|| {
                fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .with_timer(LocalTimeFormatter)
                    .with_target(false)
            });

            if config.json_format {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false);
                registry.with(console_layer).with(file_layer).try_init()
            } else {
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(true)
                    .with_ansi(false);
                registry.with(console_layer).with(file_layer).try_init()
            }
        }
        (false, true) => {
            let console_layer = fmt::Layer::new()
                .with_writer(std::io::stderr)
                .with_timer(LocalTimeFormatter)
                .with_target(false);
            registry.with(console_layer).try_init()
        }
        (false, false) => {
            return Err(anyhow!("No logging output configured"));
        }
    };
    init_result.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    if config.file_output && config.auto_cleanup_logs {
        match cleanup_old_logs(&log_dir, config.max_files as usize) {
            Ok(removed) if removed > 0 => info!("Removed {} old log files", removed),
            Ok(_) => {}
            Err(e) => warn!("Log cleanup failed: {}", e),
        }
    }

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log file: {:?}", log_dir.join(&log_file_name));
    }

    Ok(())
}

/// Keep the newest `max_files` `.log` files in `log_dir`, delete the rest.
/// Returns how many files were removed.
pub fn cleanup_old_logs(log_dir: &Path, max_files: usize) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("log"));
        if !is_log {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            log_files.push((path, modified));
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(max_files) {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove old log file {:?}: {}", path, e),
        }
    }

    Ok(removed)
}
