//! Logger initialization.

use std::io::Write;

use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter};

use crate::config::LogFormat;
use crate::error_handling::InitializationError;

const CRATE_PREFIX: &str = "telemetry_relay::";

/// Noisy dependencies and the most verbose level they may log at.
const DEPENDENCY_CEILINGS: [(&str, LevelFilter); 4] = [
    ("sqlx", LevelFilter::Info),
    ("reqwest", LevelFilter::Info),
    ("hyper", LevelFilter::Info),
    ("hyper_util", LevelFilter::Info),
];

/// Installs the global logger.
///
/// `RUST_LOG` is read first; `level` then overrides it for this crate. Plain
/// output is colored and shortens this crate's module paths, JSON output writes
/// one object per line with a millisecond Unix timestamp.
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if a logger is already installed.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=telemetry_relay=debug,sqlx=warn telemetry_relay events.jsonl
/// ```
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    for (module, ceiling) in DEPENDENCY_CEILINGS {
        builder.filter_module(module, ceiling.min(level));
    }
    builder.filter_module("telemetry_relay", level);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                let line = serde_json::json!({
                    "ts": chrono::Utc::now().timestamp_millis(),
                    "level": record.level().as_str(),
                    "target": record.target(),
                    "msg": record.args().to_string(),
                });
                writeln!(buf, "{line}")
            });
        }
        LogFormat::Plain => {
            colored::control::set_override(true);
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{} {} {} {}",
                    chrono::Local::now().format("%H:%M:%S%.3f"),
                    level_label(record.level()),
                    short_target(record.target()).cyan(),
                    record.args()
                )
            });
        }
    }

    builder.try_init()?;
    Ok(())
}

fn level_label(level: Level) -> ColoredString {
    let label = level.as_str();
    match level {
        Level::Error => label.red().bold(),
        Level::Warn => label.yellow(),
        Level::Info => label.green(),
        Level::Debug => label.blue(),
        Level::Trace => label.purple(),
    }
}

/// Drops the crate name from this crate's module paths.
fn short_target(target: &str) -> &str {
    target.strip_prefix(CRATE_PREFIX).unwrap_or(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_target() {
        assert_eq!(
            short_target("telemetry_relay::delivery::controller"),
            "delivery::controller"
        );
        assert_eq!(short_target("sqlx::query"), "sqlx::query");
        assert_eq!(short_target("telemetry_relay"), "telemetry_relay");
    }

    #[test]
    fn test_init_logger_twice_does_not_panic() {
        let first = init_logger_with(LevelFilter::Info, LogFormat::Plain);
        let second = init_logger_with(LevelFilter::Debug, LogFormat::Json);
        // At most one global logger per process
        assert!(first.is_err() || second.is_err());
        if let Err(e) = second {
            assert!(e.to_string().contains("Logger initialization error"));
        }
    }
}
