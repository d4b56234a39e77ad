//! Stderr logger with per-target levels, plus an optional `tracing` subscriber.
//!
//! Lines look like `[  0.153s  INFO calib::engine] message`; the shared
//! `sheet_inspect_` crate prefix is dropped from targets. Levels come from a
//! [`LogFilter`] such as `info,sheet_inspect_features=debug`, so one pipeline
//! stage can be traced without flooding the rest.

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const CRATE_PREFIX: &str = "sheet_inspect_";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LogFilterError {
    #[error("unknown log level `{0}`")]
    Level(String),
    #[error("empty target in directive `{0}`")]
    Target(String),
}

/// Default level plus `target=level` overrides, longest prefix wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFilter {
    pub default: LevelFilter,
    directives: Vec<(String, LevelFilter)>,
}

impl LogFilter {
    pub fn new(default: LevelFilter) -> Self {
        Self {
            default,
            directives: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>, level: LevelFilter) -> Self {
        self.directives.push((target.into(), level));
        self.directives.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    /// Level for a record target; modules inherit their crate's directive.
    pub fn level_for(&self, target: &str) -> LevelFilter {
        self.directives
            .iter()
            .find(|(prefix, _)| {
                target
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
            })
            .map_or(self.default, |(_, level)| *level)
    }

    /// Most verbose level any target may log at.
    pub fn max_level(&self) -> LevelFilter {
        self.directives
            .iter()
            .map(|(_, level)| *level)
            .fold(self.default, Ord::max)
    }
}

impl FromStr for LogFilter {
    type Err = LogFilterError;

    /// Comma-separated `level` and `target=level` items; later items win.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_level = |raw: &str| {
            LevelFilter::from_str(raw.trim()).map_err(|_| LogFilterError::Level(raw.trim().to_string()))
        };
        let mut filter = LogFilter::new(LevelFilter::Info);
        for item in s.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            match item.split_once('=') {
                Some((target, level)) => {
                    let target = target.trim();
                    if target.is_empty() {
                        return Err(LogFilterError::Target(item.to_string()));
                    }
                    let level = parse_level(level)?;
                    filter.directives.retain(|(t, _)| t != target);
                    filter = filter.with_target(target, level);
                }
                None => filter.default = parse_level(item)?,
            }
        }
        Ok(filter)
    }
}

fn short_target(target: &str) -> &str {
    target.strip_prefix(CRATE_PREFIX).unwrap_or(target)
}

fn format_line(elapsed_s: f64, record: &Record) -> String {
    format!(
        "[{:7.3}s {:>5} {}] {}",
        elapsed_s,
        record.level(),
        short_target(record.target()),
        record.args()
    )
}

struct StderrLogger {
    filter: LogFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(self.started.elapsed().as_secs_f64(), record);
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with per-target levels.
///
/// Only the first call installs; later filters are ignored.
pub fn init_with_filter(filter: LogFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let max = filter.max_level();
        let logger = LOGGER.get_or_init(|| StderrLogger {
            filter,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(max);
    }
    Ok(())
}

/// Install the stderr logger with one level for every target.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    init_with_filter(LogFilter::new(level))
}

/// Install a global `tracing` subscriber honouring `RUST_LOG` (default `info`).
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_directive_covers_its_modules_only() {
        let filter: LogFilter = "warn,sheet_inspect_features=debug,sheet_inspect_features::holes=trace"
            .parse()
            .expect("filter");
        assert_eq!(filter.level_for("sheet_inspect_calib::engine"), LevelFilter::Warn);
        assert_eq!(filter.level_for("sheet_inspect_features"), LevelFilter::Debug);
        assert_eq!(filter.level_for("sheet_inspect_features::defects"), LevelFilter::Debug);
        assert_eq!(filter.level_for("sheet_inspect_features::holes"), LevelFilter::Trace);
        // Prefix must end on a module boundary.
        assert_eq!(filter.level_for("sheet_inspect_featuresx"), LevelFilter::Warn);
        assert_eq!(filter.max_level(), LevelFilter::Trace);
    }

    #[test]
    fn later_items_win_and_bad_items_fail() {
        let filter: LogFilter = "debug, sheet_inspect_calib=info ,error,sheet_inspect_calib=off"
            .parse()
            .expect("filter");
        assert_eq!(filter.default, LevelFilter::Error);
        assert_eq!(filter.level_for("sheet_inspect_calib::io"), LevelFilter::Off);
        assert_eq!("".parse::<LogFilter>(), Ok(LogFilter::new(LevelFilter::Info)));
        assert_eq!(
            "loud".parse::<LogFilter>(),
            Err(LogFilterError::Level("loud".to_string()))
        );
        assert!(matches!("=debug".parse::<LogFilter>(), Err(LogFilterError::Target(_))));
    }

    #[test]
    fn lines_drop_the_shared_crate_prefix() {
        let line = format_line(
            0.1534,
            &Record::builder()
                .level(log::Level::Info)
                .target("sheet_inspect_calib::engine")
                .args(format_args!("accepted {} corners", 12))
                .build(),
        );
        assert_eq!(line, "[  0.153s  INFO calib::engine] accepted 12 corners");
        assert_eq!(short_target("sheet_inspect"), "sheet_inspect");
    }
}
