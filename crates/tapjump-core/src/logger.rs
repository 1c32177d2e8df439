//! Stderr logging for the autopilot.
//!
//! Lines look like `[   1.234s  INFO vision::target] message`. Records from
//! the `tapjump*` crates pass at the configured level; everything else
//! (image decoding, edge detection internals) is capped at `warn` so a
//! `debug` run stays readable.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const OWN_PREFIX: &str = "tapjump";
const DEPENDENCY_CAP: LevelFilter = LevelFilter::Warn;

#[cfg(feature = "tracing")]
const DEFAULT_TRACING_FILTER: &str = "warn,tapjump=info";

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl StderrLogger {
    fn limit_for(&self, target: &str) -> LevelFilter {
        if target.starts_with(OWN_PREFIX) {
            self.level
        } else {
            self.level.min(DEPENDENCY_CAP)
        }
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.limit_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = render(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// `tapjump_vision::target` -> `vision::target`; the facade crate and
/// foreign targets are kept as they are.
fn short_target(target: &str) -> &str {
    target.strip_prefix("tapjump_").unwrap_or(target)
}

fn render(elapsed_secs: f64, level: log::Level, target: &str, args: impl std::fmt::Display) -> String {
    format!(
        "[{elapsed_secs:8.3}s {level:>5} {}] {args}",
        short_target(target)
    )
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger.
///
/// Only the first call installs anything; later calls return `Ok(())` and
/// keep the original level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| StderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber. `RUST_LOG` overrides the default filter
/// (`warn`, `info` for the tapjump crates).
///
/// Span close events carry per-stage timings of the locators and of each
/// control-loop iteration.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TRACING_FILTER));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .compact()
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    fn logger(level: LevelFilter) -> StderrLogger {
        StderrLogger {
            level,
            started: Instant::now(),
        }
    }

    fn meta(level: Level, target: &str) -> Metadata<'_> {
        Metadata::builder().level(level).target(target).build()
    }

    #[test]
    fn own_crates_follow_configured_level() {
        let log = logger(LevelFilter::Debug);
        assert!(log.enabled(&meta(Level::Debug, "tapjump_vision::target")));
        assert!(log.enabled(&meta(Level::Debug, "tapjump::session")));
        assert!(!log.enabled(&meta(Level::Trace, "tapjump::session")));
    }

    #[test]
    fn dependencies_are_capped_at_warn() {
        let log = logger(LevelFilter::Trace);
        assert!(!log.enabled(&meta(Level::Info, "imageproc::edges")));
        assert!(log.enabled(&meta(Level::Warn, "imageproc::edges")));

        let quiet = logger(LevelFilter::Error);
        assert!(!quiet.enabled(&meta(Level::Warn, "image::codecs")));
    }

    #[test]
    fn line_carries_elapsed_level_and_short_target() {
        let line = render(1.5, Level::Info, "tapjump_vision::piece", "piece at (3, 4)");
        assert_eq!(line, "[   1.500s  INFO vision::piece] piece at (3, 4)");
        let line = render(0.0, Level::Warn, "tapjump::session", "skip");
        assert_eq!(line, "[   0.000s  WARN tapjump::session] skip");
    }
}
