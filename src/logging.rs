//! Subscriber setup for the binaries. The library only emits `tracing` events.
//!
//! Level resolution:
//! 1. the explicit level passed by the caller
//! 2. `SCHEDULE_ENGINE_LOG` (e.g. "info", "debug")
//! 3. `RUST_LOG`, interpreted as a full `EnvFilter` directive
//! 4. `info`

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;

pub const LOG_ENV_VAR: &str = "SCHEDULE_ENGINE_LOG";

/// Install the global fmt subscriber. A second call is a no-op.
pub fn init_logging(level: Option<&str>) {
    let explicit = level
        .and_then(parse_level_str)
        .or_else(|| std::env::var(LOG_ENV_VAR).ok().and_then(|s| parse_level_str(&s)));

    let filter = match explicit {
        Some(level) => EnvFilter::default().add_directive(LevelFilter::from_level(level).into()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    // stdout belongs to command output; logs go to stderr
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
