//! Logging utilities
//!
//! Maps the `LOGLEVEL` names used in deployment onto `env_logger` filters.
//! `RUST_LOG`, when set, is applied on top.

use log::LevelFilter;

/// Translate a level name; unknown names fall back to `Info`.
pub fn level_filter(level: &str) -> LevelFilter {
    match level.trim().to_ascii_uppercase().as_str() {
        "DBUG" => LevelFilter::Trace,
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" | "CRITICAL" => LevelFilter::Error,
        "OFF" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Setup logging for the process
pub fn init_logging(level: &str) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level_filter(level));
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    // a second init (tests, embedding) keeps the first logger
    let _ = builder.try_init();
}
