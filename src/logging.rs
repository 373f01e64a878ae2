//! Logging module
//!
//! Initializes an env_logger based logging system.
//! Emits one-line JSON logs to stdout only.

use anyhow::Result;
use log::LevelFilter;
use serde_json::{json, Value};
use std::io::Write;

/// Parse log level string to LevelFilter
fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

/// Initialize logging system. Logs one-line JSON records to stdout.
pub fn init_logging(log_level_str: &str) -> Result<()> {
    let log_level = parse_log_level(log_level_str);

    env_logger::Builder::new()
        .format(move |buf, record| {
            let payload = build_json_payload(
                &chrono::Utc::now().to_rfc3339(),
                &record.level().to_string(),
                &record.args().to_string(),
                record.module_path().unwrap_or(record.target()),
                "log",
                json!({}),
            );
            writeln!(buf, "{}", payload)
        })
        .filter_level(log_level)
        .init();

    Ok(())
}

fn build_json_payload(
    timestamp: &str,
    level: &str,
    message: &str,
    module: &str,
    event: &str,
    fields: Value,
) -> Value {
    json!({
        "timestamp": timestamp,
        "level": level,
        "message": message,
        "module": module,
        "event": event,
        "fields": fields
    })
}
