//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Startup configuration report

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at application startup
///
/// Reports bot token presence, database path, webapp port and the active
/// booking rules so a misconfigured deployment is visible in the first
/// screen of the log.
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🧹 Chistobot Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if config::BOT_TOKEN.is_empty() {
        log::warn!("⚠️  BOT_TOKEN: not set — the chat surface will not start");
        log::warn!("   Mini App auth will fall back to UNVERIFIED init data");
    } else {
        log::info!("✅ BOT_TOKEN: set ({} chars)", config::BOT_TOKEN.len());
    }

    log::info!("📦 DATABASE_PATH: {}", *config::DATABASE_PATH);
    log::info!("🌐 WEBAPP_PORT: {}", *config::WEBAPP_PORT);

    match *config::API_BASE_URL {
        Some(ref url) => log::info!("🔗 API_BASE_URL: {} (remote backend mode)", url),
        None => log::info!("🔗 API_BASE_URL: not set — serving bookings from the local store"),
    }

    match config::horizon_days() {
        Some(days) => log::info!("📅 Booking horizon: {} days", days),
        None => log::info!("📅 Booking horizon: unlimited (BOOKING_HORIZON_DAYS=0)"),
    }
    log::info!(
        "🕗 Next-day cutoff: {}:00, slots {:02}:00–{:02}:00",
        config::booking::CUTOFF_HOUR,
        config::booking::FIRST_SLOT_HOUR,
        config::booking::LAST_SLOT_HOUR
    );
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::NamedTempFile;

    #[test]
    fn test_init_logger_creates_log_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        // The global logger may already be installed by another test;
        // either outcome just needs to not panic.
        let result = init_logger(path);
        assert!(result.is_ok() || result.is_err());
    }
}
