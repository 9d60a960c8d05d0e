use once_cell::sync::Lazy;
use std::env;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: chistobot.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "chistobot.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: chistobot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "chistobot.log".to_string()));

/// Port the Mini App REST surface listens on
/// Read from WEBAPP_PORT environment variable
/// Default: 8080
pub static WEBAPP_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEBAPP_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080)
});

/// Base URL of a remote booking backend, if the bot should talk to one
/// over HTTP instead of its own sqlite store
/// Read from API_BASE_URL environment variable
pub static API_BASE_URL: Lazy<Option<String>> = Lazy::new(|| env::var("API_BASE_URL").ok());

/// Booking horizon in days, counted from today
/// Read from BOOKING_HORIZON_DAYS environment variable
/// Default: 30. Set to 0 to allow booking arbitrarily far ahead.
pub static BOOKING_HORIZON_DAYS: Lazy<u32> = Lazy::new(|| {
    env::var("BOOKING_HORIZON_DAYS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(booking::DEFAULT_HORIZON_DAYS)
});

/// Returns the configured horizon, `None` when the cap is disabled.
pub fn horizon_days() -> Option<u32> {
    match *BOOKING_HORIZON_DAYS {
        0 => None,
        days => Some(days),
    }
}

/// Booking rules configuration
pub mod booking {
    /// Local hour after which next-day visits can no longer be staffed.
    /// Bookings made at or past this hour start from the day after tomorrow.
    pub const CUTOFF_HOUR: u32 = 20;

    /// First bookable slot of the day (hour-aligned)
    pub const FIRST_SLOT_HOUR: u32 = 9;

    /// Last bookable slot of the day (hour-aligned)
    pub const LAST_SLOT_HOUR: u32 = 17;

    /// Default booking horizon (days from today)
    pub const DEFAULT_HORIZON_DAYS: u32 = 30;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_hours_are_ordered() {
        assert!(booking::FIRST_SLOT_HOUR < booking::LAST_SLOT_HOUR);
        assert!(booking::LAST_SLOT_HOUR < 24);
    }

    #[test]
    fn test_cutoff_hour_is_in_evening() {
        assert!(booking::CUTOFF_HOUR > booking::LAST_SLOT_HOUR);
    }
}
