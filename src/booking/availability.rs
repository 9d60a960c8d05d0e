//! Date and time-slot availability rules for the booking wizard.
//!
//! The rules are pure functions over an explicit "now" so every boundary is
//! unit-testable without touching the clock.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::core::config;

/// Effective availability rules for one wizard instance.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityRules {
    /// Local hour after which next-day visits can no longer be staffed
    pub cutoff_hour: u32,
    /// How far ahead a visit may be booked, `None` = no cap
    pub horizon_days: Option<u32>,
}

impl AvailabilityRules {
    /// Rules from the process configuration.
    pub fn from_config() -> Self {
        Self {
            cutoff_hour: config::booking::CUTOFF_HOUR,
            horizon_days: config::horizon_days(),
        }
    }
}

impl Default for AvailabilityRules {
    fn default() -> Self {
        Self {
            cutoff_hour: config::booking::CUTOFF_HOUR,
            horizon_days: Some(config::booking::DEFAULT_HORIZON_DAYS),
        }
    }
}

/// Why a date cannot be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnavailable {
    /// Earlier than the operational lead time allows
    BeforeMinimum { min: NaiveDate },
    /// Past the booking horizon
    BeyondHorizon { max: NaiveDate },
    /// The user already has a scheduled visit on this calendar date
    AlreadyBooked,
}

impl std::fmt::Display for DateUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateUnavailable::BeforeMinimum { min } => {
                write!(f, "ближайшая доступная дата — {}", min.format("%d.%m.%Y"))
            }
            DateUnavailable::BeyondHorizon { max } => {
                write!(f, "запись открыта до {}", max.format("%d.%m.%Y"))
            }
            DateUnavailable::AlreadyBooked => {
                write!(f, "на выбранную дату уже запланирована уборка")
            }
        }
    }
}

/// Earliest bookable date: tomorrow before the cutoff hour, the day after
/// tomorrow from the cutoff hour on.
pub fn min_bookable_date(now: NaiveDateTime, rules: &AvailabilityRules) -> NaiveDate {
    let lead = if now.hour() < rules.cutoff_hour { 1 } else { 2 };
    now.date() + Duration::days(lead)
}

/// Latest bookable date, `None` when the horizon cap is disabled.
pub fn max_bookable_date(now: NaiveDateTime, rules: &AvailabilityRules) -> Option<NaiveDate> {
    rules
        .horizon_days
        .map(|days| now.date() + Duration::days(i64::from(days)))
}

/// Checks whether `date` can be booked right now, given the calendar dates
/// that already hold a scheduled visit.
pub fn check_date(
    date: NaiveDate,
    now: NaiveDateTime,
    booked: &[NaiveDate],
    rules: &AvailabilityRules,
) -> Result<(), DateUnavailable> {
    let min = min_bookable_date(now, rules);
    if date < min {
        return Err(DateUnavailable::BeforeMinimum { min });
    }
    if let Some(max) = max_bookable_date(now, rules) {
        if date > max {
            return Err(DateUnavailable::BeyondHorizon { max });
        }
    }
    if booked.contains(&date) {
        return Err(DateUnavailable::AlreadyBooked);
    }
    Ok(())
}

/// The fixed daily slot set, in order.
pub fn time_slots() -> Vec<NaiveTime> {
    (config::booking::FIRST_SLOT_HOUR..=config::booking::LAST_SLOT_HOUR)
        .filter_map(|h| NaiveTime::from_hms_opt(h, 0, 0))
        .collect()
}

/// Parses a slot label such as "10:00" into a time, only if it belongs to
/// the fixed slot set.
pub fn parse_slot(label: &str) -> Option<NaiveTime> {
    let time = NaiveTime::parse_from_str(label, "%H:%M").ok()?;
    time_slots().contains(&time).then_some(time)
}

/// Formats a slot the way the UI displays it.
pub fn slot_label(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Combines a calendar date with a slot into the instant sent to the backend.
pub fn combine(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    date.and_time(time)
}
