//! Projection of the user's cleaning records.
//!
//! Always kept sorted ascending by scheduled date-time, ties broken by id so
//! the order is stable across refreshes. Schedule and cancel successes patch
//! the projection in place instead of waiting for the next full fetch.

use chrono::{NaiveDate, NaiveDateTime};

use crate::backend::types::{CleaningRecord, CleaningStatus};

#[derive(Debug, Clone, Default)]
pub struct CleaningsList {
    records: Vec<CleaningRecord>,
}

impl CleaningsList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(mut records: Vec<CleaningRecord>) -> Self {
        records.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Self { records }
    }

    pub fn all(&self) -> &[CleaningRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CleaningRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Scheduled visits that have not started yet, soonest first.
    pub fn upcoming(&self, now: NaiveDateTime) -> impl Iterator<Item = &CleaningRecord> {
        self.records
            .iter()
            .filter(move |r| r.status == CleaningStatus::Scheduled && r.scheduled_at >= now)
    }

    /// The "next cleaning" highlight for the main menu.
    pub fn next_cleaning(&self, now: NaiveDateTime) -> Option<&CleaningRecord> {
        self.upcoming(now).next()
    }

    /// Calendar dates blocked for new bookings.
    pub fn booked_dates(&self) -> Vec<NaiveDate> {
        self.records
            .iter()
            .filter(|r| r.status == CleaningStatus::Scheduled)
            .map(|r| r.scheduled_at.date())
            .collect()
    }

    /// Inserts a freshly scheduled record, keeping the sort order.
    pub fn apply_scheduled(&mut self, record: CleaningRecord) {
        self.records.push(record);
        self.records.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    /// Marks a record cancelled. Returns false when the id is unknown.
    pub fn apply_cancelled(&mut self, id: &str) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.status = CleaningStatus::Cancelled;
                true
            }
            None => false,
        }
    }

    /// Moves a record to a new instant (reschedule). Returns false when the
    /// id is unknown.
    pub fn apply_rescheduled(&mut self, id: &str, scheduled_at: NaiveDateTime) -> bool {
        let found = match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.scheduled_at = scheduled_at;
                true
            }
            None => false,
        };
        if found {
            self.records.sort_by(|a, b| {
                a.scheduled_at
                    .cmp(&b.scheduled_at)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(id: &str, y: i32, m: u32, d: u32, h: u32, status: CleaningStatus) -> CleaningRecord {
        CleaningRecord {
            id: id.to_string(),
            scheduled_at: chrono::NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap(),
            status,
        }
    }

    fn now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 8, 25)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_sorted_ascending_with_id_tiebreak() {
        let list = CleaningsList::from_records(vec![
            record("b", 2026, 9, 1, 10, CleaningStatus::Scheduled),
            record("c", 2026, 8, 28, 10, CleaningStatus::Scheduled),
            record("a", 2026, 9, 1, 10, CleaningStatus::Scheduled),
        ]);
        let ids: Vec<&str> = list.all().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_upcoming_skips_past_and_non_scheduled() {
        let list = CleaningsList::from_records(vec![
            record("past", 2026, 8, 20, 10, CleaningStatus::Completed),
            record("cancelled", 2026, 8, 30, 10, CleaningStatus::Cancelled),
            record("next", 2026, 8, 27, 10, CleaningStatus::Scheduled),
            record("later", 2026, 9, 3, 10, CleaningStatus::Scheduled),
        ]);
        let ids: Vec<&str> = list.upcoming(now()).map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["next", "later"]);
        assert_eq!(list.next_cleaning(now()).map(|r| r.id.as_str()), Some("next"));
    }

    #[test]
    fn test_booked_dates_only_count_scheduled() {
        let list = CleaningsList::from_records(vec![
            record("a", 2026, 8, 27, 10, CleaningStatus::Scheduled),
            record("b", 2026, 8, 28, 10, CleaningStatus::Cancelled),
        ]);
        assert_eq!(list.booked_dates(), vec![chrono::NaiveDate::from_ymd_opt(2026, 8, 27).unwrap()]);
    }

    #[test]
    fn test_apply_cancelled_and_unknown_id() {
        let mut list = CleaningsList::from_records(vec![record("a", 2026, 8, 27, 10, CleaningStatus::Scheduled)]);
        assert!(list.apply_cancelled("a"));
        assert_eq!(list.get("a").unwrap().status, CleaningStatus::Cancelled);
        assert!(!list.apply_cancelled("missing"));
    }

    #[test]
    fn test_apply_rescheduled_resorts() {
        let mut list = CleaningsList::from_records(vec![
            record("a", 2026, 8, 27, 10, CleaningStatus::Scheduled),
            record("b", 2026, 8, 29, 10, CleaningStatus::Scheduled),
        ]);
        let new_at = chrono::NaiveDate::from_ymd_opt(2026, 9, 5)
            .unwrap()
            .and_hms_opt(11, 0, 0)
            .unwrap();
        assert!(list.apply_rescheduled("a", new_at));
        let ids: Vec<&str> = list.all().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
