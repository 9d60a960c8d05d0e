//! Backend served straight from the sqlite store.
//!
//! Used when the bot and the booking backend are the same process: the chat
//! surface and the Mini App REST layer both go through [`BackendApi`], so
//! swapping the remote client for this one changes nothing above the trait.

use async_trait::async_trait;

use crate::backend::client::BackendApi;
use crate::backend::types::{
    builtin_tariffs, CleaningRecord, CleaningStatus, RescheduleRequest, ScheduleRequest, Tariff,
    TariffId, UserProfile,
};
use crate::core::{AppError, AppResult};
use crate::storage::db::{self, DbPool};

/// Per-user handle onto the local store.
#[derive(Clone)]
pub struct LocalBackend {
    pool: DbPool,
    user_id: i64,
}

impl LocalBackend {
    pub fn new(pool: DbPool, user_id: i64) -> Self {
        Self { pool, user_id }
    }
}

#[async_trait]
impl BackendApi for LocalBackend {
    async fn list_tariffs(&self) -> AppResult<Vec<Tariff>> {
        Ok(builtin_tariffs())
    }

    async fn get_tariff(&self, id: TariffId) -> AppResult<Tariff> {
        builtin_tariffs()
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| AppError::Backend(format!("unknown tariff: {}", id)))
    }

    async fn list_cleanings(&self) -> AppResult<Vec<CleaningRecord>> {
        let conn = db::get_connection(&self.pool)?;
        Ok(db::list_cleanings(&conn, self.user_id)?)
    }

    async fn schedule(&self, req: &ScheduleRequest) -> AppResult<CleaningRecord> {
        let conn = db::get_connection(&self.pool)?;
        // One visit per calendar day
        if db::has_scheduled_on(&conn, self.user_id, req.date.date())? {
            return Err(AppError::Validation("на эту дату уже запланирована уборка".to_string()));
        }
        let record = db::insert_cleaning(&conn, self.user_id, req.date)?;
        log::info!(
            "User {} scheduled cleaning {} at {} ({})",
            self.user_id,
            record.id,
            record.scheduled_at,
            req.tariff_id
        );
        Ok(record)
    }

    async fn cancel(&self, id: &str) -> AppResult<()> {
        let conn = db::get_connection(&self.pool)?;
        let record = db::get_cleaning(&conn, self.user_id, id)?
            .ok_or_else(|| AppError::Backend(format!("cleaning {} not found", id)))?;
        if record.status != CleaningStatus::Scheduled {
            return Err(AppError::Validation("отменить можно только запланированную уборку".to_string()));
        }
        db::update_cleaning_status(&conn, self.user_id, id, CleaningStatus::Cancelled)?;
        log::info!("User {} cancelled cleaning {}", self.user_id, id);
        Ok(())
    }

    async fn reschedule(&self, id: &str, req: &RescheduleRequest) -> AppResult<CleaningRecord> {
        let conn = db::get_connection(&self.pool)?;
        if db::has_scheduled_on(&conn, self.user_id, req.date.date())? {
            return Err(AppError::Validation("на эту дату уже запланирована уборка".to_string()));
        }
        if !db::update_cleaning_time(&conn, self.user_id, id, req.date)? {
            return Err(AppError::Validation("перенести можно только запланированную уборку".to_string()));
        }
        let record = db::get_cleaning(&conn, self.user_id, id)?
            .ok_or_else(|| AppError::Backend(format!("cleaning {} not found", id)))?;
        log::info!("User {} rescheduled cleaning {} to {}", self.user_id, id, record.scheduled_at);
        Ok(record)
    }

    async fn current_user(&self) -> AppResult<UserProfile> {
        let conn = db::get_connection(&self.pool)?;
        let stored = db::get_user(&conn, self.user_id)?;
        Ok(UserProfile {
            id: self.user_id,
            first_name: stored.as_ref().and_then(|u| u.first_name.clone()),
            username: stored.and_then(|u| u.username),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let pool = db::create_pool(path.to_str().unwrap()).unwrap();
        (dir, LocalBackend::new(pool, 100))
    }

    fn request(day: u32) -> ScheduleRequest {
        ScheduleRequest {
            date: NaiveDate::from_ymd_opt(2026, 9, day).unwrap().and_hms_opt(10, 0, 0).unwrap(),
            time: "10:00".to_string(),
            tariff_id: TariffId::Standard,
        }
    }

    #[tokio::test]
    async fn test_schedule_then_list() {
        let (_dir, backend) = backend();
        let record = backend.schedule(&request(1)).await.unwrap();
        assert_eq!(record.status, CleaningStatus::Scheduled);

        let listed = backend.list_cleanings().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, record.id);
    }

    #[tokio::test]
    async fn test_double_booking_same_date_rejected() {
        let (_dir, backend) = backend();
        backend.schedule(&request(1)).await.unwrap();
        let err = backend.schedule(&request(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancel_is_scheduled_only() {
        let (_dir, backend) = backend();
        let record = backend.schedule(&request(1)).await.unwrap();
        backend.cancel(&record.id).await.unwrap();

        // Second cancel hits a record that is no longer scheduled
        let err = backend.cancel(&record.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reschedule_moves_the_visit() {
        let (_dir, backend) = backend();
        let record = backend.schedule(&request(1)).await.unwrap();

        let new_at = NaiveDate::from_ymd_opt(2026, 9, 5).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let moved = backend
            .reschedule(
                &record.id,
                &RescheduleRequest {
                    date: new_at,
                    time: "12:00".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.scheduled_at, new_at);
        assert_eq!(moved.status, CleaningStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_tariffs_served_from_builtin_table() {
        let (_dir, backend) = backend();
        let tariffs = backend.list_tariffs().await.unwrap();
        assert_eq!(tariffs.len(), 3);
        let premium = backend.get_tariff(TariffId::Premium).await.unwrap();
        assert_eq!(premium.monthly_price, 9900);
    }
}
