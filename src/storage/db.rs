//! sqlite store behind the thin booking backend.
//!
//! Two tables: `users` (one row per Telegram user) and `cleanings` (one row
//! per visit). Instants are stored as local ISO text, statuses as the wire
//! strings from `backend::types`.

use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Result};
use uuid::Uuid;

use crate::backend::types::{CleaningRecord, CleaningStatus};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A registered user of the booking service.
pub struct StoredUser {
    /// Telegram ID of the user
    pub telegram_id: i64,
    /// Telegram username, when shared
    pub username: Option<String>,
    /// First name from the Telegram profile
    pub first_name: Option<String>,
}

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and ensures the
/// schema is up to date.
pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder().max_size(10).build(manager)?;

    let conn = pool.get()?;
    if let Err(e) = migrate_schema(&conn) {
        log::warn!("Failed to migrate schema: {}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Create missing tables and add columns introduced after the first release.
fn migrate_schema(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
             telegram_id INTEGER PRIMARY KEY,
             username    TEXT,
             first_name  TEXT,
             created_at  TEXT NOT NULL DEFAULT (datetime('now'))
         )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cleanings (
             id           TEXT PRIMARY KEY,
             user_id      INTEGER NOT NULL,
             scheduled_at TEXT NOT NULL,
             status       TEXT NOT NULL DEFAULT 'scheduled',
             created_at   TEXT NOT NULL DEFAULT (datetime('now'))
         )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cleanings_user ON cleanings(user_id, scheduled_at)",
        [],
    )?;

    // first_name arrived after the users table shipped; add it in place
    let mut stmt = conn.prepare("PRAGMA table_info(users)")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    if !columns.contains(&"first_name".to_string()) {
        log::info!("Adding missing column: first_name to users table");
        conn.execute("ALTER TABLE users ADD COLUMN first_name TEXT", [])?;
    }

    Ok(())
}

/// Inserts the user or refreshes their profile fields.
pub fn upsert_user(conn: &rusqlite::Connection, telegram_id: i64, username: Option<&str>, first_name: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT INTO users (telegram_id, username, first_name) VALUES (?1, ?2, ?3)
         ON CONFLICT(telegram_id) DO UPDATE SET username = ?2, first_name = ?3",
        params![telegram_id, username, first_name],
    )?;
    Ok(())
}

pub fn get_user(conn: &rusqlite::Connection, telegram_id: i64) -> Result<Option<StoredUser>> {
    conn.query_row(
        "SELECT telegram_id, username, first_name FROM users WHERE telegram_id = ?1",
        params![telegram_id],
        |row| {
            Ok(StoredUser {
                telegram_id: row.get(0)?,
                username: row.get(1)?,
                first_name: row.get(2)?,
            })
        },
    )
    .optional()
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<CleaningRecord> {
    let id: String = row.get(0)?;
    let scheduled_at: String = row.get(1)?;
    let status: String = row.get(2)?;
    let scheduled_at = NaiveDateTime::parse_from_str(&scheduled_at, DATETIME_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let status = CleaningStatus::parse(&status).unwrap_or(CleaningStatus::Cancelled);
    Ok(CleaningRecord {
        id,
        scheduled_at,
        status,
    })
}

/// Creates a new scheduled cleaning and returns its record.
pub fn insert_cleaning(conn: &rusqlite::Connection, user_id: i64, scheduled_at: NaiveDateTime) -> Result<CleaningRecord> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO cleanings (id, user_id, scheduled_at, status) VALUES (?1, ?2, ?3, 'scheduled')",
        params![id, user_id, scheduled_at.format(DATETIME_FORMAT).to_string()],
    )?;
    Ok(CleaningRecord {
        id,
        scheduled_at,
        status: CleaningStatus::Scheduled,
    })
}

/// All cleanings of a user, ascending by instant, ties by id.
pub fn list_cleanings(conn: &rusqlite::Connection, user_id: i64) -> Result<Vec<CleaningRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, scheduled_at, status FROM cleanings
         WHERE user_id = ?1
         ORDER BY scheduled_at ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![user_id], |row| row_to_record(row))?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

pub fn get_cleaning(conn: &rusqlite::Connection, user_id: i64, id: &str) -> Result<Option<CleaningRecord>> {
    conn.query_row(
        "SELECT id, scheduled_at, status FROM cleanings WHERE user_id = ?1 AND id = ?2",
        params![user_id, id],
        |row| row_to_record(row),
    )
    .optional()
}

/// Sets the status of a cleaning. Returns false when the row is missing.
pub fn update_cleaning_status(
    conn: &rusqlite::Connection,
    user_id: i64,
    id: &str,
    status: CleaningStatus,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE cleanings SET status = ?3 WHERE user_id = ?1 AND id = ?2",
        params![user_id, id, status.as_str()],
    )?;
    Ok(changed > 0)
}

/// Moves a scheduled cleaning to a new instant. Returns false when the row
/// is missing or not in the scheduled state.
pub fn update_cleaning_time(
    conn: &rusqlite::Connection,
    user_id: i64,
    id: &str,
    scheduled_at: NaiveDateTime,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE cleanings SET scheduled_at = ?3 WHERE user_id = ?1 AND id = ?2 AND status = 'scheduled'",
        params![user_id, id, scheduled_at.format(DATETIME_FORMAT).to_string()],
    )?;
    Ok(changed > 0)
}

/// Whether the user already has a scheduled visit on the given calendar
/// date (time-of-day ignored).
pub fn has_scheduled_on(conn: &rusqlite::Connection, user_id: i64, date: NaiveDate) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cleanings
         WHERE user_id = ?1 AND status = 'scheduled' AND date(scheduled_at) = ?2",
        params![user_id, date.format("%Y-%m-%d").to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Seeds demo cleanings for a user: two upcoming, one completed, one
/// cancelled. Used by `chistobot seed` for local development.
pub fn seed_demo_cleanings(conn: &rusqlite::Connection, user_id: i64, now: NaiveDateTime) -> Result<()> {
    use chrono::Duration;

    let demo = [
        (now + Duration::days(3), CleaningStatus::Scheduled),
        (now + Duration::days(8), CleaningStatus::Scheduled),
        (now - Duration::days(2), CleaningStatus::Completed),
        (now - Duration::days(7), CleaningStatus::Cancelled),
    ];
    for (at, status) in demo {
        let record = insert_cleaning(conn, user_id, at)?;
        if status != CleaningStatus::Scheduled {
            update_cleaning_status(conn, user_id, &record.id, status)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;

    fn test_pool() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 9, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_users_roundtrip() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        assert!(get_user(&conn, 42).unwrap().is_none());
        upsert_user(&conn, 42, Some("vasya"), Some("Вася")).unwrap();
        upsert_user(&conn, 42, Some("vasya_new"), Some("Вася")).unwrap();

        let user = get_user(&conn, 42).unwrap().unwrap();
        assert_eq!(user.telegram_id, 42);
        assert_eq!(user.username.as_deref(), Some("vasya_new"));
    }

    #[test]
    fn test_cleanings_lifecycle() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        let record = insert_cleaning(&conn, 7, at(1, 10)).unwrap();
        assert_eq!(record.status, CleaningStatus::Scheduled);

        let listed = list_cleanings(&conn, 7).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, record.id);

        assert!(update_cleaning_status(&conn, 7, &record.id, CleaningStatus::Cancelled).unwrap());
        let fetched = get_cleaning(&conn, 7, &record.id).unwrap().unwrap();
        assert_eq!(fetched.status, CleaningStatus::Cancelled);

        // Cancelled rows refuse a time move
        assert!(!update_cleaning_time(&conn, 7, &record.id, at(2, 11)).unwrap());
    }

    #[test]
    fn test_list_is_sorted_and_scoped_per_user() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        insert_cleaning(&conn, 1, at(5, 10)).unwrap();
        insert_cleaning(&conn, 1, at(2, 10)).unwrap();
        insert_cleaning(&conn, 2, at(1, 10)).unwrap();

        let mine = list_cleanings(&conn, 1).unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine[0].scheduled_at < mine[1].scheduled_at);
    }

    #[test]
    fn test_has_scheduled_on_compares_date_component_only() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        let record = insert_cleaning(&conn, 3, at(10, 9)).unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 9, 10).unwrap();

        assert!(has_scheduled_on(&conn, 3, day).unwrap());
        assert!(!has_scheduled_on(&conn, 3, day + Duration::days(1)).unwrap());

        // Cancelled visits free the date up again
        update_cleaning_status(&conn, 3, &record.id, CleaningStatus::Cancelled).unwrap();
        assert!(!has_scheduled_on(&conn, 3, day).unwrap());
    }

    #[test]
    fn test_seed_demo_cleanings_shape() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        seed_demo_cleanings(&conn, 9, at(15, 12)).unwrap();
        let records = list_cleanings(&conn, 9).unwrap();
        assert_eq!(records.len(), 4);
        let scheduled = records.iter().filter(|r| r.status == CleaningStatus::Scheduled).count();
        assert_eq!(scheduled, 2);
    }
}
