//! SQLite-based persistence for users, events, companies, and chat history.
//!
//! The database lives at `~/.careeros/careeros.db`. It is the working store
//! for all engine state: profiles and counters, the badge catalog and
//! grants, event registrations, group chats, and advisor turn history.
//! Registration and achievement paths run inside `with_transaction` so that
//! capacity checks, counter updates, and experience awards commit as one
//! unit or not at all.

use std::path::PathBuf;

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::catalog;

pub mod types;
pub use types::*;

pub mod chats;
pub mod events;
pub mod users;

/// SQLite connection wrapper for engine state.
///
/// This is intentionally NOT `Clone` or `Sync`. It is held behind a
/// `std::sync::Mutex` in `AppState` so that request handlers can access
/// it safely.
pub struct ProfileDb {
    conn: Connection,
}

impl ProfileDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front, so a competing
    /// writer surfaces as a busy error here rather than at commit time —
    /// which is what serializes two registrations racing for the last
    /// open slot.
    pub fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Self) -> Result<T, E>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(DbError::Sqlite(e)))?;
        match f(self) {
            Ok(val) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|e| E::from(DbError::Sqlite(e)))?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `~/.careeros/careeros.db` and apply
    /// the schema.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::db_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        // Seed the badge catalog — idempotent, safe to run every startup.
        Self::seed_badges(&conn)?;

        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.careeros/careeros.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".careeros").join("careeros.db"))
    }

    /// Insert any catalog badges that are missing from the `badges` table.
    fn seed_badges(conn: &Connection) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        for def in catalog::ACHIEVEMENTS.iter() {
            conn.execute(
                "INSERT OR IGNORE INTO badges (name, title, description, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![def.name, def.title, def.description, now],
            )?;
        }
        Ok(())
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================

#[cfg(test)]
pub mod test_utils {
    use chrono::{Duration, Utc};

    use super::{CompanySize, DbCompany, DbEvent, DbUser, EventType, ProfileDb};

    /// Create a temporary database for testing.
    ///
    /// We leak the `TempDir` so the directory persists for the duration of
    /// the test. Test temp dirs are cleaned up by the OS.
    pub fn test_db() -> ProfileDb {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        ProfileDb::open_at(path).expect("Failed to open test database")
    }

    pub fn sample_user(id: &str, email: &str) -> DbUser {
        let now = Utc::now().to_rfc3339();
        DbUser {
            id: id.to_string(),
            name: format!("User {}", id),
            email: email.to_string(),
            bio: None,
            avatar_url: None,
            linkedin_profile: None,
            interests: Some("rust,career growth".to_string()),
            goals: Some("become a systems engineer".to_string()),
            age: Some(24),
            level: 1,
            experience: 0,
            company_visits: 0,
            webinars_attended: 0,
            chat_count: 0,
            engagement_score: 0.0,
            is_company_admin: false,
            company_id: None,
            created_at: now.clone(),
            last_active: now.clone(),
            updated_at: now,
        }
    }

    pub fn sample_company(id: &str, size: CompanySize) -> DbCompany {
        DbCompany {
            id: id.to_string(),
            name: format!("Company {}", id),
            description: Some("A growing engineering team".to_string()),
            industry: Some("software".to_string()),
            size,
            logo_url: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// An event `days_ahead` days in the future (negative for a past event).
    pub fn sample_event(
        id: &str,
        company_id: &str,
        event_type: EventType,
        days_ahead: i64,
    ) -> DbEvent {
        DbEvent {
            id: id.to_string(),
            title: format!("Event {}", id),
            description: Some("Meet the team".to_string()),
            date: (Utc::now() + Duration::days(days_ahead)).to_rfc3339(),
            duration_minutes: 90,
            max_participants: Some(20),
            level_required: 1,
            reward_points: 50,
            event_type,
            company_id: Some(company_id.to_string()),
            group_chat_id: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_open_creates_tables() {
        let db = test_db();
        let count: i32 = db
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .expect("users table should exist");
        assert_eq!(count, 0);

        let count: i32 = db
            .conn
            .query_row("SELECT COUNT(*) FROM event_participants", [], |row| {
                row.get(0)
            })
            .expect("event_participants table should exist");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_badges_seeded_from_catalog() {
        let db = test_db();
        let count: i32 = db
            .conn
            .query_row("SELECT COUNT(*) FROM badges", [], |row| row.get(0))
            .expect("badges table should exist");
        assert_eq!(count as usize, catalog::ACHIEVEMENTS.len());

        let title: String = db
            .conn
            .query_row(
                "SELECT title FROM badges WHERE name = 'networking_pro'",
                [],
                |row| row.get(0),
            )
            .expect("seeded badge");
        assert_eq!(title, "Networking Pro");
    }

    #[test]
    fn test_reopen_does_not_duplicate_badges() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);

        let _db1 = ProfileDb::open_at(path.clone()).expect("first open");
        let db2 = ProfileDb::open_at(path).expect("second open should not fail");
        let count: i32 = db2
            .conn
            .query_row("SELECT COUNT(*) FROM badges", [], |row| row.get(0))
            .expect("badges");
        assert_eq!(count as usize, catalog::ACHIEVEMENTS.len());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = test_db();
        let result: Result<(), EngineError> = db.with_transaction(|db| {
            db.conn_ref()
                .execute(
                    "INSERT INTO companies (id, name, size, created_at)
                     VALUES ('c1', 'Acme', 'startup', '2026-01-01T00:00:00+00:00')",
                    [],
                )
                .map_err(|e| EngineError::Db(DbError::Sqlite(e)))?;
            Err(EngineError::EventFull)
        });
        assert!(matches!(result, Err(EngineError::EventFull)));

        let count: i32 = db
            .conn
            .query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))
            .expect("companies");
        assert_eq!(count, 0, "rolled-back insert must not persist");
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|db| {
            db.conn_ref().execute(
                "INSERT INTO companies (id, name, size, created_at)
                 VALUES ('c1', 'Acme', 'startup', '2026-01-01T00:00:00+00:00')",
                [],
            )?;
            Ok(())
        });
        assert!(result.is_ok());

        let count: i32 = db
            .conn
            .query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))
            .expect("companies");
        assert_eq!(count, 1);
    }
}
