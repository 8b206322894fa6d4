use chrono::Utc;
use rusqlite::{params, Row};

use super::*;

impl ProfileDb {
    // =========================================================================
    // Users
    // =========================================================================

    pub fn create_user(&self, user: &DbUser) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO users (
                id, name, email, bio, avatar_url, linkedin_profile, interests,
                goals, age, level, experience, company_visits, webinars_attended,
                chat_count, engagement_score, is_company_admin, company_id,
                created_at, last_active, updated_at
             ) VALUES (?1, ?2, LOWER(?3), ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                       ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                user.id,
                user.name,
                user.email,
                user.bio,
                user.avatar_url,
                user.linkedin_profile,
                user.interests,
                user.goals,
                user.age,
                user.level,
                user.experience,
                user.company_visits,
                user.webinars_attended,
                user.chat_count,
                user.engagement_score,
                user.is_company_admin as i32,
                user.company_id,
                user.created_at,
                user.last_active,
                user.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<DbUser>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users WHERE id = ?1",
            Self::USER_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![user_id], Self::map_user_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Look up a user by email (case-insensitive).
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<DbUser>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users WHERE email = LOWER(?1)",
            Self::USER_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![email], Self::map_user_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Rewrite experience and its derived level together.
    pub fn set_experience(&self, user_id: &str, experience: i64, level: i64) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE users SET experience = ?2, level = ?3, updated_at = ?4 WHERE id = ?1",
            params![user_id, experience, level, now],
        )?;
        Ok(())
    }

    /// Bump the attendance counter matching the event type.
    pub fn increment_attendance(&self, user_id: &str, event_type: EventType) -> Result<(), DbError> {
        let column = match event_type {
            EventType::CompanyVisit => "company_visits",
            EventType::Webinar => "webinars_attended",
        };
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            &format!(
                "UPDATE users SET {col} = {col} + 1, updated_at = ?2 WHERE id = ?1",
                col = column
            ),
            params![user_id, now],
        )?;
        Ok(())
    }

    /// Record one advisor turn against the user: chat counter, activity
    /// timestamp, and the new running engagement average.
    pub fn record_chat_activity(&self, user_id: &str, engagement: f64) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE users SET chat_count = chat_count + 1, engagement_score = ?2,
                    last_active = ?3, updated_at = ?3
             WHERE id = ?1",
            params![user_id, engagement, now],
        )?;
        Ok(())
    }

    /// Case-insensitive name/email search.
    pub fn search_users(&self, query: &str, limit: usize) -> Result<Vec<DbUser>, DbError> {
        let pattern = format!("%{}%", query.to_lowercase());
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users
             WHERE LOWER(name) LIKE ?1 OR email LIKE ?1
             ORDER BY name LIMIT ?2",
            Self::USER_COLUMNS
        ))?;
        let rows = stmt.query_map(params![pattern, limit as i64], Self::map_user_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Most recently active users, excluding one (usually the caller).
    pub fn active_users(&self, exclude_id: &str, limit: usize) -> Result<Vec<DbUser>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users WHERE id != ?1
             ORDER BY last_active DESC LIMIT ?2",
            Self::USER_COLUMNS
        ))?;
        let rows = stmt.query_map(params![exclude_id, limit as i64], Self::map_user_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // =========================================================================
    // Badges
    // =========================================================================

    pub fn get_badge(&self, name: &str) -> Result<Option<DbBadge>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, title, description, created_at FROM badges WHERE name = ?1",
        )?;
        let mut rows = stmt.query_map(params![name], |row| {
            Ok(DbBadge {
                name: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn has_badge(&self, user_id: &str, badge_name: &str) -> Result<bool, DbError> {
        let held: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM user_badges WHERE user_id = ?1 AND badge_name = ?2)",
            params![user_id, badge_name],
            |row| row.get(0),
        )?;
        Ok(held)
    }

    /// Grant a badge. Set semantics: granting a held badge is a no-op.
    pub fn grant_badge(&self, user_id: &str, badge_name: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO user_badges (user_id, badge_name, awarded_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, badge_name, now],
        )?;
        Ok(())
    }

    pub fn user_badges(&self, user_id: &str) -> Result<Vec<DbBadge>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT b.name, b.title, b.description, b.created_at
             FROM user_badges ub
             JOIN badges b ON b.name = ub.badge_name
             WHERE ub.user_id = ?1
             ORDER BY ub.awarded_at",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(DbBadge {
                name: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn badge_count(&self, user_id: &str) -> Result<i64, DbError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM user_badges WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // =========================================================================
    // Connections (symmetric — both directions written by the service layer)
    // =========================================================================

    /// Insert one direction of a connection edge.
    pub fn add_connection_edge(&self, user_id: &str, other_id: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO user_connections (user_id, connected_user_id, connected_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, other_id, now],
        )?;
        Ok(())
    }

    pub fn are_connected(&self, user_id: &str, other_id: &str) -> Result<bool, DbError> {
        let connected: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM user_connections
                           WHERE user_id = ?1 AND connected_user_id = ?2)",
            params![user_id, other_id],
            |row| row.get(0),
        )?;
        Ok(connected)
    }

    pub fn connection_count(&self, user_id: &str) -> Result<i64, DbError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM user_connections WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn connections_of(&self, user_id: &str) -> Result<Vec<DbUser>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM user_connections uc
             JOIN users u ON u.id = uc.connected_user_id
             WHERE uc.user_id = ?1
             ORDER BY uc.connected_at",
            Self::user_columns_prefixed("u")
        ))?;
        let rows = stmt.query_map(params![user_id], Self::map_user_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // =========================================================================
    // Row mapping
    // =========================================================================

    pub(crate) const USER_COLUMNS: &'static str =
        "id, name, email, bio, avatar_url, linkedin_profile, \
         interests, goals, age, level, experience, company_visits, webinars_attended, \
         chat_count, engagement_score, is_company_admin, company_id, created_at, \
         last_active, updated_at";

    pub(crate) fn user_columns_prefixed(alias: &str) -> String {
        Self::USER_COLUMNS
            .split(", ")
            .map(|c| format!("{}.{}", alias, c.trim()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn map_user_row(row: &Row) -> rusqlite::Result<DbUser> {
        Ok(DbUser {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            bio: row.get(3)?,
            avatar_url: row.get(4)?,
            linkedin_profile: row.get(5)?,
            interests: row.get(6)?,
            goals: row.get(7)?,
            age: row.get(8)?,
            level: row.get(9)?,
            experience: row.get(10)?,
            company_visits: row.get(11)?,
            webinars_attended: row.get(12)?,
            chat_count: row.get(13)?,
            engagement_score: row.get(14)?,
            is_company_admin: row.get::<_, i32>(15)? != 0,
            company_id: row.get(16)?,
            created_at: row.get(17)?,
            last_active: row.get(18)?,
            updated_at: row.get(19)?,
        })
    }
}
