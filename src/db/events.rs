use chrono::Utc;
use rusqlite::{params, Row};

use super::*;

impl ProfileDb {
    // =========================================================================
    // Companies
    // =========================================================================

    pub fn insert_company(&self, company: &DbCompany) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO companies (id, name, description, industry, size, logo_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                company.id,
                company.name,
                company.description,
                company.industry,
                company.size.as_str(),
                company.logo_url,
                company.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_company(&self, company_id: &str) -> Result<Option<DbCompany>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM companies WHERE id = ?1",
            Self::COMPANY_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![company_id], Self::map_company_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Size-matched candidate companies in insertion order.
    pub fn companies_by_size(
        &self,
        size: CompanySize,
        limit: usize,
    ) -> Result<Vec<DbCompany>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM companies WHERE size = ?1 ORDER BY rowid LIMIT ?2",
            Self::COMPANY_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![size.as_str(), limit as i64],
            Self::map_company_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn insert_event(&self, event: &DbEvent) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO events (
                id, title, description, date, duration_minutes, max_participants,
                level_required, reward_points, event_type, company_id, group_chat_id,
                created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                event.id,
                event.title,
                event.description,
                event.date,
                event.duration_minutes,
                event.max_participants,
                event.level_required,
                event.reward_points,
                event.event_type.as_str(),
                event.company_id,
                event.group_chat_id,
                event.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_event(&self, event_id: &str) -> Result<Option<DbEvent>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM events WHERE id = ?1",
            Self::EVENT_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![event_id], Self::map_event_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Upcoming, level-gated events whose owning company matches the size
    /// class, soonest first.
    pub fn upcoming_events_for(
        &self,
        now: &str,
        level: i64,
        size: CompanySize,
        limit: usize,
    ) -> Result<Vec<DbEvent>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM events e
             JOIN companies c ON c.id = e.company_id
             WHERE e.date > ?1 AND e.level_required <= ?2 AND c.size = ?3
             ORDER BY e.date ASC LIMIT ?4",
            Self::event_columns_prefixed("e")
        ))?;
        let rows = stmt.query_map(
            params![now, level, size.as_str(), limit as i64],
            Self::map_event_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Upcoming webinars open at the given level, date ascending.
    pub fn upcoming_webinars(&self, now: &str, level: i64) -> Result<Vec<DbEvent>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM events
             WHERE event_type = 'webinar' AND date > ?1 AND level_required <= ?2
             ORDER BY date ASC",
            Self::EVENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![now, level], Self::map_event_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// All upcoming events, soonest first.
    pub fn upcoming_events(&self, now: &str, limit: usize) -> Result<Vec<DbEvent>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM events WHERE date > ?1 ORDER BY date ASC LIMIT ?2",
            Self::EVENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![now, limit as i64], Self::map_event_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Case-insensitive title/description search.
    pub fn search_events(&self, query: &str, limit: usize) -> Result<Vec<DbEvent>, DbError> {
        let pattern = format!("%{}%", query.to_lowercase());
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM events
             WHERE LOWER(title) LIKE ?1 OR LOWER(COALESCE(description, '')) LIKE ?1
             ORDER BY date ASC LIMIT ?2",
            Self::EVENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![pattern, limit as i64], Self::map_event_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Events a user is registered for, partitioned by whether they are
    /// still upcoming. Upcoming sorts soonest first, past sorts most recent
    /// first.
    pub fn registered_events(
        &self,
        user_id: &str,
        now: &str,
        upcoming: bool,
    ) -> Result<Vec<DbEvent>, DbError> {
        let (cmp, order) = if upcoming {
            (">=", "ASC")
        } else {
            ("<", "DESC")
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM events e
             JOIN event_participants ep ON ep.event_id = e.id
             WHERE ep.user_id = ?1 AND e.date {} ?2
             ORDER BY e.date {}",
            Self::event_columns_prefixed("e"),
            cmp,
            order
        ))?;
        let rows = stmt.query_map(params![user_id, now], Self::map_event_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // =========================================================================
    // Participants
    // =========================================================================

    pub fn is_participant(&self, event_id: &str, user_id: &str) -> Result<bool, DbError> {
        let registered: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM event_participants
                           WHERE event_id = ?1 AND user_id = ?2)",
            params![event_id, user_id],
            |row| row.get(0),
        )?;
        Ok(registered)
    }

    pub fn participant_count(&self, event_id: &str) -> Result<i64, DbError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_participants WHERE event_id = ?1",
            params![event_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn add_participant(&self, event_id: &str, user_id: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO event_participants (event_id, user_id, registered_at)
             VALUES (?1, ?2, ?3)",
            params![event_id, user_id, now],
        )?;
        Ok(())
    }

    pub fn remove_participant(&self, event_id: &str, user_id: &str) -> Result<(), DbError> {
        self.conn.execute(
            "DELETE FROM event_participants WHERE event_id = ?1 AND user_id = ?2",
            params![event_id, user_id],
        )?;
        Ok(())
    }

    /// Other participants of an event, registration order, excluding one user.
    pub fn other_participants(
        &self,
        event_id: &str,
        exclude_user: &str,
    ) -> Result<Vec<DbUser>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM event_participants ep
             JOIN users u ON u.id = ep.user_id
             WHERE ep.event_id = ?1 AND ep.user_id != ?2
             ORDER BY ep.registered_at",
            Self::user_columns_prefixed("u")
        ))?;
        let rows = stmt.query_map(params![event_id, exclude_user], Self::map_user_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // =========================================================================
    // Group chats
    // =========================================================================

    pub fn insert_group_chat(&self, chat: &DbGroupChat) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO group_chats (id, name, event_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![chat.id, chat.name, chat.event_id, chat.created_at],
        )?;
        Ok(())
    }

    pub fn get_group_chat(&self, chat_id: &str) -> Result<Option<DbGroupChat>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, event_id, created_at FROM group_chats WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![chat_id], Self::map_group_chat_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Point an event at its lazily created group chat.
    pub fn link_event_chat(&self, event_id: &str, chat_id: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE events SET group_chat_id = ?2 WHERE id = ?1",
            params![event_id, chat_id],
        )?;
        Ok(())
    }

    pub fn is_chat_member(&self, chat_id: &str, user_id: &str) -> Result<bool, DbError> {
        let member: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM group_chat_members
                           WHERE chat_id = ?1 AND user_id = ?2)",
            params![chat_id, user_id],
            |row| row.get(0),
        )?;
        Ok(member)
    }

    pub fn add_chat_member(&self, chat_id: &str, user_id: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO group_chat_members (chat_id, user_id, joined_at)
             VALUES (?1, ?2, ?3)",
            params![chat_id, user_id, now],
        )?;
        Ok(())
    }

    pub fn remove_chat_member(&self, chat_id: &str, user_id: &str) -> Result<(), DbError> {
        self.conn.execute(
            "DELETE FROM group_chat_members WHERE chat_id = ?1 AND user_id = ?2",
            params![chat_id, user_id],
        )?;
        Ok(())
    }

    /// Group chats the user belongs to, join order.
    pub fn chats_for_user(&self, user_id: &str) -> Result<Vec<DbGroupChat>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT gc.id, gc.name, gc.event_id, gc.created_at
             FROM group_chat_members gcm
             JOIN group_chats gc ON gc.id = gcm.chat_id
             WHERE gcm.user_id = ?1
             ORDER BY gcm.joined_at",
        )?;
        let rows = stmt.query_map(params![user_id], Self::map_group_chat_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // =========================================================================
    // Row mapping
    // =========================================================================

    const COMPANY_COLUMNS: &'static str =
        "id, name, description, industry, size, logo_url, created_at";

    const EVENT_COLUMNS: &'static str =
        "id, title, description, date, duration_minutes, max_participants, \
         level_required, reward_points, event_type, company_id, group_chat_id, created_at";

    fn event_columns_prefixed(alias: &str) -> String {
        Self::EVENT_COLUMNS
            .split(", ")
            .map(|c| format!("{}.{}", alias, c.trim()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn map_company_row(row: &Row) -> rusqlite::Result<DbCompany> {
        let raw_size: String = row.get(4)?;
        let size = CompanySize::parse(&raw_size).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown company size: {}", raw_size).into(),
            )
        })?;
        Ok(DbCompany {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            industry: row.get(3)?,
            size,
            logo_url: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn map_event_row(row: &Row) -> rusqlite::Result<DbEvent> {
        let raw_type: String = row.get(8)?;
        let event_type = EventType::parse(&raw_type).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Text,
                format!("unknown event type: {}", raw_type).into(),
            )
        })?;
        Ok(DbEvent {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            date: row.get(3)?,
            duration_minutes: row.get(4)?,
            max_participants: row.get(5)?,
            level_required: row.get(6)?,
            reward_points: row.get(7)?,
            event_type,
            company_id: row.get(9)?,
            group_chat_id: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    fn map_group_chat_row(row: &Row) -> rusqlite::Result<DbGroupChat> {
        Ok(DbGroupChat {
            id: row.get(0)?,
            name: row.get(1)?,
            event_id: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{sample_company, sample_event, sample_user, test_db};
    use super::*;

    #[test]
    fn test_event_round_trip() {
        let db = test_db();
        db.insert_company(&sample_company("c1", CompanySize::Startup))
            .expect("company");
        db.insert_event(&sample_event("e1", "c1", EventType::Webinar, 3))
            .expect("event");

        let event = db.get_event("e1").expect("query").expect("present");
        assert_eq!(event.event_type, EventType::Webinar);
        assert_eq!(event.max_participants, Some(20));
        assert!(db.get_event("missing").expect("query").is_none());
    }

    #[test]
    fn test_upcoming_events_filtering() {
        let db = test_db();
        db.insert_company(&sample_company("c1", CompanySize::Startup))
            .expect("company");
        db.insert_company(&sample_company("c2", CompanySize::Enterprise))
            .expect("company");

        // Past event, wrong-size company, level-gated event, and one match.
        db.insert_event(&sample_event("past", "c1", EventType::CompanyVisit, -1))
            .expect("event");
        db.insert_event(&sample_event("big", "c2", EventType::CompanyVisit, 2))
            .expect("event");
        let mut gated = sample_event("gated", "c1", EventType::CompanyVisit, 2);
        gated.level_required = 5;
        db.insert_event(&gated).expect("event");
        db.insert_event(&sample_event("match", "c1", EventType::CompanyVisit, 5))
            .expect("event");

        let now = Utc::now().to_rfc3339();
        let events = db
            .upcoming_events_for(&now, 1, CompanySize::Startup, 5)
            .expect("query");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "match");
    }

    #[test]
    fn test_upcoming_events_ordered_by_date() {
        let db = test_db();
        db.insert_company(&sample_company("c1", CompanySize::Startup))
            .expect("company");
        db.insert_event(&sample_event("later", "c1", EventType::CompanyVisit, 9))
            .expect("event");
        db.insert_event(&sample_event("sooner", "c1", EventType::CompanyVisit, 2))
            .expect("event");

        let now = Utc::now().to_rfc3339();
        let events = db
            .upcoming_events_for(&now, 1, CompanySize::Startup, 5)
            .expect("query");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "sooner");
        assert_eq!(events[1].id, "later");
    }

    #[test]
    fn test_participants_and_counts() {
        let db = test_db();
        db.create_user(&sample_user("u1", "a@x.com")).expect("user");
        db.create_user(&sample_user("u2", "b@x.com")).expect("user");
        db.insert_company(&sample_company("c1", CompanySize::Startup))
            .expect("company");
        db.insert_event(&sample_event("e1", "c1", EventType::CompanyVisit, 3))
            .expect("event");

        db.add_participant("e1", "u1").expect("register");
        db.add_participant("e1", "u2").expect("register");

        assert!(db.is_participant("e1", "u1").expect("check"));
        assert_eq!(db.participant_count("e1").expect("count"), 2);

        let others = db.other_participants("e1", "u1").expect("others");
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].id, "u2");

        db.remove_participant("e1", "u2").expect("remove");
        assert_eq!(db.participant_count("e1").expect("count"), 1);
    }

    #[test]
    fn test_group_chat_linking_and_membership() {
        let db = test_db();
        db.insert_company(&sample_company("c1", CompanySize::Startup))
            .expect("company");
        db.insert_event(&sample_event("e1", "c1", EventType::CompanyVisit, 3))
            .expect("event");

        let chat = DbGroupChat {
            id: "gc1".to_string(),
            name: "Event Chat: Event e1".to_string(),
            event_id: Some("e1".to_string()),
            created_at: Utc::now().to_rfc3339(),
        };
        db.insert_group_chat(&chat).expect("chat");
        db.link_event_chat("e1", "gc1").expect("link");

        let event = db.get_event("e1").expect("query").expect("present");
        assert_eq!(event.group_chat_id.as_deref(), Some("gc1"));

        db.add_chat_member("gc1", "u1").expect("join");
        db.add_chat_member("gc1", "u1").expect("rejoin is no-op");
        assert!(db.is_chat_member("gc1", "u1").expect("check"));
        assert_eq!(db.chats_for_user("u1").expect("chats").len(), 1);
    }

    #[test]
    fn test_registered_events_partition() {
        let db = test_db();
        db.create_user(&sample_user("u1", "a@x.com")).expect("user");
        db.insert_company(&sample_company("c1", CompanySize::Startup))
            .expect("company");
        db.insert_event(&sample_event("future", "c1", EventType::CompanyVisit, 4))
            .expect("event");
        db.insert_event(&sample_event("past", "c1", EventType::CompanyVisit, -4))
            .expect("event");
        db.add_participant("future", "u1").expect("register");
        db.add_participant("past", "u1").expect("register");

        let now = Utc::now().to_rfc3339();
        let upcoming = db.registered_events("u1", &now, true).expect("upcoming");
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, "future");

        let past = db.registered_events("u1", &now, false).expect("past");
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].id, "past");
    }

    #[test]
    fn test_search_events() {
        let db = test_db();
        db.insert_company(&sample_company("c1", CompanySize::Startup))
            .expect("company");
        let mut e = sample_event("e1", "c1", EventType::Webinar, 3);
        e.title = "Intro to Fintech Careers".to_string();
        db.insert_event(&e).expect("event");

        let hits = db.search_events("fintech", 10).expect("search");
        assert_eq!(hits.len(), 1);
        assert!(db.search_events("robotics", 10).expect("search").is_empty());
    }
}
