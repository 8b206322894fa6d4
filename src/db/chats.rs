use rusqlite::{params, Row};

use super::*;
use crate::types::{EngagementDay, TopicCount, TurnExport};

impl ProfileDb {
    // =========================================================================
    // Peer chat messages
    // =========================================================================

    pub fn insert_chat_message(&self, message: &DbChatMessage) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO chat_messages (
                id, content, user_id, group_chat_id, is_ai_chat, is_ai_message, timestamp
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id,
                message.content,
                message.user_id,
                message.group_chat_id,
                message.is_ai_chat as i32,
                message.is_ai_message as i32,
                message.timestamp,
            ],
        )?;
        Ok(())
    }

    /// Messages in a group chat, oldest first.
    pub fn group_chat_messages(&self, chat_id: &str) -> Result<Vec<DbChatMessage>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM chat_messages WHERE group_chat_id = ?1 ORDER BY timestamp ASC",
            Self::MESSAGE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![chat_id], Self::map_message_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// A user's advisor-facing messages, newest first.
    pub fn recent_advisor_messages(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<DbChatMessage>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM chat_messages
             WHERE user_id = ?1 AND is_ai_chat = 1
             ORDER BY timestamp DESC LIMIT ?2",
            Self::MESSAGE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id, limit as i64], Self::map_message_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // =========================================================================
    // Advisor turns
    // =========================================================================

    pub fn insert_advisor_turn(&self, turn: &DbAdvisorTurn) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO advisor_turns (
                id, user_id, message, response, sentiment_score, engagement_score,
                topics, timestamp
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                turn.id,
                turn.user_id,
                turn.message,
                turn.response,
                turn.sentiment_score,
                turn.engagement_score,
                turn.topics,
                turn.timestamp,
            ],
        )?;
        Ok(())
    }

    /// Most recent advisor turns, newest first.
    pub fn recent_turns(&self, user_id: &str, limit: usize) -> Result<Vec<DbAdvisorTurn>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM advisor_turns WHERE user_id = ?1
             ORDER BY timestamp DESC LIMIT ?2",
            Self::TURN_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id, limit as i64], Self::map_turn_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// All advisor turn timestamps, newest first. Feeds the streak walk.
    pub fn turn_timestamps(&self, user_id: &str) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp FROM advisor_turns WHERE user_id = ?1 ORDER BY timestamp DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn turn_count(&self, user_id: &str) -> Result<i64, DbError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM advisor_turns WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// One page of advisor history, newest first. Pages are 1-indexed.
    pub fn advisor_history_page(
        &self,
        user_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<DbAdvisorTurn>, DbError> {
        let offset = page.saturating_sub(1) * per_page;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM advisor_turns WHERE user_id = ?1
             ORDER BY timestamp DESC LIMIT ?2 OFFSET ?3",
            Self::TURN_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![user_id, per_page as i64, offset as i64],
            Self::map_turn_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Average turn engagement per calendar day, newest day first.
    pub fn engagement_by_day(
        &self,
        user_id: &str,
        days: usize,
    ) -> Result<Vec<EngagementDay>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT date(timestamp), AVG(engagement_score)
             FROM advisor_turns WHERE user_id = ?1
             GROUP BY date(timestamp)
             ORDER BY date(timestamp) DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, days as i64], |row| {
            Ok(EngagementDay {
                date: row.get(0)?,
                avg_engagement: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Most frequent non-empty topic strings.
    pub fn top_topics(&self, user_id: &str, limit: usize) -> Result<Vec<TopicCount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT topics, COUNT(*) FROM advisor_turns
             WHERE user_id = ?1 AND topics IS NOT NULL AND topics != ''
             GROUP BY topics
             ORDER BY COUNT(*) DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], |row| {
            Ok(TopicCount {
                topics: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Advisor turns in an optional date window, oldest first, shaped for export.
    pub fn export_turns(
        &self,
        user_id: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Vec<TurnExport>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM advisor_turns
             WHERE user_id = ?1
               AND (?2 IS NULL OR timestamp >= ?2)
               AND (?3 IS NULL OR timestamp <= ?3)
             ORDER BY timestamp ASC",
            Self::TURN_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id, start, end], Self::map_turn_row)?;
        let turns = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::from)?;
        Ok(turns
            .into_iter()
            .map(|t| TurnExport {
                timestamp: t.timestamp,
                message: t.message,
                response: t.response,
                sentiment_score: t.sentiment_score,
                engagement_score: t.engagement_score,
                topics: t.topics,
            })
            .collect())
    }

    // =========================================================================
    // Row mapping
    // =========================================================================

    const MESSAGE_COLUMNS: &'static str =
        "id, content, user_id, group_chat_id, is_ai_chat, is_ai_message, timestamp";

    const TURN_COLUMNS: &'static str =
        "id, user_id, message, response, sentiment_score, engagement_score, topics, timestamp";

    fn map_message_row(row: &Row) -> rusqlite::Result<DbChatMessage> {
        Ok(DbChatMessage {
            id: row.get(0)?,
            content: row.get(1)?,
            user_id: row.get(2)?,
            group_chat_id: row.get(3)?,
            is_ai_chat: row.get::<_, i32>(4)? != 0,
            is_ai_message: row.get::<_, i32>(5)? != 0,
            timestamp: row.get(6)?,
        })
    }

    fn map_turn_row(row: &Row) -> rusqlite::Result<DbAdvisorTurn> {
        Ok(DbAdvisorTurn {
            id: row.get(0)?,
            user_id: row.get(1)?,
            message: row.get(2)?,
            response: row.get(3)?,
            sentiment_score: row.get(4)?,
            engagement_score: row.get(5)?,
            topics: row.get(6)?,
            timestamp: row.get(7)?,
        })
    }
}
