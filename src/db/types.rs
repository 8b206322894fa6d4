//! Shared type definitions for the database layer.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::helpers::interest_tags;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

impl DbError {
    /// True when the underlying SQLite error is a busy/locked conflict —
    /// the signal that another writer held the database during our
    /// transaction and the unit of work can be retried.
    pub fn is_busy(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Company size class, stored as TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanySize {
    Startup,
    Medium,
    Enterprise,
}

impl CompanySize {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanySize::Startup => "startup",
            CompanySize::Medium => "medium",
            CompanySize::Enterprise => "enterprise",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "startup" => Some(CompanySize::Startup),
            "medium" => Some(CompanySize::Medium),
            "enterprise" => Some(CompanySize::Enterprise),
            _ => None,
        }
    }
}

/// Event type, stored as TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CompanyVisit,
    Webinar,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CompanyVisit => "company_visit",
            EventType::Webinar => "webinar",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "company_visit" => Some(EventType::CompanyVisit),
            "webinar" => Some(EventType::Webinar),
            _ => None,
        }
    }
}

/// A row from the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub linkedin_profile: Option<String>,
    /// Comma-separated interest tags.
    pub interests: Option<String>,
    pub goals: Option<String>,
    pub age: Option<i64>,
    /// Derived from `experience`; rewritten on every experience change.
    pub level: i64,
    pub experience: i64,
    pub company_visits: i64,
    pub webinars_attended: i64,
    pub chat_count: i64,
    /// Running 0.0–1.0 average of per-turn advisor engagement.
    pub engagement_score: f64,
    pub is_company_admin: bool,
    pub company_id: Option<String>,
    pub created_at: String,
    pub last_active: String,
    pub updated_at: String,
}

impl DbUser {
    /// Lowercased, trimmed interest tags as a set.
    pub fn interest_tags(&self) -> HashSet<String> {
        self.interests
            .as_deref()
            .map(interest_tags)
            .unwrap_or_default()
    }

    /// Webinars open up at level 2.
    pub fn can_attend_webinars(&self) -> bool {
        self.level >= 2
    }

    /// Company size class to recommend for this user's level.
    pub fn recommended_company_size(&self) -> CompanySize {
        if self.level <= 2 {
            CompanySize::Startup
        } else if self.level <= 5 {
            CompanySize::Medium
        } else {
            CompanySize::Enterprise
        }
    }
}

/// A row from the `badges` catalog table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbBadge {
    pub name: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
}

/// A row from the `companies` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCompany {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub size: CompanySize,
    pub logo_url: Option<String>,
    pub created_at: String,
}

/// A row from the `events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbEvent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// RFC 3339 UTC timestamp.
    pub date: String,
    pub duration_minutes: i64,
    /// `None` means uncapped.
    pub max_participants: Option<i64>,
    pub level_required: i64,
    pub reward_points: i64,
    pub event_type: EventType,
    pub company_id: Option<String>,
    /// Set lazily when the first participant registers.
    pub group_chat_id: Option<String>,
    pub created_at: String,
}

/// A row from the `group_chats` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbGroupChat {
    pub id: String,
    pub name: String,
    pub event_id: Option<String>,
    pub created_at: String,
}

/// A row from the `chat_messages` table (peer and advisor-facing messages).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbChatMessage {
    pub id: String,
    pub content: String,
    pub user_id: String,
    pub group_chat_id: Option<String>,
    pub is_ai_chat: bool,
    pub is_ai_message: bool,
    pub timestamp: String,
}

/// A row from the `advisor_turns` table: one message/response exchange
/// with the AI career advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAdvisorTurn {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub response: String,
    /// Placeholder — always 0.0, kept for schema compatibility. Nothing
    /// reads this value.
    pub sentiment_score: f64,
    pub engagement_score: f64,
    /// Comma-joined topic tags, at most three.
    pub topics: Option<String>,
    pub timestamp: String,
}
