// Peer chat service — posting into event group chats and the chat
// dashboard queries. Message broadcast (socket fan-out) belongs to the
// request layer; this service only validates access and persists.

use chrono::Utc;
use uuid::Uuid;

use crate::db::{DbChatMessage, DbGroupChat, ProfileDb};
use crate::error::EngineError;

/// Post a message into an event's group chat. The author must be a
/// registered participant and the chat must already exist (it is created
/// on first registration).
pub fn post_event_message(
    db: &ProfileDb,
    user_id: &str,
    event_id: &str,
    content: &str,
) -> Result<DbChatMessage, EngineError> {
    if content.trim().is_empty() {
        return Err(EngineError::EmptyMessage);
    }

    let event = db
        .get_event(event_id)?
        .ok_or(EngineError::NotFound("Event"))?;
    let chat_id = event
        .group_chat_id
        .ok_or(EngineError::NotFound("Group chat"))?;

    if !db.is_participant(event_id, user_id)? {
        return Err(EngineError::NotFound("Registration"));
    }

    let message = DbChatMessage {
        id: Uuid::new_v4().to_string(),
        content: content.to_string(),
        user_id: user_id.to_string(),
        group_chat_id: Some(chat_id),
        is_ai_chat: false,
        is_ai_message: false,
        timestamp: Utc::now().to_rfc3339(),
    };
    db.insert_chat_message(&message)?;
    Ok(message)
}

/// Messages in a group chat, oldest first. Only members may read.
pub fn group_chat_messages(
    db: &ProfileDb,
    user_id: &str,
    chat_id: &str,
) -> Result<Vec<DbChatMessage>, EngineError> {
    db.get_group_chat(chat_id)?
        .ok_or(EngineError::NotFound("Group chat"))?;
    if !db.is_chat_member(chat_id, user_id)? {
        return Err(EngineError::NotFound("Membership"));
    }
    db.group_chat_messages(chat_id).map_err(EngineError::from)
}

/// Group chats the user belongs to, for the chat dashboard.
pub fn user_group_chats(db: &ProfileDb, user_id: &str) -> Result<Vec<DbGroupChat>, EngineError> {
    db.chats_for_user(user_id).map_err(EngineError::from)
}

/// A user's most recent advisor-facing messages, newest first, for the
/// chat dashboard.
pub fn recent_advisor_messages(
    db: &ProfileDb,
    user_id: &str,
    limit: usize,
) -> Result<Vec<DbChatMessage>, EngineError> {
    db.recent_advisor_messages(user_id, limit)
        .map_err(EngineError::from)
}
