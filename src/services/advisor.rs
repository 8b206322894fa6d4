// Advisor service — one request/response turn with the career advisor.
//
// A successful turn persists the exchange, bumps the user's chat counters
// and running engagement average, and awards experience, all in one
// transaction. A delegate failure degrades to a fixed fallback response
// with no persistence at all.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::advisor::{engagement, prompts, TextGenerator};
use crate::db::{DbAdvisorTurn, DbChatMessage, ProfileDb};
use crate::error::EngineError;
use crate::services::progress;
use crate::types::AdvisorReply;

/// Shown when the delegate fails or times out.
pub const FALLBACK_RESPONSE: &str = "I apologize, but I'm having trouble processing that right \
     now. Could you try rephrasing your message?";

/// Every Nth turn (1-indexed) gets an activity suggestion appended.
const ACTIVITY_TURN_INTERVAL: i64 = 5;

/// Weight of the prior running average when folding in a new turn score.
const ENGAGEMENT_DECAY: f64 = 0.8;

/// Experience multiplier on the per-turn engagement score.
const POINTS_PER_TURN_SCORE: f64 = 10.0;

/// Orchestrates advisor turns against an explicit text-generation delegate.
pub struct AdvisorEngine {
    generator: Arc<dyn TextGenerator>,
}

impl AdvisorEngine {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Run one advisor turn for a user.
    ///
    /// Blank messages are rejected before anything else happens. On delegate
    /// failure the fallback text is returned with `persisted: false` and no
    /// state changes.
    pub async fn submit_turn(
        &self,
        db: &ProfileDb,
        user_id: &str,
        message: &str,
    ) -> Result<AdvisorReply, EngineError> {
        if message.trim().is_empty() {
            return Err(EngineError::EmptyMessage);
        }

        let user = db
            .get_user(user_id)?
            .ok_or(EngineError::NotFound("User"))?;
        let recent = db.recent_turns(user_id, 5)?;
        let request = prompts::build_request(&user, &recent, message);

        let response = match self.generator.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Advisor delegate failed for user {}: {}", user_id, e);
                return Ok(AdvisorReply {
                    text: FALLBACK_RESPONSE.to_string(),
                    points_earned: 0,
                    leveled_up: false,
                    level: user.level,
                    engagement_score: 0.0,
                    topics: Vec::new(),
                    persisted: false,
                });
            }
        };

        let turn_score = engagement::turn_engagement_score(message);
        let topics = engagement::extract_topics(&format!("{} {}", message, response));
        let points = (turn_score * POINTS_PER_TURN_SCORE).floor() as i64;
        let new_average =
            ENGAGEMENT_DECAY * user.engagement_score + (1.0 - ENGAGEMENT_DECAY) * turn_score;

        let (level, turn_count) = db.with_transaction(|db| {
            let now = Utc::now().to_rfc3339();
            let turn = DbAdvisorTurn {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                message: message.to_string(),
                response: response.clone(),
                // Sentiment analysis is not implemented; the column stays 0.
                sentiment_score: 0.0,
                engagement_score: turn_score,
                topics: if topics.is_empty() {
                    None
                } else {
                    Some(topics.join(","))
                },
                timestamp: now.clone(),
            };
            db.insert_advisor_turn(&turn)?;

            // Mirror the exchange into chat_messages for the chat dashboard.
            db.insert_chat_message(&advisor_message(user_id, message, false, &now))?;
            db.insert_chat_message(&advisor_message(user_id, &response, true, &now))?;

            db.record_chat_activity(user_id, new_average)?;
            let level = progress::add_experience(db, user_id, points)?;
            let turn_count = db.turn_count(user_id)?;
            Ok::<_, EngineError>((level, turn_count))
        })?;

        let mut text = response;
        if level.leveled_up() {
            text.push_str(&format!(
                "\n\n🎉 Congratulations! You've reached level {}!",
                level.current
            ));
        }
        if turn_count % ACTIVITY_TURN_INTERVAL == 0 {
            text.push_str("\n\n");
            text.push_str(engagement::suggest_activity());
        }

        Ok(AdvisorReply {
            text,
            points_earned: points,
            leveled_up: level.leveled_up(),
            level: level.current,
            engagement_score: turn_score,
            topics,
            persisted: true,
        })
    }

    /// A random interactive activity prompt, independent of any turn.
    pub fn suggest_activity(&self) -> &'static str {
        engagement::suggest_activity()
    }
}

fn advisor_message(user_id: &str, content: &str, is_ai: bool, timestamp: &str) -> DbChatMessage {
    DbChatMessage {
        id: Uuid::new_v4().to_string(),
        content: content.to_string(),
        user_id: user_id.to_string(),
        group_chat_id: None,
        is_ai_chat: true,
        is_ai_message: is_ai,
        timestamp: timestamp.to_string(),
    }
}
