// Progress service — leveling, achievements, streaks, and engagement.
// All rules read counters the event and advisor paths maintain; experience
// awards recompute the derived level in the same write.

use chrono::{DateTime, NaiveDate};

use crate::catalog::{self, LEVEL_THRESHOLDS, MAX_LEVEL};
use crate::db::{DbBadge, ProfileDb};
use crate::error::EngineError;
use crate::types::{ActivitySnapshot, LevelChange, ProgressSummary};

/// Minimum streak length for the `chat_streak` achievement.
const STREAK_ACHIEVEMENT_DAYS: u32 = 5;

/// Connection count for the `networking_pro` achievement.
const NETWORKING_ACHIEVEMENT_CONNECTIONS: i64 = 5;

/// Level for a given experience total: the highest threshold not above it.
/// Experience below the level-2 threshold is level 1; level 10 is terminal.
pub fn calculate_level(experience: i64) -> i64 {
    for (level, threshold) in LEVEL_THRESHOLDS.iter().rev() {
        if experience >= *threshold {
            return *level;
        }
    }
    1
}

/// Experience still needed for the next level, or `None` at max level.
pub fn experience_for_next_level(experience: i64) -> Option<i64> {
    let level = calculate_level(experience);
    if level >= MAX_LEVEL {
        return None;
    }
    Some(threshold_for(level + 1) - experience)
}

fn threshold_for(level: i64) -> i64 {
    LEVEL_THRESHOLDS[(level - 1) as usize].1
}

/// Add experience points and rewrite the derived level.
///
/// Negative awards are a caller bug, not a runtime scenario. Callers that
/// need atomicity with surrounding writes run this inside
/// `with_transaction`; the registration, advisor, and achievement paths
/// all do.
pub fn add_experience(
    db: &ProfileDb,
    user_id: &str,
    points: i64,
) -> Result<LevelChange, EngineError> {
    assert!(points >= 0, "experience points must be non-negative");

    let user = db
        .get_user(user_id)?
        .ok_or(EngineError::NotFound("User"))?;
    let experience = user.experience + points;
    let level = calculate_level(experience);
    db.set_experience(user_id, experience, level)?;

    if level > user.level {
        log::info!("User {} leveled up: {} -> {}", user_id, user.level, level);
    }

    Ok(LevelChange {
        previous: user.level,
        current: level,
    })
}

/// Evaluate the achievement predicates in catalog order and grant any badge
/// not already held, awarding its points. Returns only the badges granted
/// by this call; re-running with no state change returns nothing.
///
/// Runs as one transaction: a grant never commits without its points.
pub fn check_achievements(db: &ProfileDb, user_id: &str) -> Result<Vec<DbBadge>, EngineError> {
    db.with_transaction(|db| {
        let user = db
            .get_user(user_id)?
            .ok_or(EngineError::NotFound("User"))?;

        let total_chats = db.turn_count(user_id)?;
        let streak = calculate_chat_streak(db, user_id)?;
        let connections = db.connection_count(user_id)?;

        let unlocked = [
            ("first_chat", total_chats > 0),
            ("chat_streak", streak >= STREAK_ACHIEVEMENT_DAYS),
            ("company_visit", user.company_visits > 0),
            ("webinar_attendee", user.webinars_attended > 0),
            ("networking_pro", connections >= NETWORKING_ACHIEVEMENT_CONNECTIONS),
        ];

        let mut new_badges = Vec::new();
        for (name, earned) in unlocked {
            if !earned || db.has_badge(user_id, name)? {
                continue;
            }
            let def = catalog::achievement(name)
                .unwrap_or_else(|| panic!("achievement catalog is missing '{}'", name));
            let badge = db
                .get_badge(name)?
                .unwrap_or_else(|| panic!("badge table was not seeded with '{}'", name));

            db.grant_badge(user_id, name)?;
            add_experience(db, user_id, def.points)?;
            log::info!("User {} unlocked achievement '{}'", user_id, name);
            new_badges.push(badge);
        }

        Ok(new_badges)
    })
}

/// Current chat streak: consecutive calendar days with at least one advisor
/// turn, walking backward from the most recent. 0 without history.
pub fn calculate_chat_streak(db: &ProfileDb, user_id: &str) -> Result<u32, EngineError> {
    let timestamps = db.turn_timestamps(user_id)?;
    let dates: Vec<NaiveDate> = timestamps
        .iter()
        .filter_map(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.date_naive())
        .collect();
    Ok(streak_from_dates(&dates))
}

/// Streak walk over calendar dates sorted newest first. A one-day gap
/// extends the streak, a larger gap ends it, and a same-day repeat is
/// skipped so it neither double counts nor breaks the run.
pub fn streak_from_dates(dates: &[NaiveDate]) -> u32 {
    let mut streak = 0u32;
    let mut tracked: Option<NaiveDate> = None;

    for &date in dates {
        match tracked {
            None => {
                streak = 1;
                tracked = Some(date);
            }
            Some(prev) => {
                let gap = (prev - date).num_days();
                if gap == 1 {
                    streak += 1;
                    tracked = Some(date);
                } else if gap > 1 {
                    break;
                }
            }
        }
    }

    streak
}

/// Normalized 0–100 engagement score over an activity snapshot:
/// 2/chat, 10/visit, 8/webinar, 5/streak-day, 15/level, 20/badge,
/// divided by 5 and rounded up.
pub fn engagement_score(snapshot: &ActivitySnapshot) -> u32 {
    let raw = snapshot.total_chats * 2
        + snapshot.company_visits * 10
        + snapshot.webinars_attended * 8
        + snapshot.streak_days as i64 * 5
        + snapshot.level * 15
        + snapshot.badges * 20;

    // Integer ceil-divide; raw is non-negative by construction.
    ((raw + 4) / 5).min(100) as u32
}

/// Assemble the counters feeding the engagement score.
fn activity_snapshot(db: &ProfileDb, user_id: &str) -> Result<ActivitySnapshot, EngineError> {
    let user = db
        .get_user(user_id)?
        .ok_or(EngineError::NotFound("User"))?;
    Ok(ActivitySnapshot {
        total_chats: db.turn_count(user_id)?,
        company_visits: user.company_visits,
        webinars_attended: user.webinars_attended,
        streak_days: calculate_chat_streak(db, user_id)?,
        level: user.level,
        badges: db.badge_count(user_id)?,
    })
}

/// Engagement score for a stored user.
pub fn get_engagement_score(db: &ProfileDb, user_id: &str) -> Result<u32, EngineError> {
    Ok(engagement_score(&activity_snapshot(db, user_id)?))
}

/// Dashboard snapshot of a user's progression.
pub fn progress_summary(db: &ProfileDb, user_id: &str) -> Result<ProgressSummary, EngineError> {
    let user = db
        .get_user(user_id)?
        .ok_or(EngineError::NotFound("User"))?;

    let next_level_exp = experience_for_next_level(user.experience);
    let progress_percentage = match next_level_exp {
        None => 0.0,
        Some(_) => {
            let lower = threshold_for(user.level);
            let upper = threshold_for(user.level + 1);
            (user.experience - lower) as f64 / (upper - lower) as f64 * 100.0
        }
    };

    Ok(ProgressSummary {
        level: user.level,
        experience: user.experience,
        next_level_exp,
        progress_percentage,
        badges: db.badge_count(user_id)?,
        company_visits: user.company_visits,
        webinars_attended: user.webinars_attended,
        chat_streak: calculate_chat_streak(db, user_id)?,
        total_chats: db.turn_count(user_id)?,
        connections: db.connection_count(user_id)?,
    })
}
