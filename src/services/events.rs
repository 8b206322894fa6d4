// Event service — recommendations, capacity- and level-gated registration,
// buddy matching, and event summaries.
//
// Registration runs as a single transaction: the capacity check, the
// participant insert, the lazy group-chat creation, the attendance counter,
// and the experience award commit together or not at all. A busy conflict
// from a competing writer is retried once before surfacing.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{DbCompany, DbEvent, DbGroupChat, DbUser, EventType, ProfileDb};
use crate::error::EngineError;
use crate::helpers::{overlap_count, text_tokens};
use crate::services::progress;
use crate::types::{EventSummary, RegistrationReceipt};

/// Recommended events cap.
const RECOMMENDED_EVENTS_LIMIT: usize = 5;

/// Company recommendation candidate pool and result cap.
const COMPANY_CANDIDATE_LIMIT: usize = 10;
const COMPANY_RESULT_LIMIT: usize = 5;

/// Default buddy-matching cap.
pub const DEFAULT_BUDDY_LIMIT: usize = 3;

/// Upcoming events matching the user's level and recommended company size,
/// soonest first, at most five.
pub fn recommended_events(db: &ProfileDb, user: &DbUser) -> Result<Vec<DbEvent>, EngineError> {
    let now = Utc::now().to_rfc3339();
    db.upcoming_events_for(
        &now,
        user.level,
        user.recommended_company_size(),
        RECOMMENDED_EVENTS_LIMIT,
    )
    .map_err(EngineError::from)
}

/// Upcoming webinars open at the user's level. Locked entirely below
/// level 2.
pub fn available_webinars(db: &ProfileDb, user: &DbUser) -> Result<Vec<DbEvent>, EngineError> {
    if !user.can_attend_webinars() {
        return Ok(Vec::new());
    }
    let now = Utc::now().to_rfc3339();
    db.upcoming_webinars(&now, user.level).map_err(EngineError::from)
}

/// Size-matched companies scored by token overlap between the user's
/// interest tags and the company's description + industry text. Stable
/// sort keeps encounter order on ties.
pub fn company_recommendations(
    db: &ProfileDb,
    user: &DbUser,
) -> Result<Vec<DbCompany>, EngineError> {
    let candidates =
        db.companies_by_size(user.recommended_company_size(), COMPANY_CANDIDATE_LIMIT)?;
    let tags = user.interest_tags();

    let mut scored: Vec<(DbCompany, usize)> = candidates
        .into_iter()
        .map(|company| {
            let text = format!(
                "{} {}",
                company.description.as_deref().unwrap_or(""),
                company.industry.as_deref().unwrap_or("")
            );
            let score = overlap_count(&tags, &text_tokens(&text));
            (company, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(scored
        .into_iter()
        .take(COMPANY_RESULT_LIMIT)
        .map(|(company, _)| company)
        .collect())
}

/// Register a user for an event.
///
/// Failure order: NotFound, EventPassed, LevelTooLow, AlreadyRegistered,
/// EventFull. On success the full set of side effects commits atomically;
/// a storage conflict is retried once transparently.
pub fn register_for_event(
    db: &ProfileDb,
    user_id: &str,
    event_id: &str,
) -> Result<RegistrationReceipt, EngineError> {
    match try_register(db, user_id, event_id) {
        Err(e) if e.is_retryable() => {
            log::warn!(
                "Registration for event {} hit a storage conflict, retrying once: {}",
                event_id,
                e
            );
            try_register(db, user_id, event_id).map_err(|e| {
                if e.is_retryable() {
                    EngineError::Conflict(e.to_string())
                } else {
                    e
                }
            })
        }
        other => other,
    }
}

fn try_register(
    db: &ProfileDb,
    user_id: &str,
    event_id: &str,
) -> Result<RegistrationReceipt, EngineError> {
    db.with_transaction(|db| {
        let user = db
            .get_user(user_id)?
            .ok_or(EngineError::NotFound("User"))?;
        let event = db
            .get_event(event_id)?
            .ok_or(EngineError::NotFound("Event"))?;

        if event_has_passed(&event) {
            return Err(EngineError::EventPassed);
        }
        if event.level_required > user.level {
            return Err(EngineError::LevelTooLow {
                required: event.level_required,
                level: user.level,
            });
        }
        if db.is_participant(event_id, user_id)? {
            return Err(EngineError::AlreadyRegistered);
        }
        if let Some(cap) = event.max_participants {
            if db.participant_count(event_id)? >= cap {
                return Err(EngineError::EventFull);
            }
        }

        db.add_participant(event_id, user_id)?;

        // Create the event's group chat on first registration and link it
        // back to the event.
        let chat_id = match event.group_chat_id {
            Some(ref id) => id.clone(),
            None => {
                let chat = DbGroupChat {
                    id: Uuid::new_v4().to_string(),
                    name: format!("Event Chat: {}", event.title),
                    event_id: Some(event.id.clone()),
                    created_at: Utc::now().to_rfc3339(),
                };
                db.insert_group_chat(&chat)?;
                db.link_event_chat(&event.id, &chat.id)?;
                chat.id
            }
        };
        db.add_chat_member(&chat_id, user_id)?;

        db.increment_attendance(user_id, event.event_type)?;
        let level = progress::add_experience(db, user_id, event.reward_points)?;

        log::info!(
            "User {} registered for event {} (+{} XP)",
            user_id,
            event_id,
            event.reward_points
        );

        Ok(RegistrationReceipt {
            event_id: event.id,
            message: "Successfully registered for event".to_string(),
            points_awarded: event.reward_points,
            level,
        })
    })
}

/// Withdraw a registration for an upcoming event. Removes participation and
/// group-chat membership; attendance counters and experience already
/// awarded stay.
pub fn unregister_from_event(
    db: &ProfileDb,
    user_id: &str,
    event_id: &str,
) -> Result<(), EngineError> {
    db.with_transaction(|db| {
        let event = db
            .get_event(event_id)?
            .ok_or(EngineError::NotFound("Event"))?;

        if event_has_passed(&event) {
            return Err(EngineError::EventPassed);
        }
        if !db.is_participant(event_id, user_id)? {
            return Err(EngineError::NotFound("Registration"));
        }

        db.remove_participant(event_id, user_id)?;
        if let Some(ref chat_id) = event.group_chat_id {
            db.remove_chat_member(chat_id, user_id)?;
        }
        Ok(())
    })
}

/// Other participants of an event ranked by shared interest tags, stable
/// descending, truncated to `limit`.
pub fn matching_buddies(
    db: &ProfileDb,
    user: &DbUser,
    event_id: &str,
    limit: usize,
) -> Result<Vec<DbUser>, EngineError> {
    if db.get_event(event_id)?.is_none() {
        return Ok(Vec::new());
    }

    let tags = user.interest_tags();
    let mut scored: Vec<(DbUser, usize)> = db
        .other_participants(event_id, &user.id)?
        .into_iter()
        .map(|candidate| {
            let score = overlap_count(&tags, &candidate.interest_tags());
            (candidate, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(scored
        .into_iter()
        .take(limit)
        .map(|(candidate, _)| candidate)
        .collect())
}

/// A user's registered events, split into (upcoming, past).
pub fn my_events(
    db: &ProfileDb,
    user_id: &str,
) -> Result<(Vec<DbEvent>, Vec<DbEvent>), EngineError> {
    let now = Utc::now().to_rfc3339();
    let upcoming = db.registered_events(user_id, &now, true)?;
    let past = db.registered_events(user_id, &now, false)?;
    Ok((upcoming, past))
}

/// Detail view of an event.
pub fn event_summary(db: &ProfileDb, event: &DbEvent) -> Result<EventSummary, EngineError> {
    let company = match event.company_id {
        Some(ref id) => db.get_company(id)?.map(|c| c.name),
        None => None,
    };

    let date = DateTime::parse_from_rfc3339(&event.date)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| event.date.clone());

    Ok(EventSummary {
        title: event.title.clone(),
        description: event.description.clone(),
        date,
        duration: format!("{} minutes", event.duration_minutes),
        company,
        event_type: event.event_type.as_str().to_string(),
        participants: db.participant_count(&event.id)?,
        max_participants: event.max_participants,
        level_required: event.level_required,
        points: event.reward_points,
        has_group_chat: event.group_chat_id.is_some(),
    })
}

/// Input for creating an event on behalf of a company admin.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub max_participants: Option<i64>,
    pub level_required: i64,
    pub reward_points: i64,
    pub event_type: EventType,
    pub company_id: Option<String>,
}

/// Persist a new event. Authorization (company-admin checks) belongs to the
/// request layer.
pub fn create_event(db: &ProfileDb, new: NewEvent) -> Result<DbEvent, EngineError> {
    let event = DbEvent {
        id: Uuid::new_v4().to_string(),
        title: new.title,
        description: new.description,
        date: new.date.to_rfc3339(),
        duration_minutes: new.duration_minutes,
        max_participants: new.max_participants,
        level_required: new.level_required,
        reward_points: new.reward_points,
        event_type: new.event_type,
        company_id: new.company_id,
        group_chat_id: None,
        created_at: Utc::now().to_rfc3339(),
    };
    db.insert_event(&event)?;
    Ok(event)
}

fn event_has_passed(event: &DbEvent) -> bool {
    match DateTime::parse_from_rfc3339(&event.date) {
        Ok(dt) => dt.with_timezone(&Utc) < Utc::now(),
        Err(e) => {
            log::warn!("Event {} has an unparseable date: {}", event.id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{sample_company, sample_event, sample_user, test_db};
    use crate::db::CompanySize;

    fn seeded_db() -> ProfileDb {
        let db = test_db();
        db.insert_company(&sample_company("c1", CompanySize::Startup))
            .expect("company");
        db
    }

    #[test]
    fn registration_awards_experience_and_creates_chat() {
        let db = seeded_db();
        db.create_user(&sample_user("u1", "a@x.com")).expect("user");
        let mut event = sample_event("e1", "c1", EventType::CompanyVisit, 3);
        event.reward_points = 150;
        db.insert_event(&event).expect("event");

        let receipt = register_for_event(&db, "u1", "e1").expect("register");
        assert_eq!(receipt.points_awarded, 150);
        assert!(receipt.level.leveled_up());
        assert_eq!(receipt.level.current, 2);

        let user = db.get_user("u1").expect("query").expect("present");
        assert_eq!(user.experience, 150);
        assert_eq!(user.level, 2);
        assert_eq!(user.company_visits, 1);
        assert_eq!(user.webinars_attended, 0);

        // Group chat was lazily created, linked, and joined.
        let event = db.get_event("e1").expect("query").expect("present");
        let chat_id = event.group_chat_id.expect("chat linked");
        assert!(db.is_chat_member(&chat_id, "u1").expect("member"));
        let chat = db.get_group_chat(&chat_id).expect("query").expect("chat");
        assert_eq!(chat.event_id.as_deref(), Some("e1"));
        assert!(chat.name.contains(&event.title));
    }

    #[test]
    fn webinar_registration_bumps_webinar_counter() {
        let db = seeded_db();
        let mut user = sample_user("u1", "a@x.com");
        user.level = 2;
        user.experience = 100;
        db.create_user(&user).expect("user");
        db.insert_event(&sample_event("e1", "c1", EventType::Webinar, 3))
            .expect("event");

        register_for_event(&db, "u1", "e1").expect("register");
        let user = db.get_user("u1").expect("query").expect("present");
        assert_eq!(user.webinars_attended, 1);
        assert_eq!(user.company_visits, 0);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let db = seeded_db();
        db.create_user(&sample_user("u1", "a@x.com")).expect("user");
        db.insert_event(&sample_event("e1", "c1", EventType::CompanyVisit, 3))
            .expect("event");

        register_for_event(&db, "u1", "e1").expect("first");
        let err = register_for_event(&db, "u1", "e1").expect_err("second");
        assert!(matches!(err, EngineError::AlreadyRegistered));

        assert_eq!(db.participant_count("e1").expect("count"), 1);
        let user = db.get_user("u1").expect("query").expect("present");
        assert_eq!(user.company_visits, 1, "no double-count on rejection");
    }

    #[test]
    fn capacity_is_enforced() {
        let db = seeded_db();
        let mut event = sample_event("e1", "c1", EventType::CompanyVisit, 3);
        event.max_participants = Some(2);
        db.insert_event(&event).expect("event");

        for i in 0..2 {
            let id = format!("u{}", i);
            db.create_user(&sample_user(&id, &format!("{}@x.com", id)))
                .expect("user");
            register_for_event(&db, &id, "e1").expect("register");
        }

        db.create_user(&sample_user("u9", "u9@x.com")).expect("user");
        let err = register_for_event(&db, "u9", "e1").expect_err("full");
        assert!(matches!(err, EngineError::EventFull));
        assert_eq!(db.participant_count("e1").expect("count"), 2);

        let user = db.get_user("u9").expect("query").expect("present");
        assert_eq!(user.experience, 0, "failed registration awards nothing");
        assert_eq!(user.company_visits, 0);
    }

    #[test]
    fn level_gate_and_past_events() {
        let db = seeded_db();
        db.create_user(&sample_user("u1", "a@x.com")).expect("user");

        let mut gated = sample_event("gated", "c1", EventType::CompanyVisit, 3);
        gated.level_required = 4;
        db.insert_event(&gated).expect("event");
        let err = register_for_event(&db, "u1", "gated").expect_err("gated");
        assert!(matches!(
            err,
            EngineError::LevelTooLow {
                required: 4,
                level: 1
            }
        ));

        db.insert_event(&sample_event("past", "c1", EventType::CompanyVisit, -1))
            .expect("event");
        let err = register_for_event(&db, "u1", "past").expect_err("past");
        assert!(matches!(err, EngineError::EventPassed));

        let err = register_for_event(&db, "u1", "missing").expect_err("missing");
        assert!(matches!(err, EngineError::NotFound("Event")));
    }

    #[test]
    fn unregister_removes_participation_but_keeps_points() {
        let db = seeded_db();
        db.create_user(&sample_user("u1", "a@x.com")).expect("user");
        db.insert_event(&sample_event("e1", "c1", EventType::CompanyVisit, 3))
            .expect("event");

        register_for_event(&db, "u1", "e1").expect("register");
        unregister_from_event(&db, "u1", "e1").expect("unregister");

        assert!(!db.is_participant("e1", "u1").expect("check"));
        let event = db.get_event("e1").expect("query").expect("present");
        let chat_id = event.group_chat_id.expect("chat");
        assert!(!db.is_chat_member(&chat_id, "u1").expect("member"));

        let user = db.get_user("u1").expect("query").expect("present");
        assert_eq!(user.experience, 50, "experience is not clawed back");

        let err = unregister_from_event(&db, "u1", "e1").expect_err("again");
        assert!(matches!(err, EngineError::NotFound("Registration")));
    }

    #[test]
    fn recommended_events_respect_size_and_cap() {
        let db = seeded_db();
        db.insert_company(&sample_company("c2", CompanySize::Enterprise))
            .expect("company");
        let user = sample_user("u1", "a@x.com");
        db.create_user(&user).expect("user");

        for i in 0..7 {
            db.insert_event(&sample_event(
                &format!("s{}", i),
                "c1",
                EventType::CompanyVisit,
                i + 1,
            ))
            .expect("event");
        }
        db.insert_event(&sample_event("big", "c2", EventType::CompanyVisit, 1))
            .expect("event");

        let events = recommended_events(&db, &user).expect("recommend");
        assert_eq!(events.len(), 5, "capped at five");
        assert_eq!(events[0].id, "s0", "soonest first");
        assert!(events.iter().all(|e| e.company_id.as_deref() == Some("c1")));
    }

    #[test]
    fn webinars_locked_below_level_two() {
        let db = seeded_db();
        db.insert_event(&sample_event("w1", "c1", EventType::Webinar, 2))
            .expect("event");

        let novice = sample_user("u1", "a@x.com");
        db.create_user(&novice).expect("user");
        assert!(available_webinars(&db, &novice).expect("query").is_empty());

        let mut adept = sample_user("u2", "b@x.com");
        adept.level = 2;
        assert_eq!(available_webinars(&db, &adept).expect("query").len(), 1);
    }

    #[test]
    fn company_recommendations_rank_by_interest_overlap() {
        let db = test_db();
        let mut weak = sample_company("weak", CompanySize::Startup);
        weak.description = Some("Logistics and freight".to_string());
        weak.industry = Some("shipping".to_string());
        db.insert_company(&weak).expect("company");

        let mut strong = sample_company("strong", CompanySize::Startup);
        strong.description = Some("We build rust tooling for fintech".to_string());
        strong.industry = Some("fintech".to_string());
        db.insert_company(&strong).expect("company");

        let mut user = sample_user("u1", "a@x.com");
        user.interests = Some("rust,fintech".to_string());
        db.create_user(&user).expect("user");

        let companies = company_recommendations(&db, &user).expect("recommend");
        assert_eq!(companies[0].id, "strong");
    }

    #[test]
    fn buddies_rank_by_shared_interests() {
        let db = seeded_db();
        db.insert_event(&sample_event("e1", "c1", EventType::CompanyVisit, 3))
            .expect("event");

        let mut me = sample_user("me", "me@x.com");
        me.interests = Some("rust,hiking,fintech".to_string());
        db.create_user(&me).expect("user");

        let mut close = sample_user("close", "close@x.com");
        close.interests = Some("rust,fintech".to_string());
        db.create_user(&close).expect("user");

        let mut far = sample_user("far", "far@x.com");
        far.interests = Some("painting".to_string());
        db.create_user(&far).expect("user");

        for id in ["me", "far", "close"] {
            register_for_event(&db, id, "e1").expect("register");
        }

        let buddies = matching_buddies(&db, &me, "e1", DEFAULT_BUDDY_LIMIT).expect("buddies");
        assert_eq!(buddies.len(), 2);
        assert_eq!(buddies[0].id, "close");
        assert_eq!(buddies[1].id, "far");

        assert!(matching_buddies(&db, &me, "missing", 3)
            .expect("missing event")
            .is_empty());
    }

    #[test]
    fn summary_reflects_participation() {
        let db = seeded_db();
        db.create_user(&sample_user("u1", "a@x.com")).expect("user");
        db.insert_event(&sample_event("e1", "c1", EventType::CompanyVisit, 3))
            .expect("event");
        register_for_event(&db, "u1", "e1").expect("register");

        let event = db.get_event("e1").expect("query").expect("present");
        let summary = event_summary(&db, &event).expect("summary");
        assert_eq!(summary.participants, 1);
        assert_eq!(summary.max_participants, Some(20));
        assert_eq!(summary.company.as_deref(), Some("Company c1"));
        assert_eq!(summary.duration, "90 minutes");
        assert!(summary.has_group_chat);
        assert_eq!(summary.event_type, "company_visit");
    }

    #[test]
    fn create_event_persists_row() {
        let db = seeded_db();
        let event = create_event(
            &db,
            NewEvent {
                title: "Office tour".to_string(),
                description: None,
                date: Utc::now() + chrono::Duration::days(7),
                duration_minutes: 45,
                max_participants: None,
                level_required: 1,
                reward_points: 75,
                event_type: EventType::CompanyVisit,
                company_id: Some("c1".to_string()),
            },
        )
        .expect("create");

        let stored = db.get_event(&event.id).expect("query").expect("present");
        assert_eq!(stored.title, "Office tour");
        assert_eq!(stored.max_participants, None);
    }
}
