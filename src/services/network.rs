// Network service — user-to-user connections and peer recommendations.
//
// Connections are symmetric: connecting writes both edges in one
// transaction, so either user sees the other in their connection list and
// the networking achievement counts the same for both sides.

use crate::db::{DbUser, ProfileDb};
use crate::error::EngineError;
use crate::helpers::overlap_count;

/// Default peer recommendation cap.
const RECOMMENDED_PEERS_LIMIT: usize = 3;

/// Connect two users. Self-connections and repeat connections are rejected
/// as user feedback.
pub fn connect_users(db: &ProfileDb, user_id: &str, target_id: &str) -> Result<(), EngineError> {
    if user_id == target_id {
        return Err(EngineError::SelfConnection);
    }

    db.with_transaction(|db| {
        db.get_user(target_id)?
            .ok_or(EngineError::NotFound("User"))?;

        if db.are_connected(user_id, target_id)? {
            return Err(EngineError::AlreadyRegistered);
        }

        db.add_connection_edge(user_id, target_id)?;
        db.add_connection_edge(target_id, user_id)?;
        log::info!("Users {} and {} are now connected", user_id, target_id);
        Ok(())
    })
}

/// Other users ranked by shared interest tags, stable descending over the
/// most recently active.
pub fn recommended_peers(db: &ProfileDb, user: &DbUser) -> Result<Vec<DbUser>, EngineError> {
    let tags = user.interest_tags();
    if tags.is_empty() {
        return Ok(Vec::new());
    }

    let mut scored: Vec<(DbUser, usize)> = db
        .active_users(&user.id, 20)?
        .into_iter()
        .map(|candidate| {
            let score = overlap_count(&tags, &candidate.interest_tags());
            (candidate, score)
        })
        .filter(|(_, score)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(scored
        .into_iter()
        .take(RECOMMENDED_PEERS_LIMIT)
        .map(|(candidate, _)| candidate)
        .collect())
}
