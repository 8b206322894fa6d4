//! Error types for the engine.
//!
//! Errors are classified by how the request layer should treat them:
//! - UserFeedback: domain-rule violations to surface as a flash message
//! - Retryable: storage conflicts from concurrent writers
//! - Internal: storage failures and everything else unexpected
//!
//! Contract violations (negative point awards, unknown catalog badges)
//! are bugs, not error values — those paths assert.

use thiserror::Error;

use crate::db::DbError;

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Event has already passed")]
    EventPassed,

    #[error("Your level is too low for this event (requires level {required})")]
    LevelTooLow { required: i64, level: i64 },

    #[error("Already registered for this event")]
    AlreadyRegistered,

    #[error("You cannot connect with yourself")]
    SelfConnection,

    #[error("Event is full")]
    EventFull,

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Advisor unavailable: {0}")]
    DelegateUnavailable(String),

    #[error("Storage conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl EngineError {
    /// True for domain-rule violations the caller should show the user and
    /// then carry on from.
    pub fn is_user_feedback(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound(_)
                | EngineError::EventPassed
                | EngineError::LevelTooLow { .. }
                | EngineError::AlreadyRegistered
                | EngineError::SelfConnection
                | EngineError::EventFull
                | EngineError::EmptyMessage
        )
    }

    /// True when the same unit of work can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Conflict(_) => true,
            EngineError::Db(e) => e.is_busy(),
            _ => false,
        }
    }

    /// The message the request layer shows for this failure.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::NotFound(what) => format!("{} not found", what),
            EngineError::EventPassed => "Event has already passed".to_string(),
            EngineError::LevelTooLow { .. } => {
                "Your level is too low for this event".to_string()
            }
            EngineError::AlreadyRegistered => "Already registered for this event".to_string(),
            EngineError::SelfConnection => "You cannot connect with yourself".to_string(),
            EngineError::EventFull => "Event is full".to_string(),
            EngineError::EmptyMessage => "Message cannot be empty".to_string(),
            EngineError::DelegateUnavailable(_) | EngineError::Conflict(_) | EngineError::Db(_) => {
                "Something went wrong — please try again".to_string()
            }
        }
    }
}

/// Serializable error representation for the request layer.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineFailure {
    pub message: String,
    pub kind: FailureKind,
    pub can_retry: bool,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    UserFeedback,
    Retryable,
    Internal,
}

impl From<&EngineError> for EngineFailure {
    fn from(err: &EngineError) -> Self {
        let kind = if err.is_user_feedback() {
            FailureKind::UserFeedback
        } else if err.is_retryable() {
            FailureKind::Retryable
        } else {
            FailureKind::Internal
        };

        EngineFailure {
            message: err.user_message(),
            kind,
            can_retry: err.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_violations_are_user_feedback() {
        assert!(EngineError::EventFull.is_user_feedback());
        assert!(EngineError::AlreadyRegistered.is_user_feedback());
        assert!(EngineError::EmptyMessage.is_user_feedback());
        assert!(!EngineError::Conflict("busy".to_string()).is_user_feedback());
    }

    #[test]
    fn conflict_is_retryable() {
        assert!(EngineError::Conflict("busy".to_string()).is_retryable());
        assert!(!EngineError::EventFull.is_retryable());
    }

    #[test]
    fn failure_mirror_carries_classification() {
        let failure = EngineFailure::from(&EngineError::LevelTooLow {
            required: 5,
            level: 2,
        });
        assert!(matches!(failure.kind, FailureKind::UserFeedback));
        assert!(!failure.can_retry);
        assert_eq!(failure.message, "Your level is too low for this event");
    }
}
