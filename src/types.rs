//! Shared configuration and view types returned to the request layer.

use serde::{Deserialize, Serialize};

/// Configuration stored in ~/.careeros/config.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub advisor: AdvisorConfig,
}

/// Text-generation model configuration for the career advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorConfig {
    /// API key. Falls back to the `GEMINI_API_KEY` environment variable
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        AdvisorConfig {
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

fn default_model() -> String {
    "gemini-pro".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.9
}

fn default_top_k() -> u32 {
    40
}

fn default_max_output_tokens() -> u32 {
    1024
}

/// Whether a level changed when experience was awarded.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelChange {
    pub previous: i64,
    pub current: i64,
}

impl LevelChange {
    pub fn leveled_up(&self) -> bool {
        self.current > self.previous
    }
}

/// Snapshot of a user's progression, shaped for the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub level: i64,
    pub experience: i64,
    /// Experience still needed for the next level; absent at max level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_level_exp: Option<i64>,
    /// Percentage through the current level band; 0 at max level.
    pub progress_percentage: f64,
    pub badges: i64,
    pub company_visits: i64,
    pub webinars_attended: i64,
    pub chat_streak: u32,
    pub total_chats: i64,
    pub connections: i64,
}

/// Activity counters feeding the engagement score. Assembled from the
/// database, scored by a pure function.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivitySnapshot {
    pub total_chats: i64,
    pub company_visits: i64,
    pub webinars_attended: i64,
    pub streak_days: u32,
    pub level: i64,
    pub badges: i64,
}

/// View of an event, shaped for detail pages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub title: String,
    pub description: Option<String>,
    /// `YYYY-MM-DD HH:MM`
    pub date: String,
    pub duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub event_type: String,
    pub participants: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<i64>,
    pub level_required: i64,
    pub points: i64,
    pub has_group_chat: bool,
}

/// Outcome of a successful event registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReceipt {
    pub event_id: String,
    pub message: String,
    pub points_awarded: i64,
    pub level: LevelChange,
}

/// Outcome of one advisor turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorReply {
    /// Full response text, including any appended level-up note or
    /// activity suggestion.
    pub text: String,
    pub points_earned: i64,
    pub leveled_up: bool,
    pub level: i64,
    pub engagement_score: f64,
    pub topics: Vec<String>,
    /// False when the delegate failed and this is the fallback text.
    pub persisted: bool,
}

/// Average advisor engagement for one calendar day.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementDay {
    /// `YYYY-MM-DD`
    pub date: String,
    pub avg_engagement: f64,
}

/// How often a topic combination came up.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCount {
    pub topics: String,
    pub count: i64,
}

/// One advisor turn shaped for history export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnExport {
    pub timestamp: String,
    pub message: String,
    pub response: String,
    pub sentiment_score: f64,
    pub engagement_score: f64,
    pub topics: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisor_config_defaults() {
        let config: Config = serde_json::from_str("{}").expect("empty config parses");
        assert_eq!(config.advisor.model, "gemini-pro");
        assert_eq!(config.advisor.timeout_secs, 30);
        assert!((config.advisor.temperature - 0.7).abs() < 1e-9);
        assert_eq!(config.advisor.max_output_tokens, 1024);
    }

    #[test]
    fn advisor_config_overrides() {
        let config: Config = serde_json::from_str(
            r#"{"advisor": {"model": "gemini-ultra", "timeoutSecs": 5}}"#,
        )
        .expect("config parses");
        assert_eq!(config.advisor.model, "gemini-ultra");
        assert_eq!(config.advisor.timeout_secs, 5);
        assert_eq!(config.advisor.top_k, 40, "unset fields keep defaults");
    }

    #[test]
    fn level_change_detection() {
        assert!(LevelChange {
            previous: 1,
            current: 2
        }
        .leveled_up());
        assert!(!LevelChange {
            previous: 3,
            current: 3
        }
        .leveled_up());
    }
}
