//! Data models for the Quick AI Skills backend

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response from the login and refresh endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    #[serde(alias = "token")]
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub xp: u64,

    #[serde(default)]
    pub streak: u32,

    #[serde(default)]
    pub level: Option<u32>,

    #[serde(default)]
    pub badges: Vec<String>,

    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Narration style of lesson content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Casual,
    Professional,
    Playful,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_goal_minutes: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLesson {
    pub id: String,
    pub title: String,

    #[serde(default)]
    pub tone: Option<Tone>,

    /// Chat-style message blocks, rendered by the host
    #[serde(default)]
    pub content: serde_json::Value,

    #[serde(default)]
    pub quiz: Option<Quiz>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Quiz {
    pub id: String,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswer {
    pub question_id: String,
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub score: u32,

    #[serde(default)]
    pub total: Option<u32>,

    #[serde(default)]
    pub xp_earned: u64,

    #[serde(default)]
    pub passed: bool,

    #[serde(flatten)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSubmission {
    pub title: String,
    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectReceipt {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub issued_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeShare {
    pub share_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub properties: serde_json::Value,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>, properties: serde_json::Value) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            name: name.into(),
            properties,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email: bool,
    pub push: bool,
    pub daily_reminder: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub name: String,
    pub xp: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub completed_lessons: u32,
}

/// One incremental piece of a streamed lesson
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LessonChunk {
    #[serde(default)]
    pub index: Option<u32>,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_tokens_accept_legacy_token_field() {
        let tokens: AuthTokens = serde_json::from_value(json!({"token": "abc"})).unwrap();
        assert_eq!(tokens.access_token, "abc");
        assert!(tokens.refresh_token.is_none());
    }

    #[test]
    fn test_preferences_skip_unset_fields() {
        let prefs = UserPreferences {
            tone: Some(Tone::Playful),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&prefs).unwrap(), json!({"tone": "playful"}));
    }

    #[test]
    fn test_user_profile_keeps_unknown_fields() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": "u1",
            "email": "a@b.c",
            "xp": 120,
            "onboardingComplete": true
        }))
        .unwrap();
        assert_eq!(profile.xp, 120);
        assert_eq!(profile.extra["onboardingComplete"], true);
    }
}
