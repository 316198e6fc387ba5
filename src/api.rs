//! Named backend operations
//!
//! Each operation is a fixed-shape call through [`ApiClient`]; the only
//! extra behaviour is credential bookkeeping around login, refresh and
//! logout, and best-effort analytics.

use crate::client::{ApiClient, RequestConfig};
use crate::error::{ApiError, ErrorKind};
use crate::models::{
    AnalyticsEvent, AuthTokens, BadgeShare, Certificate, DailyLesson, LeaderboardEntry,
    LoginRequest, NotificationPreferences, Progress, ProjectReceipt, ProjectSubmission,
    QuizAnswer, QuizResult, Tone, UserPreferences, UserProfile,
};
use crate::session::Credentials;
use serde_json::{json, Value};

/// Static endpoint table
pub mod endpoints {
    pub const HEALTH: &str = "/health";
    pub const LOGIN: &str = "/auth/login";
    pub const LOGOUT: &str = "/auth/logout";
    pub const REFRESH: &str = "/auth/refresh";
    pub const PROFILE: &str = "/users/me";
    pub const PREFERENCES: &str = "/users/me/preferences";
    pub const NOTIFICATIONS: &str = "/users/me/notifications";
    pub const PROGRESS: &str = "/users/me/progress";
    pub const DAILY_LESSON: &str = "/lessons/daily";
    pub const PROJECTS: &str = "/projects";
    pub const CERTIFICATES: &str = "/certificates";
    pub const EVENTS: &str = "/analytics/events";
    pub const LEADERBOARD: &str = "/leaderboard";

    pub fn quiz(lesson_id: &str) -> String {
        format!("/lessons/{}/quiz", urlencoding::encode(lesson_id))
    }

    pub fn tone(lesson_id: &str) -> String {
        format!("/lessons/{}/tone", urlencoding::encode(lesson_id))
    }

    pub fn lesson_stream(lesson_id: &str) -> String {
        format!("/lessons/{}/stream", urlencoding::encode(lesson_id))
    }

    pub fn share_badge(badge_id: &str) -> String {
        format!("/badges/{}/share", urlencoding::encode(badge_id))
    }
}

/// Domain facade over the request client
#[derive(Clone)]
pub struct QuickSkillsApi {
    client: ApiClient,
}

impl QuickSkillsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn health(&self) -> Result<Value, ApiError> {
        self.client
            .get(endpoints::HEALTH, RequestConfig::new())
            .await
            .map(|env| env.data)
    }

    /// Authenticate and persist the returned credential pair
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens, ApiError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let tokens: AuthTokens = self
            .client
            .post::<AuthTokens, _>(endpoints::LOGIN, &body, RequestConfig::new())
            .await?
            .data;

        self.client.session().store_credentials(&Credentials {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone().unwrap_or_default(),
        })?;
        tracing::info!("Logged in as {}", email);
        Ok(tokens)
    }

    /// Tell the server, then drop local credentials whatever it answered
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self
            .client
            .post::<Value, _>(endpoints::LOGOUT, &json!({}), RequestConfig::new().retries(0))
            .await;

        if let Err(e) = self.client.session().clear() {
            tracing::error!("Failed to clear credentials: {}", e);
        }
        result.map(|_| ())
    }

    /// Exchange the stored refresh token for a new pair
    pub async fn refresh_token(&self) -> Result<AuthTokens, ApiError> {
        let refresh = self.client.session().refresh_token().ok_or_else(|| {
            ApiError::new(ErrorKind::Unauthorized, 0, "No refresh token stored")
        })?;

        let tokens: AuthTokens = self
            .client
            .post::<AuthTokens, _>(
                endpoints::REFRESH,
                &json!({ "refreshToken": refresh.as_str() }),
                RequestConfig::new(),
            )
            .await?
            .data;

        self.client.session().store_credentials(&Credentials {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone().unwrap_or(refresh),
        })?;
        tracing::debug!("Access token refreshed");
        Ok(tokens)
    }

    pub async fn get_user_profile(&self) -> Result<UserProfile, ApiError> {
        self.client
            .get(endpoints::PROFILE, RequestConfig::new())
            .await
            .map(|env| env.data)
    }

    pub async fn update_user_preferences(
        &self,
        preferences: &UserPreferences,
    ) -> Result<UserPreferences, ApiError> {
        self.client
            .patch(endpoints::PREFERENCES, preferences, RequestConfig::new())
            .await
            .map(|env| env.data)
    }

    pub async fn get_daily_lesson(&self) -> Result<DailyLesson, ApiError> {
        self.client
            .get(endpoints::DAILY_LESSON, RequestConfig::new())
            .await
            .map(|env| env.data)
    }

    pub async fn submit_quiz(
        &self,
        lesson_id: &str,
        answers: &[QuizAnswer],
    ) -> Result<QuizResult, ApiError> {
        self.client
            .post(
                &endpoints::quiz(lesson_id),
                &json!({ "answers": answers }),
                RequestConfig::new(),
            )
            .await
            .map(|env| env.data)
    }

    pub async fn switch_tone(&self, lesson_id: &str, tone: Tone) -> Result<DailyLesson, ApiError> {
        self.client
            .post(
                &endpoints::tone(lesson_id),
                &json!({ "tone": tone }),
                RequestConfig::new(),
            )
            .await
            .map(|env| env.data)
    }

    pub async fn submit_project(
        &self,
        submission: &ProjectSubmission,
    ) -> Result<ProjectReceipt, ApiError> {
        self.client
            .post(endpoints::PROJECTS, submission, RequestConfig::new())
            .await
            .map(|env| env.data)
    }

    pub async fn generate_certificate(&self, course_id: &str) -> Result<Certificate, ApiError> {
        self.client
            .post(
                endpoints::CERTIFICATES,
                &json!({ "courseId": course_id }),
                RequestConfig::new(),
            )
            .await
            .map(|env| env.data)
    }

    pub async fn share_badge(
        &self,
        badge_id: &str,
        platform: &str,
    ) -> Result<BadgeShare, ApiError> {
        self.client
            .post(
                &endpoints::share_badge(badge_id),
                &json!({ "platform": platform }),
                RequestConfig::new(),
            )
            .await
            .map(|env| env.data)
    }

    /// Fire-and-forget analytics; failures are logged and dropped
    pub async fn track_event(&self, event: &AnalyticsEvent) {
        let result = self
            .client
            .post::<Value, _>(endpoints::EVENTS, event, RequestConfig::new().retries(0))
            .await;
        if let Err(e) = result {
            tracing::debug!("Dropping analytics event '{}': {}", event.name, e);
        }
    }

    pub async fn update_notification_preferences(
        &self,
        preferences: &NotificationPreferences,
    ) -> Result<NotificationPreferences, ApiError> {
        self.client
            .put(endpoints::NOTIFICATIONS, preferences, RequestConfig::new())
            .await
            .map(|env| env.data)
    }

    /// `period` is e.g. `weekly` or `all-time`
    pub async fn get_leaderboard(&self, period: &str) -> Result<Vec<LeaderboardEntry>, ApiError> {
        let endpoint = format!(
            "{}?period={}",
            endpoints::LEADERBOARD,
            urlencoding::encode(period)
        );
        self.client
            .get(&endpoint, RequestConfig::new())
            .await
            .map(|env| env.data)
    }

    pub async fn get_progress(&self) -> Result<Progress, ApiError> {
        self.client
            .get(endpoints::PROGRESS, RequestConfig::new())
            .await
            .map(|env| env.data)
    }
}
