use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::session::models::LoginType;
use crate::domain::session::models::Role;
use crate::domain::session::models::UserId;

/// What happened in a session lifecycle event.
///
/// Carries identifiers and outcome kinds only. Raw tokens and digests never appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEventKind {
    UserRegistered { login_type: LoginType },
    LoggedIn,
    TokenRefreshed,
    RefreshReuseDetected { revoked_sessions: u64 },
    LoggedOut,
    LoggedOutEverywhere { revoked_sessions: u64 },
    EmailVerified,
    VerificationResent,
    PasswordResetRequested,
    PasswordResetCompleted,
    PasswordChanged,
    RoleChanged { from: Role, to: Role, changed_by: UserId },
    OAuthLogin { login_type: LoginType },
}

/// Envelope for all session domain events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub event_id: String,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
    pub kind: SessionEventKind,
}

impl SessionEvent {
    /// Create a new event with a unique event ID.
    ///
    /// # Arguments
    /// * `user_id` - User the event relates to
    /// * `kind` - What happened
    /// * `occurred_at` - When it happened
    pub fn new(user_id: UserId, kind: SessionEventKind, occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            user_id,
            occurred_at,
            kind,
        }
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            SessionEventKind::UserRegistered { .. } => "user_registered",
            SessionEventKind::LoggedIn => "logged_in",
            SessionEventKind::TokenRefreshed => "token_refreshed",
            SessionEventKind::RefreshReuseDetected { .. } => "refresh_reuse_detected",
            SessionEventKind::LoggedOut => "logged_out",
            SessionEventKind::LoggedOutEverywhere { .. } => "logged_out_everywhere",
            SessionEventKind::EmailVerified => "email_verified",
            SessionEventKind::VerificationResent => "verification_resent",
            SessionEventKind::PasswordResetRequested => "password_reset_requested",
            SessionEventKind::PasswordResetCompleted => "password_reset_completed",
            SessionEventKind::PasswordChanged => "password_changed",
            SessionEventKind::RoleChanged { .. } => "role_changed",
            SessionEventKind::OAuthLogin { .. } => "oauth_login",
        }
    }

    /// Whether the event signals a possible credential compromise.
    pub fn is_security_alert(&self) -> bool {
        matches!(self.kind, SessionEventKind::RefreshReuseDetected { .. })
    }
}
