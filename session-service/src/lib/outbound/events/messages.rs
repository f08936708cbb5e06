use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::domain::session::events::SessionEvent;
use crate::domain::session::events::SessionEventKind;

/// Serializable envelope for session lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEventMessage {
    pub event_id: String,
    pub event_type: String,
    pub user_id: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: SessionEventDetails,
}

/// Event-specific payload. Never carries raw tokens or digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionEventDetails {
    LoginType {
        login_type: String,
    },
    RevokedSessions {
        revoked_sessions: u64,
    },
    RoleChange {
        from_role: String,
        to_role: String,
        changed_by: String,
    },
    None {},
}

impl From<&SessionEvent> for SessionEventMessage {
    fn from(event: &SessionEvent) -> Self {
        let details = match &event.kind {
            SessionEventKind::UserRegistered { login_type }
            | SessionEventKind::OAuthLogin { login_type } => SessionEventDetails::LoginType {
                login_type: login_type.as_str().to_string(),
            },
            SessionEventKind::RefreshReuseDetected { revoked_sessions }
            | SessionEventKind::LoggedOutEverywhere { revoked_sessions } => {
                SessionEventDetails::RevokedSessions {
                    revoked_sessions: *revoked_sessions,
                }
            }
            SessionEventKind::RoleChanged {
                from,
                to,
                changed_by,
            } => SessionEventDetails::RoleChange {
                from_role: from.as_str().to_string(),
                to_role: to.as_str().to_string(),
                changed_by: changed_by.to_string(),
            },
            _ => SessionEventDetails::None {},
        };

        Self {
            event_id: event.event_id.clone(),
            event_type: event.event_type().to_string(),
            user_id: event.user_id.to_string(),
            occurred_at: event.occurred_at,
            details,
        }
    }
}
