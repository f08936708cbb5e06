use async_trait::async_trait;

use crate::domain::session::events::SessionEvent;
use crate::outbound::events::messages::SessionEventMessage;
use crate::session::errors::EventPublisherError;
use crate::session::ports::EventPublisher;

/// Target under which session events are emitted.
pub const SESSION_EVENTS_TARGET: &str = "session_events";

/// Publishes session events as structured log records.
///
/// Security alerts are emitted at `warn`, everything else at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher;

impl TracingEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: &SessionEvent) -> Result<(), EventPublisherError> {
        let message = SessionEventMessage::from(event);
        let payload = serde_json::to_string(&message)
            .map_err(|e| EventPublisherError::SerializationFailed(e.to_string()))?;

        if event.is_security_alert() {
            tracing::warn!(
                target: SESSION_EVENTS_TARGET,
                event_type = %message.event_type,
                user_id = %message.user_id,
                payload = %payload,
                "Security event"
            );
        } else {
            tracing::info!(
                target: SESSION_EVENTS_TARGET,
                event_type = %message.event_type,
                user_id = %message.user_id,
                payload = %payload,
                "Session event"
            );
        }

        Ok(())
    }
}
