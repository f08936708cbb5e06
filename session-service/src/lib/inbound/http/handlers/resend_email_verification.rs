use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;

use super::ApiError;
use super::ApiSuccess;
use super::MessageData;
use crate::domain::session::models::Identity;
use crate::inbound::http::router::AppState;

pub async fn resend_email_verification(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<ApiSuccess<MessageData>, ApiError> {
    state
        .session_service
        .resend_email_verification(&identity)
        .await
        .map_err(ApiError::from)
        .map(|_| ApiSuccess::new(StatusCode::OK, MessageData::new("Verification email sent")))
}
