use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;

use super::ApiError;
use super::ApiSuccess;
use super::MessageData;
use crate::inbound::http::cookies;
use crate::inbound::http::router::AppState;

/// Revoke the refresh token held in the cookie and clear it. Without a cookie this is a
/// no-op.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(token) = cookies::refresh_token(&jar) {
        if let Err(e) = state.session_service.logout(&token).await {
            return (cookies::without_refresh_token(jar), ApiError::from(e)).into_response();
        }
    }

    (
        cookies::without_refresh_token(jar),
        ApiSuccess::new(StatusCode::OK, MessageData::new("Logged out")),
    )
        .into_response()
}
