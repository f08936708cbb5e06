use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::session::models::Identity;
use crate::inbound::http::cookies;
use crate::inbound::http::router::AppState;

pub async fn logout_all(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiSuccess<LogoutAllResponseData>), ApiError> {
    let revoked_sessions = state.session_service.logout_all(&identity).await?;

    Ok((
        cookies::without_refresh_token(jar),
        ApiSuccess::new(StatusCode::OK, LogoutAllResponseData { revoked_sessions }),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoutAllResponseData {
    pub revoked_sessions: u64,
}
