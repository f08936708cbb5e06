use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use super::AccessTokenData;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::session::models::Identity;
use crate::domain::session::models::Password;
use crate::inbound::http::cookies;
use crate::inbound::http::router::AppState;
use crate::session::errors::SessionError;

/// Change the caller's password. Every other session is revoked; the caller gets a new one.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<(CookieJar, ApiSuccess<AccessTokenData>), ApiError> {
    let new_password = Password::new(body.new_password).map_err(SessionError::from)?;

    let tokens = state
        .session_service
        .change_password(&identity, &body.old_password, new_password)
        .await?;

    let data = AccessTokenData::from(&tokens);
    let jar = cookies::with_refresh_token(jar, tokens.refresh_token, &state.cookies);

    Ok((jar, ApiSuccess::new(StatusCode::OK, data)))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}
