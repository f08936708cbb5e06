use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use super::AccessTokenData;
use super::ApiError;
use super::ApiSuccess;
use super::SessionData;
use crate::inbound::http::cookies;
use crate::inbound::http::router::AppState;

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, ApiSuccess<SessionData>), ApiError> {
    let session = state
        .session_service
        .login(&body.identifier, &body.password)
        .await?;

    let jar = cookies::with_refresh_token(jar, session.tokens.refresh_token.clone(), &state.cookies);
    let data = SessionData {
        user: (&session.user).into(),
        token: AccessTokenData::from(&session.tokens),
    };

    Ok((jar, ApiSuccess::new(StatusCode::OK, data)))
}

/// Email address or username, and password
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequest {
    identifier: String,
    password: String,
}
