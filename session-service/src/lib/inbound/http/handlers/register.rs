use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use super::AccessTokenData;
use super::ApiError;
use super::ApiSuccess;
use super::SessionData;
use crate::domain::session::models::EmailAddress;
use crate::domain::session::models::Password;
use crate::domain::session::models::RegisterCommand;
use crate::domain::session::models::Username;
use crate::inbound::http::cookies;
use crate::inbound::http::router::AppState;
use crate::session::errors::SessionError;

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> Result<(CookieJar, ApiSuccess<SessionData>), ApiError> {
    let session = state
        .session_service
        .register(body.try_into_command()?)
        .await?;

    let jar = cookies::with_refresh_token(jar, session.tokens.refresh_token.clone(), &state.cookies);
    let data = SessionData {
        user: (&session.user).into(),
        token: AccessTokenData::from(&session.tokens),
    };

    Ok((jar, ApiSuccess::new(StatusCode::CREATED, data)))
}

/// HTTP request body for registration (raw JSON)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterRequest {
    email: String,
    username: String,
    password: String,
}

impl RegisterRequest {
    fn try_into_command(self) -> Result<RegisterCommand, SessionError> {
        let email = EmailAddress::new(self.email)?;
        let username = Username::new(self.username)?;
        let password = Password::new(self.password)?;
        Ok(RegisterCommand::new(email, username, password))
    }
}
