use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;

use super::AccessTokenData;
use super::ApiError;
use super::ApiSuccess;
use crate::inbound::http::cookies;
use crate::inbound::http::router::AppState;

/// Rotate the refresh token held in the cookie.
///
/// Any failure clears the cookie; the presented token can never be used again.
pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(token) = cookies::refresh_token(&jar) else {
        return ApiError::Unauthorized("Missing refresh token".to_string()).into_response();
    };

    match state.session_service.refresh(&token).await {
        Ok(tokens) => {
            let data = AccessTokenData::from(&tokens);
            let jar = cookies::with_refresh_token(jar, tokens.refresh_token, &state.cookies);
            (jar, ApiSuccess::new(StatusCode::OK, data)).into_response()
        }
        Err(e) => (cookies::without_refresh_token(jar), ApiError::from(e)).into_response(),
    }
}
