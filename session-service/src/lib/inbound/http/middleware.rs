use axum::extract::Request;
use axum::extract::State;
use axum::http::{self};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;

use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;
use crate::session::errors::SessionError;

/// Middleware that verifies the Bearer access token and stores the caller's
/// `Identity` in the request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(&req)?;

    let identity = state.session_service.authenticate(token).map_err(|e| {
        tracing::warn!(error = %e, "Access token rejected");
        match e {
            SessionError::TokenExpired => {
                ApiError::Unauthorized("Access token expired".to_string()).into_response()
            }
            _ => ApiError::Unauthorized("Invalid access token".to_string()).into_response(),
        }
    })?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

fn extract_token_from_header(req: &Request) -> Result<&str, Response> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::Unauthorized("Missing Authorization header".to_string()).into_response()
        })?;

    let auth_str = auth_header.to_str().map_err(|_| {
        ApiError::Unauthorized("Invalid Authorization header".to_string()).into_response()
    })?;

    auth_str
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ApiError::Unauthorized(
                "Invalid Authorization header format. Expected: Bearer <token>".to_string(),
            )
            .into_response()
        })
}
