use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::UserData;
use crate::domain::session::models::Identity;
use crate::domain::session::models::Role;
use crate::domain::session::models::UserId;
use crate::inbound::http::router::AppState;
use crate::session::errors::SessionError;

/// Admin only.
pub async fn assign_role(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<String>,
    Json(body): Json<AssignRoleRequest>,
) -> Result<ApiSuccess<UserData>, ApiError> {
    let target = UserId::from_string(&user_id).map_err(SessionError::from)?;
    let role = body.role.parse::<Role>().map_err(SessionError::from)?;

    state
        .session_service
        .assign_role(&identity, &target, role)
        .await
        .map_err(ApiError::from)
        .map(|ref user| ApiSuccess::new(StatusCode::OK, user.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssignRoleRequest {
    role: String,
}
