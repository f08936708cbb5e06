use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use crate::domain::session::models::SessionTokens;
use crate::domain::session::models::User;
use crate::session::errors::SessionError;

pub mod assign_role;
pub mod change_password;
pub mod current_user;
pub mod forgot_password;
pub mod health;
pub mod login;
pub mod logout;
pub mod logout_all;
pub mod oauth_callback;
pub mod refresh;
pub mod register;
pub mod resend_email_verification;
pub mod reset_password;
pub mod verify_email;

#[derive(Debug, Clone)]
pub struct ApiSuccess<T: Serialize + PartialEq>(StatusCode, Json<ApiResponseBody<T>>);

impl<T> PartialEq for ApiSuccess<T>
where
    T: Serialize + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 .0 == other.1 .0
    }
}

impl<T: Serialize + PartialEq> ApiSuccess<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        ApiSuccess(status, Json(ApiResponseBody::new(status, data)))
    }
}

impl<T: Serialize + PartialEq> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    InternalServerError(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    ServiceUnavailable(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::InternalServerError(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        (status, Json(ApiResponseBody::new_error(status, message))).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidUserId(_)
            | SessionError::InvalidUsername(_)
            | SessionError::InvalidEmail(_)
            | SessionError::WeakPassword(_)
            | SessionError::InvalidRole(_)
            | SessionError::InvalidProvider(_)
            | SessionError::SamePassword
            | SessionError::MissingProviderEmail
            | SessionError::TemporaryTokenInvalidOrExpired => ApiError::BadRequest(err.to_string()),

            SessionError::InvalidCredentials
            | SessionError::TokenInvalid
            | SessionError::TokenExpired
            | SessionError::RefreshReuseDetected
            | SessionError::RefreshTokenExpired => ApiError::Unauthorized(err.to_string()),

            SessionError::InsufficientRole | SessionError::AccountInactive => {
                ApiError::Forbidden(err.to_string())
            }

            SessionError::NotFound => ApiError::NotFound(err.to_string()),

            SessionError::IdentityProviderConflict(_)
            | SessionError::DuplicateEmailOrUsername
            | SessionError::EmailAlreadyVerified => ApiError::Conflict(err.to_string()),

            SessionError::TransientStoreFailure(ref detail) => {
                tracing::error!(error = %detail, "Store unavailable");
                ApiError::ServiceUnavailable("Service temporarily unavailable".to_string())
            }

            SessionError::CorruptCredential | SessionError::Internal(_) => {
                tracing::error!(error = %err, "Internal error");
                ApiError::InternalServerError("Internal server error".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponseBody<T: Serialize + PartialEq> {
    status_code: u16,
    data: T,
}

impl<T: Serialize + PartialEq> ApiResponseBody<T> {
    pub fn new(status_code: StatusCode, data: T) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data,
        }
    }
}

impl ApiResponseBody<ApiErrorData> {
    pub fn new_error(status_code: StatusCode, message: String) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data: ApiErrorData { message },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorData {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageData {
    pub message: String,
}

impl MessageData {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Public projection of a user. Credential state never leaves the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserData {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub role: String,
    pub login_type: String,
    pub avatar_url: Option<String>,
    pub is_email_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserData {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.as_str().to_string(),
            username: user.username.as_ref().map(|u| u.as_str().to_string()),
            role: user.role.as_str().to_string(),
            login_type: user.login_type.as_str().to_string(),
            avatar_url: user.avatar_url.clone(),
            is_email_verified: user.is_email_verified,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// Access token handed to the client. The refresh token travels in a cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessTokenData {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&SessionTokens> for AccessTokenData {
    fn from(tokens: &SessionTokens) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            token_type: "Bearer".to_string(),
            expires_at: tokens.access_expires_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionData {
    pub user: UserData,
    #[serde(flatten)]
    pub token: AccessTokenData,
}
