use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use super::AccessTokenData;
use super::ApiError;
use super::ApiSuccess;
use super::SessionData;
use crate::domain::session::models::ExternalIdentity;
use crate::domain::session::models::Provider;
use crate::inbound::http::cookies;
use crate::inbound::http::router::AppState;
use crate::session::errors::SessionError;

/// Header carrying the shared secret of the OAuth front-end.
pub const CALLBACK_SECRET_HEADER: &str = "x-callback-secret";

/// Complete a federated login with the profile the provider returned.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(profile): Json<serde_json::Value>,
) -> Result<(CookieJar, ApiSuccess<SessionData>), ApiError> {
    let presented = headers
        .get(CALLBACK_SECRET_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();
    if !auth::secret::constant_time_eq(presented, state.oauth_callback_secret.as_bytes()) {
        tracing::warn!(provider = %provider, "OAuth callback with bad secret");
        return Err(ApiError::Unauthorized("Invalid callback secret".to_string()));
    }

    let provider = provider.parse::<Provider>().map_err(SessionError::from)?;
    let identity = normalize(provider, profile)?;

    let session = state
        .session_service
        .oauth_callback(provider, identity)
        .await?;

    let jar = cookies::with_refresh_token(jar, session.tokens.refresh_token.clone(), &state.cookies);
    let data = SessionData {
        user: (&session.user).into(),
        token: AccessTokenData::from(&session.tokens),
    };

    Ok((jar, ApiSuccess::new(StatusCode::OK, data)))
}

fn normalize(
    provider: Provider,
    profile: serde_json::Value,
) -> Result<ExternalIdentity, ApiError> {
    let malformed = |e: serde_json::Error| {
        ApiError::BadRequest(format!("Malformed {} profile: {}", provider.as_str(), e))
    };

    match provider {
        Provider::Google => serde_json::from_value::<GoogleProfile>(profile)
            .map(ExternalIdentity::from)
            .map_err(malformed),
        Provider::Github => serde_json::from_value::<GithubProfile>(profile)
            .map(ExternalIdentity::from)
            .map_err(malformed),
    }
}

/// OpenID Connect userinfo as returned by Google
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GoogleProfile {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl From<GoogleProfile> for ExternalIdentity {
    fn from(profile: GoogleProfile) -> Self {
        Self {
            email: profile.email,
            provider_id: profile.sub,
            display_name: profile.name,
            avatar_url: profile.picture,
        }
    }
}

/// GitHub `/user` response. `email` is null when the user keeps it private.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GithubProfile {
    id: u64,
    login: String,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

impl From<GithubProfile> for ExternalIdentity {
    fn from(profile: GithubProfile) -> Self {
        Self {
            email: profile.email,
            provider_id: profile.id.to_string(),
            display_name: profile.name.or(Some(profile.login)),
            avatar_url: profile.avatar_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_google_profile_is_normalized() {
        let identity = normalize(
            Provider::Google,
            json!({
                "sub": "1084",
                "email": "alice@example.com",
                "name": "Alice",
                "picture": "https://example.com/a.png",
                "email_verified": true
            }),
        )
        .unwrap();

        assert_eq!(identity.provider_id, "1084");
        assert_eq!(identity.email.as_deref(), Some("alice@example.com"));
        assert_eq!(identity.avatar_url.as_deref(), Some("https://example.com/a.png"));
    }

    #[test]
    fn test_github_profile_without_email() {
        let identity = normalize(
            Provider::Github,
            json!({
                "id": 42,
                "login": "octocat",
                "email": null,
                "name": null,
                "avatar_url": "https://example.com/o.png"
            }),
        )
        .unwrap();

        assert_eq!(identity.provider_id, "42");
        assert_eq!(identity.email, None);
        assert_eq!(identity.display_name.as_deref(), Some("octocat"));
    }

    #[test]
    fn test_malformed_profile_is_rejected() {
        let result = normalize(Provider::Github, json!({ "login": "octocat" }));
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
