use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::cookie::CookieJar;
use axum_extra::extract::cookie::SameSite;

/// Name of the cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// The cookie is only sent to the auth routes.
pub const REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Attributes of the refresh-token cookie.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub secure: bool,
    pub max_age: time::Duration,
}

impl CookieSettings {
    pub fn new(secure: bool, refresh_ttl: chrono::Duration) -> Self {
        Self {
            secure,
            max_age: time::Duration::seconds(refresh_ttl.num_seconds()),
        }
    }
}

/// Store a refresh token in an HttpOnly cookie scoped to the auth routes.
pub fn with_refresh_token(jar: CookieJar, token: String, settings: &CookieSettings) -> CookieJar {
    let cookie = Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(settings.secure)
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .max_age(settings.max_age)
        .build();

    jar.add(cookie)
}

/// Expire the refresh-token cookie.
pub fn without_refresh_token(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(REFRESH_COOKIE).path(REFRESH_COOKIE_PATH))
}

pub fn refresh_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_cookie_attributes() {
        let settings = CookieSettings::new(true, chrono::Duration::days(7));
        let jar = with_refresh_token(CookieJar::new(), "raw".to_string(), &settings);

        let cookie = jar.get(REFRESH_COOKIE).unwrap();
        assert_eq!(cookie.value(), "raw");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some(REFRESH_COOKIE_PATH));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));
    }

    #[test]
    fn test_read_refresh_cookie() {
        let settings = CookieSettings::new(false, chrono::Duration::days(7));
        let jar = with_refresh_token(CookieJar::new(), "raw".to_string(), &settings);

        assert_eq!(refresh_token(&jar), Some("raw".to_string()));
        assert_eq!(refresh_token(&without_refresh_token(jar)), None);
    }
}
