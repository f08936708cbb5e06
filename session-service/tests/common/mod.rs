#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use auth::TokenCodec;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use session_service::domain::session::errors::MailerError;
use session_service::domain::session::models::EmailAddress;
use session_service::domain::session::models::Role;
use session_service::domain::session::models::UserId;
use session_service::domain::session::ports::Clock;
use session_service::domain::session::ports::Mailer;
use session_service::domain::session::ports::SessionServicePort;
use session_service::domain::session::ports::UserRepository;
use session_service::domain::session::service::SessionService;
use session_service::domain::session::service::TemporaryTokenSettings;
use session_service::inbound::http::cookies::CookieSettings;
use session_service::inbound::http::cookies::REFRESH_COOKIE;
use session_service::inbound::http::router::create_router;
use session_service::outbound::events::TracingEventPublisher;
use session_service::outbound::repositories::InMemoryRefreshTokenRepository;
use session_service::outbound::repositories::InMemoryUserRepository;

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-key-at-least-32-bytes";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-key-at-least-32-bytes";
pub const PEPPER: &[u8] = b"test-temporary-token-pepper-32-bytes!";
pub const CALLBACK_SECRET: &str = "test-oauth-callback-secret-at-least-32-bytes";
pub const PASSWORD: &str = "Sup3r$ecret";

pub type TestSessionService = SessionService<
    InMemoryUserRepository,
    InMemoryRefreshTokenRepository,
    TracingEventPublisher,
    RecordingMailer,
    ManualClock,
>;

/// Test application that spawns a real server over the in-memory store
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub service: Arc<TestSessionService>,
    pub users: Arc<InMemoryUserRepository>,
    pub mailer: Arc<RecordingMailer>,
    pub clock: Arc<ManualClock>,
    pub codec: TokenCodec,
    /// Keeps the refresh cookie between requests
    pub api_client: reqwest::Client,
    /// No cookie store; used to present a specific refresh token
    pub bare_client: reqwest::Client,
}

impl TestApp {
    /// Spawn the application in a background task and return TestApp
    pub async fn spawn() -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let users = Arc::new(InMemoryUserRepository::new());
        let refresh_tokens = Arc::new(users.refresh_tokens());
        let mailer = Arc::new(RecordingMailer::default());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let service = Arc::new(SessionService::new(
            Arc::clone(&users),
            refresh_tokens,
            Arc::new(TracingEventPublisher::new()),
            Arc::clone(&mailer),
            Arc::clone(&clock),
            TokenCodec::new(ACCESS_SECRET, REFRESH_SECRET),
            TemporaryTokenSettings::new(PEPPER),
        ));

        let router = create_router(
            Arc::clone(&service) as Arc<dyn SessionServicePort>,
            CookieSettings::new(false, Duration::days(7)),
            CALLBACK_SECRET,
        );

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Server error");
        });

        Self {
            address,
            port,
            service,
            users,
            mailer,
            clock,
            codec: TokenCodec::new(ACCESS_SECRET, REFRESH_SECRET),
            api_client: reqwest::Client::builder()
                .cookie_store(true)
                .build()
                .expect("Failed to create reqwest client"),
            bare_client: reqwest::Client::new(),
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(&format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(&format!("{}{}", self.address, path))
    }

    /// Helper to make GET request with Bearer token
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    /// Helper to make POST request with Bearer token
    pub fn post_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.post(path).bearer_auth(token)
    }

    /// Helper to make POST request carrying exactly the given refresh token
    pub fn post_with_refresh_cookie(&self, path: &str, refresh_token: &str) -> reqwest::RequestBuilder {
        self.bare_client
            .post(&format!("{}{}", self.address, path))
            .header(
                reqwest::header::COOKIE,
                format!("{}={}", REFRESH_COOKIE, refresh_token),
            )
    }

    /// Register through the API and return the response body
    pub async fn register(&self, email: &str, username: &str) -> serde_json::Value {
        let response = self
            .post("/api/auth/register")
            .json(&serde_json::json!({
                "email": email,
                "username": username,
                "password": PASSWORD,
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), 201);

        response.json().await.expect("Failed to parse response")
    }

    /// Force a role change directly in the store; the user's refresh tokens are revoked
    pub async fn set_role(&self, user_id: &str, role: Role) {
        let user_id = UserId::from_string(user_id).expect("Invalid user id");
        self.users
            .update_role(&user_id, role, self.clock.now())
            .await
            .expect("Failed to update role")
            .expect("User not found");
    }
}

/// Extract the refresh token set by a response, if any
pub fn refresh_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .cookies()
        .find(|cookie| cookie.name() == REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

/// Clock the tests move by hand
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    EmailVerification,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub kind: MailKind,
    pub to: String,
    pub token: String,
}

/// Mailer that keeps every raw token it was asked to deliver
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn last_token(&self, kind: MailKind, to: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|mail| mail.kind == kind && mail.to == to)
            .map(|mail| mail.token.clone())
    }

    pub fn last_verification_token(&self, to: &str) -> Option<String> {
        self.last_token(MailKind::EmailVerification, to)
    }

    pub fn last_reset_token(&self, to: &str) -> Option<String> {
        self.last_token(MailKind::PasswordReset, to)
    }

    fn record(&self, kind: MailKind, to: &EmailAddress, token: &str) {
        self.sent.lock().unwrap().push(SentMail {
            kind,
            to: to.as_str().to_string(),
            token: token.to_string(),
        });
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_email_verification(
        &self,
        to: &EmailAddress,
        _name: &str,
        token: &str,
    ) -> Result<(), MailerError> {
        self.record(MailKind::EmailVerification, to, token);
        Ok(())
    }

    async fn send_password_reset(
        &self,
        to: &EmailAddress,
        _name: &str,
        token: &str,
    ) -> Result<(), MailerError> {
        self.record(MailKind::PasswordReset, to, token);
        Ok(())
    }
}
