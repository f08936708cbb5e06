use std::sync::Arc;

use auth::TokenCodec;
use chrono::Duration;
use session_service::config::Config;
use session_service::config::StorageBackend;
use session_service::domain::session::ports::Clock;
use session_service::domain::session::ports::EventPublisher;
use session_service::domain::session::ports::Mailer;
use session_service::domain::session::ports::RefreshTokenRepository;
use session_service::domain::session::ports::SessionServicePort;
use session_service::domain::session::ports::UserRepository;
use session_service::domain::session::service::SessionService;
use session_service::domain::session::service::TemporaryTokenSettings;
use session_service::inbound::http::cookies::CookieSettings;
use session_service::inbound::http::router::create_router;
use session_service::outbound::clock::SystemClock;
use session_service::outbound::events::TracingEventPublisher;
use session_service::outbound::mail::HttpMailer;
use session_service::outbound::repositories::InMemoryUserRepository;
use session_service::outbound::repositories::PostgresRefreshTokenRepository;
use session_service::outbound::repositories::PostgresUserRepository;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "session_service=debug,session_events=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "session-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    // Secrets are never logged.
    tracing::info!(
        http_port = config.server.http_port,
        storage = ?config.storage.backend,
        access_ttl_minutes = config.jwt.access_ttl_minutes,
        refresh_ttl_days = config.jwt.refresh_ttl_days,
        temporary_ttl_minutes = config.tokens.temporary_ttl_minutes,
        secure_cookies = config.cookies.secure,
        "Configuration loaded"
    );

    let codec = TokenCodec::with_lifetimes(
        config.jwt.access_secret.as_bytes(),
        config.jwt.refresh_secret.as_bytes(),
        Duration::minutes(config.jwt.access_ttl_minutes),
        Duration::days(config.jwt.refresh_ttl_days),
    );
    let temporary = TemporaryTokenSettings {
        pepper: config.tokens.pepper.as_bytes().to_vec(),
        ttl: Duration::minutes(config.tokens.temporary_ttl_minutes),
    };
    let event_publisher = Arc::new(TracingEventPublisher::new());
    let mailer = Arc::new(HttpMailer::new(
        &config.mail,
        config.tokens.temporary_ttl_minutes,
    )?);
    let clock = Arc::new(SystemClock);

    let session_service: Arc<dyn SessionServicePort> = match config.storage.backend {
        StorageBackend::Postgres => {
            let pg_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(&config.database.url)
                .await?;
            tracing::info!(
                max_connections = config.database.max_connections,
                database = "postgresql",
                "Database connection pool created"
            );

            sqlx::migrate!("./migrations").run(&pg_pool).await?;
            tracing::info!(database = "postgresql", "Database migrations completed");

            build_service(
                Arc::new(PostgresUserRepository::new(pg_pool.clone())),
                Arc::new(PostgresRefreshTokenRepository::new(pg_pool)),
                event_publisher,
                mailer,
                clock,
                codec,
                temporary,
            )
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; state is lost on restart");
            let users = InMemoryUserRepository::new();
            let refresh_tokens = users.refresh_tokens();
            build_service(
                Arc::new(users),
                Arc::new(refresh_tokens),
                event_publisher,
                mailer,
                clock,
                codec,
                temporary,
            )
        }
    };

    spawn_refresh_token_purge(
        Arc::clone(&session_service),
        Duration::days(config.tokens.purge_grace_days),
        std::time::Duration::from_secs(config.tokens.purge_interval_minutes * 60),
    );

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(
        session_service,
        CookieSettings::new(
            config.cookies.secure,
            Duration::days(config.jwt.refresh_ttl_days),
        ),
        &config.oauth.callback_secret,
    );

    if let Err(e) = axum::serve(http_listener, http_application).await {
        tracing::error!(error = %e, "Server error");
        return Err(e.into());
    }

    tracing::info!("Server exited successfully");
    Ok(())
}

fn build_service<UR, RR, EP, ML, CL>(
    users: Arc<UR>,
    refresh_tokens: Arc<RR>,
    event_publisher: Arc<EP>,
    mailer: Arc<ML>,
    clock: Arc<CL>,
    codec: TokenCodec,
    temporary: TemporaryTokenSettings,
) -> Arc<dyn SessionServicePort>
where
    UR: UserRepository,
    RR: RefreshTokenRepository,
    EP: EventPublisher,
    ML: Mailer,
    CL: Clock,
{
    Arc::new(SessionService::new(
        users,
        refresh_tokens,
        event_publisher,
        mailer,
        clock,
        codec,
        temporary,
    ))
}

fn spawn_refresh_token_purge(
    session_service: Arc<dyn SessionServicePort>,
    grace: Duration,
    every: std::time::Duration,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = session_service.purge_expired_refresh_tokens(grace).await {
                tracing::warn!(error = %e, "Refresh token purge failed");
            }
        }
    });
}
