use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::cookies::CookieSettings;
use super::handlers::assign_role::assign_role;
use super::handlers::change_password::change_password;
use super::handlers::current_user::current_user;
use super::handlers::forgot_password::forgot_password;
use super::handlers::health::health;
use super::handlers::login::login;
use super::handlers::logout::logout;
use super::handlers::logout_all::logout_all;
use super::handlers::oauth_callback::oauth_callback;
use super::handlers::refresh::refresh;
use super::handlers::register::register;
use super::handlers::resend_email_verification::resend_email_verification;
use super::handlers::reset_password::reset_password;
use super::handlers::verify_email::verify_email;
use super::middleware::authenticate as auth_middleware;
use crate::session::ports::SessionServicePort;

#[derive(Clone)]
pub struct AppState {
    pub session_service: Arc<dyn SessionServicePort>,
    pub cookies: CookieSettings,
    pub oauth_callback_secret: Arc<str>,
}

pub fn create_router(
    session_service: Arc<dyn SessionServicePort>,
    cookies: CookieSettings,
    oauth_callback_secret: &str,
) -> Router {
    let state = AppState {
        session_service,
        cookies,
        oauth_callback_secret: Arc::from(oauth_callback_secret),
    };

    let public_routes = Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/verify-email/:token", get(verify_email))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password/:token", post(reset_password))
        .route("/api/auth/oauth/:provider/callback", post(oauth_callback))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/api/auth/current-user", get(current_user))
        .route("/api/auth/logout-all", post(logout_all))
        .route("/api/auth/change-password", post(change_password))
        .route(
            "/api/auth/resend-email-verification",
            post(resend_email_verification),
        )
        .route("/api/auth/assign-role/:user_id", post(assign_role))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            // Only the route template is recorded: paths and headers can carry secrets.
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                route = route(request),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                route = route(request),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn route(request: &Request<Body>) -> &str {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("unmatched")
}
