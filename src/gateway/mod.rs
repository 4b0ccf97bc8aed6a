//! Axum-based HTTP gateway for the login flow.
//!
//! Serves the login/register forms, the authenticated home page, and a
//! health probe, with body limits and request timeouts at the router
//! level. All session state lives in the injected [`SessionStore`]; the
//! handlers only translate its present/absent answers into pages,
//! redirects, and cookie headers.

pub mod pages;

use crate::config::Config;
use crate::session::{generate_session_id, SessionStore};
use crate::users::UserStore;
use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (16KB) — login forms are tiny
pub const MAX_BODY_SIZE: usize = 16_384;
/// Request timeout (30s) — prevents slow-loris abuse
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Sliding window used by credential rate limiting.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Name of the session cookie. Its value is the opaque session id and the
/// only wire-level contract with the browser.
pub const SESSION_COOKIE: &str = "uid";

/// How often the rate limiter sweeps stale client entries from its map.
const RATE_LIMITER_SWEEP_INTERVAL_SECS: u64 = 300; // 5 minutes

/// Per-client sliding-window limiter for credential submissions.
#[derive(Debug)]
pub struct CredentialRateLimiter {
    limit_per_window: u32,
    window: Duration,
    attempts: Mutex<(HashMap<String, Vec<Instant>>, Instant)>,
}

impl CredentialRateLimiter {
    fn new(limit_per_window: u32, window: Duration) -> Self {
        Self {
            limit_per_window,
            window,
            attempts: Mutex::new((HashMap::new(), Instant::now())),
        }
    }

    fn allow(&self, key: &str) -> bool {
        if self.limit_per_window == 0 {
            return true;
        }

        let now = Instant::now();
        let cutoff = now.checked_sub(self.window).unwrap_or_else(Instant::now);

        let mut guard = self.attempts.lock();
        let (attempts, last_sweep) = &mut *guard;

        // Periodic sweep: drop clients with no recent attempts
        if last_sweep.elapsed() >= Duration::from_secs(RATE_LIMITER_SWEEP_INTERVAL_SECS) {
            attempts.retain(|_, timestamps| {
                timestamps.retain(|t| *t > cutoff);
                !timestamps.is_empty()
            });
            *last_sweep = now;
        }

        let entry = attempts.entry(key.to_owned()).or_default();
        entry.retain(|instant| *instant > cutoff);

        if entry.len() >= self.limit_per_window as usize {
            return false;
        }

        entry.push(now);
        true
    }
}

/// Rate-limit key for a request: first forwarded-for hop when present
/// (reverse-proxy deployments), otherwise a shared local bucket.
fn client_key_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

// ── Cookie helpers ──────────────────────────────────────────────────

/// Extract the session id from the `Cookie` header, if present.
fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
    })
}

/// `Set-Cookie` value that installs a session id. Session-scoped (no
/// Max-Age): the server-side TTL is authoritative.
fn set_session_cookie(id: &str) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}

/// `Set-Cookie` value that clears the session cookie.
fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

// ── State & startup ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub sessions: Arc<SessionStore>,
    /// Whether new user registration is allowed.
    pub allow_registration: bool,
    /// Maximum registered users (0 = unlimited).
    pub max_users: u64,
    pub rate_limiter: Arc<CredentialRateLimiter>,
}

/// Run the HTTP gateway.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_port = listener.local_addr()?.port();

    let data_dir = config.resolve_data_dir()?;
    let db_path = data_dir.join("users.db");
    let users = Arc::new(UserStore::open(&db_path)?);
    tracing::info!("Account store initialized at {}", db_path.display());

    let sessions = Arc::new(SessionStore::new(
        Some(config.session.ttl_secs),
        config.session.sweep_interval_secs,
    ));

    let state = AppState {
        users,
        sessions,
        allow_registration: config.auth.allow_registration,
        max_users: config.auth.max_users,
        rate_limiter: Arc::new(CredentialRateLimiter::new(
            config.gateway.credential_attempts_per_minute,
            Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
        )),
    };

    let app = router(state);

    tracing::info!("Gateway listening on http://{host}:{actual_port}");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router with middleware. Split from [`run_gateway`] so tests
/// can construct it against in-memory state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_home))
        .route("/login", get(handle_login_page))
        .route("/login", post(handle_login_submit))
        .route("/register", get(handle_register_page))
        .route("/register", post(handle_register_submit))
        .route("/logout", get(handle_logout))
        .route("/health", get(handle_health))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

// ── Handlers ────────────────────────────────────────────────────────

/// Form body for POST /login.
#[derive(Debug, serde::Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Form body for POST /register.
#[derive(Debug, serde::Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// GET / — resolve the session cookie and render the home page, or send
/// the browser back to login. A cookie the store no longer recognizes is
/// cleared on the way out.
async fn handle_home(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match session_cookie(&headers) {
        Some(id) => match state.sessions.get(id) {
            Some(user) => Html(pages::render_home_page(&user, id)).into_response(),
            None => (
                [(header::SET_COOKIE, clear_session_cookie())],
                Redirect::to("/login"),
            )
                .into_response(),
        },
        None => Redirect::to("/login").into_response(),
    }
}

/// GET /login
async fn handle_login_page() -> Html<String> {
    Html(pages::render_login_page(None))
}

/// POST /login — check credentials, mint a session, set the cookie.
async fn handle_login_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    if !state.rate_limiter.allow(&client_key_from_headers(&headers)) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Html(pages::render_login_page(Some(
                "Too many attempts. Try again in a minute.",
            ))),
        )
            .into_response();
    }

    if form.email.trim().is_empty() || form.password.is_empty() {
        return Html(pages::render_login_page(Some("All fields are required"))).into_response();
    }

    let user = match state.users.authenticate(&form.email, &form.password) {
        Ok(u) => u,
        Err(_) => {
            return Html(pages::render_login_page(Some("Invalid email or password")))
                .into_response();
        }
    };

    tracing::info!(user_id = %user.id, "Login successful");
    start_session(&state, user)
}

/// GET /register
async fn handle_register_page() -> Html<String> {
    Html(pages::render_register_page(None))
}

/// POST /register — create the account and log it straight in.
async fn handle_register_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<RegisterForm>,
) -> Response {
    if !state.allow_registration {
        return Html(pages::render_register_page(Some(
            "Registration is currently disabled.",
        )))
        .into_response();
    }

    if !state.rate_limiter.allow(&client_key_from_headers(&headers)) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Html(pages::render_register_page(Some(
                "Too many attempts. Try again in a minute.",
            ))),
        )
            .into_response();
    }

    if form.name.trim().is_empty() || form.email.trim().is_empty() || form.password.is_empty() {
        return Html(pages::render_register_page(Some("All fields are required")))
            .into_response();
    }

    // Enforce max_users limit (0 = unlimited)
    if state.max_users > 0 {
        if let Ok(count) = state.users.user_count() {
            if count >= state.max_users {
                return Html(pages::render_register_page(Some(
                    "Maximum user limit reached.",
                )))
                .into_response();
            }
        }
    }

    let user = match state.users.register(&form.name, &form.email, &form.password) {
        Ok(u) => u,
        Err(e) => {
            return Html(pages::render_register_page(Some(&e.to_string()))).into_response();
        }
    };

    tracing::info!(user_id = %user.id, "Account created");
    start_session(&state, user)
}

/// GET /logout — drop the server-side session entry and clear the cookie.
async fn handle_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_cookie(&headers) {
        if state.sessions.remove(id) {
            tracing::debug!("Session removed on logout");
        }
    }
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to("/login"),
    )
        .into_response()
}

/// GET /health — always public (no secrets leaked)
async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "users": state.users.user_count().unwrap_or(0),
        "active_sessions": state.sessions.len(),
    }))
}

/// Mint a fresh session id, record it, and send the browser home with the
/// cookie set. Shared tail of the login and register success paths.
fn start_session(state: &AppState, user: crate::users::UserRecord) -> Response {
    let id = generate_session_id();
    state.sessions.insert(&id, user);
    (
        [(header::SET_COOKIE, set_session_cookie(&id))],
        Redirect::to("/"),
    )
        .into_response()
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn security_body_limit_is_16kb() {
        assert_eq!(MAX_BODY_SIZE, 16_384);
    }

    #[test]
    fn security_timeout_is_30_seconds() {
        assert_eq!(REQUEST_TIMEOUT_SECS, 30);
    }

    #[test]
    fn app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    fn cookie_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn session_cookie_parses_single_cookie() {
        let headers = cookie_headers("uid=abc123");
        assert_eq!(session_cookie(&headers), Some("abc123"));
    }

    #[test]
    fn session_cookie_parses_among_other_cookies() {
        let headers = cookie_headers("theme=dark; uid=abc123; lang=en");
        assert_eq!(session_cookie(&headers), Some("abc123"));
    }

    #[test]
    fn session_cookie_absent_without_header() {
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn session_cookie_ignores_empty_value() {
        let headers = cookie_headers("uid=");
        assert_eq!(session_cookie(&headers), None);
    }

    #[test]
    fn session_cookie_ignores_other_names() {
        let headers = cookie_headers("uuid=abc123; fluid=x");
        assert_eq!(session_cookie(&headers), None);
    }

    #[test]
    fn set_cookie_is_http_only_same_site() {
        let value = set_session_cookie("abc123");
        assert!(value.starts_with("uid=abc123"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Path=/"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let value = clear_session_cookie();
        assert!(value.starts_with("uid=;"));
        assert!(value.contains("Max-Age=0"));
    }

    #[test]
    fn rate_limiter_blocks_after_limit() {
        let limiter = CredentialRateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.allow("1.2.3.4"));
        assert!(limiter.allow("1.2.3.4"));
        assert!(limiter.allow("1.2.3.4"));
        assert!(!limiter.allow("1.2.3.4"));
        // Other clients are unaffected
        assert!(limiter.allow("5.6.7.8"));
    }

    #[test]
    fn rate_limiter_zero_limit_always_allows() {
        let limiter = CredentialRateLimiter::new(0, Duration::from_secs(60));
        for _ in 0..100 {
            assert!(limiter.allow("1.2.3.4"));
        }
    }

    #[test]
    fn client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("9.9.9.9, 10.0.0.1"),
        );
        assert_eq!(client_key_from_headers(&headers), "9.9.9.9");
        assert_eq!(client_key_from_headers(&HeaderMap::new()), "local");
    }

    #[test]
    fn login_form_requires_both_fields() {
        let ok: Result<LoginForm, _> = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "password": "secret"
        }));
        assert!(ok.is_ok());

        let missing: Result<LoginForm, _> = serde_json::from_value(serde_json::json!({
            "email": "a@x.com"
        }));
        assert!(missing.is_err());
    }

    #[test]
    fn register_form_requires_all_fields() {
        let ok: Result<RegisterForm, _> = serde_json::from_value(serde_json::json!({
            "name": "Alice",
            "email": "a@x.com",
            "password": "longenough"
        }));
        assert!(ok.is_ok());

        let missing: Result<RegisterForm, _> = serde_json::from_value(serde_json::json!({
            "name": "Alice",
            "password": "longenough"
        }));
        assert!(missing.is_err());
    }
}
