use crate::api::handlers::auth::{
    self, AuthConfig, AuthError, AuthState, ChallengeIssuer, PgStore, SystemClock,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;

pub mod email;
pub mod handlers;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

/// Build the application router.
///
/// `/login`, `/reset-password` and `/health` are public; everything else
/// passes through `require_auth` first.
#[must_use]
pub fn router(auth_state: Arc<AuthState>) -> Router {
    let protected = Router::new()
        .route("/", get(handlers::home))
        .route("/sections/{name}", get(handlers::section))
        .route("/logout", post(auth::login::logout))
        .route("/preview/start", post(auth::preview::start_preview))
        .route("/preview/stop", post(auth::preview::stop_preview))
        .route(
            "/admin/users/{id}/reset-password",
            post(auth::admin::send_reset_password),
        )
        .route_layer(middleware::from_fn(auth::require_auth));

    Router::new()
        .route(
            "/login",
            get(auth::login::login_page).post(auth::login::login),
        )
        .route(
            "/reset-password",
            get(auth::reset::reset_password_page).post(auth::reset::reset_password),
        )
        .route("/health", get(handlers::health))
        .merge(protected)
        .fallback(|| async { AuthError::NotFound })
        .layer(Extension(auth_state))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, auth_config: AuthConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let auth_state = Arc::new(AuthState::new(
        auth_config,
        Arc::new(PgStore::new(pool)),
        Arc::new(SystemClock),
        ChallengeIssuer::random()?,
        Arc::new(email::LogEmailSender),
    ));

    // Expired sessions and stale throttle records are swept off the request path.
    let sweeper = auth::spawn_sweeper(
        auth_state.sessions().clone(),
        auth_state.throttle().clone(),
        auth_state.config().session_sweep_interval(),
    );

    let app = router(auth_state).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {err}");
        }
        info!("Gracefully shutdown");
    })
    .await?;

    sweeper.abort();

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
