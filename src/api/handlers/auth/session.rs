//! Session lifecycle: issue, validate, preview overrides, logout and sweep.
//!
//! Flow Overview:
//! 1) A successful login mints a 64-byte random token and stores only its
//!    SHA-256 digest with a fixed expiry.
//! 2) Every request resolves the cookie through `validate`; expired and
//!    unknown tokens both come back as `None`.
//! 3) Preview roles mutate the row in place, keeping token and expiry.
//! 4) A background task deletes expired rows and prunes the login throttle.

use anyhow::Result;
use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use super::{
    clock::Clock,
    state::AuthConfig,
    storage::SessionStore,
    throttle::FailureTracker,
    utils::{generate_token, hash_session_token, well_formed_token},
};

pub(crate) const SESSION_COOKIE_NAME: &str = "session_token";

/// A live session as seen by request handlers. `token` is the raw cookie value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub preview_roles: Option<Vec<String>>,
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint and persist a fresh session. Never reuses an existing token.
    ///
    /// # Errors
    /// Returns an error if the RNG or the store fails.
    #[instrument(skip(self))]
    pub async fn create_session(&self, user_id: Uuid) -> Result<Session> {
        let token = generate_token()?;
        let created_at = self.clock.now();
        let expires_at = created_at + self.ttl;
        self.store
            .create_session(&hash_session_token(&token), user_id, created_at, expires_at)
            .await?;
        debug!(%user_id, "session created");
        Ok(Session {
            token,
            user_id,
            created_at,
            expires_at,
            preview_roles: None,
        })
    }

    /// Resolve a token to its session. Unknown, malformed and expired tokens
    /// all return `Ok(None)`.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<Option<Session>> {
        if !well_formed_token(token) {
            return Ok(None);
        }
        let now = self.clock.now();
        let record = self
            .store
            .session_by_token_hash(&hash_session_token(token), now)
            .await?;
        // Expiry is checked here as well as in the store query.
        Ok(record
            .filter(|record| now < record.expires_at)
            .map(|record| Session {
                token: token.to_string(),
                user_id: record.user_id,
                created_at: record.created_at,
                expires_at: record.expires_at,
                preview_roles: record.preview_roles,
            }))
    }

    /// Delete the session. Deleting an absent token is not an error.
    ///
    /// # Errors
    /// Returns an error when the store fails.
    #[instrument(skip_all)]
    pub async fn invalidate(&self, token: &str) -> Result<()> {
        self.store.delete_session(&hash_session_token(token)).await
    }

    /// Delete every session owned by `user_id`, e.g. after a password change.
    ///
    /// # Errors
    /// Returns an error when the store fails.
    #[instrument(skip(self))]
    pub async fn invalidate_user(&self, user_id: Uuid) -> Result<u64> {
        self.store.delete_sessions_for_user(user_id).await
    }

    /// Returns false when the session no longer exists.
    ///
    /// # Errors
    /// Returns an error when the store fails.
    #[instrument(skip(self, token))]
    pub async fn attach_preview_roles(&self, token: &str, roles: &[String]) -> Result<bool> {
        self.store
            .set_preview_roles(&hash_session_token(token), roles)
            .await
    }

    /// # Errors
    /// Returns an error when the store fails.
    #[instrument(skip_all)]
    pub async fn clear_preview_roles(&self, token: &str) -> Result<()> {
        self.store
            .clear_preview_roles(&hash_session_token(token))
            .await
    }

    /// Delete every session past its expiry.
    ///
    /// # Errors
    /// Returns an error when the store fails.
    pub async fn sweep(&self) -> Result<u64> {
        self.store.delete_expired_sessions(self.clock.now()).await
    }
}

/// Run `sweep` and prune the throttle on a fixed interval until the runtime stops.
///
/// Failures are logged and the loop keeps going.
pub fn spawn_sweeper(
    sessions: Arc<SessionManager>,
    throttle: Arc<dyn FailureTracker>,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sessions.sweep().await {
                Ok(0) => debug!("session sweep found nothing to delete"),
                Ok(count) => info!(count, "deleted expired sessions"),
                Err(err) => error!("Failed to sweep expired sessions: {err:#}"),
            }
            let pruned = throttle.prune();
            if pruned > 0 {
                debug!(pruned, "pruned stale login failure records");
            }
        }
    })
}

/// Build the `HttpOnly` session cookie. `Max-Age` mirrors the session TTL.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            if key.trim() == SESSION_COOKIE_NAME {
                let val = val.trim();
                if !val.is_empty() {
                    return Some(val.to_string());
                }
            }
        }
    }
    None
}
