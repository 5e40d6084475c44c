//! Auth configuration and the shared state handed to every handler.

use chrono::Duration;
use std::sync::Arc;

use super::{
    challenge::ChallengeIssuer,
    clock::Clock,
    policy::AuthorizationPolicy,
    reset::PasswordResetFlow,
    session::SessionManager,
    storage::Datastore,
    throttle::{DEFAULT_FAILURE_WINDOW_MINUTES, FailureTracker, LoginThrottle},
};
use crate::api::email::EmailSender;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 48 * 60 * 60;
const DEFAULT_SESSION_SWEEP_SECONDS: u64 = 60 * 60;
const DEFAULT_CHALLENGE_THRESHOLD: u32 = 3;
const DEFAULT_SITE_TITLE: &str = "Documentation";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    site_title: String,
    session_ttl_seconds: i64,
    reset_token_ttl_seconds: i64,
    session_sweep_seconds: u64,
    failure_window_minutes: i64,
    challenge_threshold: u32,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            site_title: DEFAULT_SITE_TITLE.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
            session_sweep_seconds: DEFAULT_SESSION_SWEEP_SECONDS,
            failure_window_minutes: DEFAULT_FAILURE_WINDOW_MINUTES,
            challenge_threshold: DEFAULT_CHALLENGE_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_site_title(mut self, title: String) -> Self {
        self.site_title = title;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_sweep_seconds(mut self, seconds: u64) -> Self {
        self.session_sweep_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_challenge_threshold(mut self, threshold: u32) -> Self {
        self.challenge_threshold = threshold;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn site_title(&self) -> &str {
        &self.site_title
    }

    #[must_use]
    pub fn session_sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_sweep_seconds.max(1))
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(super) fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    pub(super) fn failure_window_minutes(&self) -> i64 {
        self.failure_window_minutes
    }

    pub(super) fn challenge_threshold(&self) -> u32 {
        self.challenge_threshold
    }

    /// Only mark cookies secure when the site is served over HTTPS.
    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    store: Arc<dyn Datastore>,
    sessions: Arc<SessionManager>,
    throttle: Arc<dyn FailureTracker>,
    challenges: ChallengeIssuer,
    resets: PasswordResetFlow,
    policy: AuthorizationPolicy,
    email: Arc<dyn EmailSender>,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("challenges", &self.challenges)
            .finish_non_exhaustive()
    }
}

impl AuthState {
    /// Wire the auth components around one backing store and clock.
    pub fn new<S>(
        config: AuthConfig,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        challenges: ChallengeIssuer,
        email: Arc<dyn EmailSender>,
    ) -> Self
    where
        S: Datastore + 'static,
    {
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            clock.clone(),
            Duration::seconds(config.session_ttl_seconds()),
        ));
        let throttle: Arc<dyn FailureTracker> = Arc::new(LoginThrottle::new(
            clock.clone(),
            Duration::minutes(config.failure_window_minutes()),
        ));
        let resets = PasswordResetFlow::new(
            store.clone(),
            store.clone(),
            clock,
            Duration::seconds(config.reset_token_ttl_seconds()),
        );
        let policy = AuthorizationPolicy::new(store.clone());
        Self {
            config,
            store,
            sessions,
            throttle,
            challenges,
            resets,
            policy,
            email,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn Datastore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    #[must_use]
    pub fn throttle(&self) -> &Arc<dyn FailureTracker> {
        &self.throttle
    }

    pub(super) fn challenges(&self) -> &ChallengeIssuer {
        &self.challenges
    }

    pub(super) fn resets(&self) -> &PasswordResetFlow {
        &self.resets
    }

    pub(super) fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    pub(super) fn email(&self) -> &dyn EmailSender {
        self.email.as_ref()
    }

    /// Whether a login from `key` must answer a challenge first.
    pub(super) fn challenge_required(&self, key: &str) -> bool {
        self.throttle.current_count(key) >= self.config.challenge_threshold()
    }
}
