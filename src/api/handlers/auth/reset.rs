//! Single-use password reset tokens.
//!
//! Tokens are 64 random bytes, hex encoded, and stored as plaintext. Issuing a
//! token removes every earlier token for the same user, and consuming one
//! removes them all again.

use anyhow::Result;
use axum::{
    Form,
    extract::{Extension, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::Duration;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::{
    clock::Clock,
    error::{AuthError, ResetError},
    password::{MIN_PASSWORD_LENGTH, hash_password},
    state::AuthState,
    storage::{ResetTokenRecord, ResetTokenStore, UserDirectory},
    types::{ResetPasswordForm, ResetPasswordQuery},
    utils::{generate_token, well_formed_token},
};
use crate::api::handlers::pages;

pub struct PasswordResetFlow {
    tokens: Arc<dyn ResetTokenStore>,
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl std::fmt::Debug for PasswordResetFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordResetFlow")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl PasswordResetFlow {
    pub fn new(
        tokens: Arc<dyn ResetTokenStore>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            tokens,
            users,
            clock,
            ttl,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace any outstanding tokens for `user_id` with a new one.
    ///
    /// # Errors
    /// Returns an error if the RNG or the store fails.
    #[instrument(skip(self))]
    pub async fn request_reset(&self, user_id: Uuid) -> Result<String> {
        let removed = self.tokens.delete_reset_tokens_for_user(user_id).await?;
        let token = generate_token()?;
        let created_at = self.clock.now();
        self.tokens
            .create_reset_token(&ResetTokenRecord {
                token: token.clone(),
                user_id,
                expires_at: created_at + self.ttl,
                created_at,
            })
            .await?;
        info!(%user_id, superseded = removed, "password reset token issued");
        Ok(token)
    }

    /// Owner of a still-valid token, without consuming it.
    ///
    /// # Errors
    /// Returns an error when the store fails.
    #[instrument(skip_all)]
    pub async fn peek(&self, token: &str) -> Result<Option<Uuid>> {
        if !well_formed_token(token) {
            return Ok(None);
        }
        let record = self.tokens.reset_token(token, self.clock.now()).await?;
        Ok(record.map(|record| record.user_id))
    }

    /// Spend `token` on a new credential hash and return the user it belonged to.
    ///
    /// The token is taken before the hash is written. A failed write leaves the
    /// old password in place and the token spent, so the user needs a new link.
    ///
    /// # Errors
    /// `ResetError::InvalidToken` for unknown or expired tokens, with no
    /// distinction between the two; `ResetError::Internal` for store failures.
    #[instrument(skip_all)]
    pub async fn consume_reset(
        &self,
        token: &str,
        new_password_hash: &str,
    ) -> Result<Uuid, ResetError> {
        if !well_formed_token(token) {
            return Err(ResetError::InvalidToken);
        }
        let record = self
            .tokens
            .take_reset_token(token, self.clock.now())
            .await?
            .ok_or(ResetError::InvalidToken)?;
        self.users
            .update_password_hash(record.user_id, new_password_hash)
            .await?;
        self.tokens
            .delete_reset_tokens_for_user(record.user_id)
            .await?;
        info!(user_id = %record.user_id, "password reset consumed");
        Ok(record.user_id)
    }
}

fn reset_form_response(
    auth_state: &AuthState,
    status: StatusCode,
    token: Option<&str>,
    error: Option<&str>,
) -> Response {
    let html = pages::reset_password_page(auth_state.config().site_title(), token, error);
    (status, Html(html)).into_response()
}

/// `GET /reset-password?token=..`: show the form for a live token.
pub async fn reset_password_page(
    Extension(auth_state): Extension<Arc<AuthState>>,
    Query(query): Query<ResetPasswordQuery>,
) -> Result<Response, AuthError> {
    match auth_state.resets().peek(&query.token).await? {
        Some(_) => Ok(reset_form_response(
            &auth_state,
            StatusCode::OK,
            Some(&query.token),
            None,
        )),
        None => Ok(invalid_token_response(&auth_state)),
    }
}

fn invalid_token_response(auth_state: &AuthState) -> Response {
    let err = AuthError::InvalidResetToken;
    reset_form_response(auth_state, err.status(), None, Some(err.user_message()))
}

/// `POST /reset-password`: set the new password, then sign the user out everywhere.
pub async fn reset_password(
    Extension(auth_state): Extension<Arc<AuthState>>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, AuthError> {
    if auth_state.resets().peek(&form.token).await?.is_none() {
        return Ok(invalid_token_response(&auth_state));
    }

    let validation = if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        Some(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ))
    } else if form.password != form.confirm_password {
        Some("Passwords do not match".to_string())
    } else {
        None
    };
    if let Some(message) = validation {
        let err = AuthError::Validation(message);
        return Ok(reset_form_response(
            &auth_state,
            err.status(),
            Some(&form.token),
            Some(err.user_message()),
        ));
    }

    let password = form.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| AuthError::Internal(anyhow::anyhow!("password hashing panicked: {err}")))??;

    let user_id = match auth_state
        .resets()
        .consume_reset(&form.token, &password_hash)
        .await
    {
        Ok(user_id) => user_id,
        Err(ResetError::InvalidToken) => return Ok(invalid_token_response(&auth_state)),
        Err(err) => return Err(err.into()),
    };

    // A password change ends every existing session for the account.
    if let Err(err) = auth_state.sessions().invalidate_user(user_id).await {
        error!("Failed to delete sessions after password reset: {err:#}");
    }

    Ok(Html(pages::notice_page(
        auth_state.config().site_title(),
        "Password updated",
        "Your password has been changed. You can now sign in with your new password.",
    ))
    .into_response())
}
