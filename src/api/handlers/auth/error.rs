//! Boundary errors for the auth handlers.
//!
//! Credential and authorization failures are absorbed here and turned into one
//! of a handful of generic outcomes; only store failures surface as 500s, and
//! their details stay in the logs.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header::LOCATION, header::SET_COOKIE},
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use super::session::SESSION_COOKIE_NAME;
use crate::api::handlers::pages;

pub(crate) const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
pub(crate) const INVALID_RESET_MESSAGE: &str = "This reset link has expired or is invalid";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("access denied")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("invalid or expired reset token")]
    InvalidResetToken,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidResetToken => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::NotAuthenticated => StatusCode::SEE_OTHER,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to show the user.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Validation(message) => message,
            Self::InvalidCredentials => INVALID_CREDENTIALS_MESSAGE,
            Self::Forbidden => "You do not have permission to view this page.",
            Self::NotFound => "The page you requested does not exist.",
            Self::NotAuthenticated => "Please sign in.",
            Self::InvalidResetToken => INVALID_RESET_MESSAGE,
            Self::Internal(_) => "Something went wrong. Please try again later.",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated => redirect_to_login(None),
            Self::Internal(ref err) => {
                error!("Internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(pages::error_page("Server Error", self.user_message())),
                )
                    .into_response()
            }
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                Html(pages::error_page("Access Denied", self.user_message())),
            )
                .into_response(),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Html(pages::error_page("Not Found", self.user_message())),
            )
                .into_response(),
            other => (
                other.status(),
                Html(pages::error_page("Error", other.user_message())),
            )
                .into_response(),
        }
    }
}

/// 303 to `/login`, clearing the session cookie.
///
/// `clear_cookie` lets callers that know the deployment scheme pass a cookie
/// with matching attributes; otherwise a plain expiring cookie is sent.
pub(crate) fn redirect_to_login(clear_cookie: Option<HeaderValue>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, HeaderValue::from_static("/login"));
    let cookie = clear_cookie.or_else(|| {
        HeaderValue::from_str(&format!(
            "{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        ))
        .ok()
    });
    if let Some(cookie) = cookie {
        headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::SEE_OTHER, headers).into_response()
}

/// Outcome of `PasswordResetFlow::consume_reset`.
#[derive(Debug, Error)]
pub enum ResetError {
    #[error("invalid or expired reset token")]
    InvalidToken,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ResetError> for AuthError {
    fn from(err: ResetError) -> Self {
        match err {
            ResetError::InvalidToken => Self::InvalidResetToken,
            ResetError::Internal(err) => Self::Internal(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn statuses_follow_error_table() {
        assert_eq!(
            AuthError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::NotAuthenticated.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            AuthError::Internal(anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_authenticated_redirects_and_clears_cookie() {
        let response = AuthError::NotAuthenticated.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("session_token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn internal_errors_never_leak_details() {
        let err = AuthError::Internal(anyhow!("password column missing"));
        assert!(!err.user_message().contains("password column"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn reset_errors_map_to_generic_outcome() {
        let err: AuthError = ResetError::InvalidToken.into();
        assert!(matches!(err, AuthError::InvalidResetToken));
        assert_eq!(err.user_message(), INVALID_RESET_MESSAGE);
    }
}
