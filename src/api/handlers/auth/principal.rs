//! Authenticated principal extraction and authorization helpers.
//!
//! Flow Overview: `require_auth` reads the session cookie, validates it,
//! loads the user and resolves the effective role set once. The result is
//! stored as a typed `Principal` request extension that handlers take as an
//! extractor. Handlers never look the session up again.

use axum::{
    extract::{ConnectInfo, Extension, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{convert::Infallible, net::SocketAddr, sync::Arc};
use tracing::debug;

use super::{
    error::{AuthError, redirect_to_login},
    policy::EffectiveRoles,
    session::{Session, clear_session_cookie, extract_session_token},
    state::AuthState,
    storage::User,
    utils::client_key,
};

/// Authenticated user context for one request.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user: User,
    pub session: Session,
    pub roles: EffectiveRoles,
}

impl Principal {
    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.roles.is_preview()
    }

    /// # Errors
    /// `AuthError::Forbidden` unless the real user is an editor or admin and
    /// no preview is active.
    pub fn require_editor(&self) -> Result<(), AuthError> {
        if self.roles.is_editor() {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    /// # Errors
    /// `AuthError::Forbidden` unless the real user is an admin and no preview
    /// is active.
    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.roles.is_admin() {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    #[must_use]
    pub fn can_access_section(&self, required_role: &str) -> bool {
        self.roles.can_access_section(required_role)
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(AuthError::NotAuthenticated)
    }
}

/// Middleware guarding every route that needs a signed-in user.
///
/// Missing, unknown and expired sessions all redirect to `/login` and clear the
/// cookie. Store failures become a 500.
pub async fn require_auth(
    Extension(auth_state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let login_redirect = || {
        redirect_to_login(clear_session_cookie(auth_state.config()).ok())
    };

    let Some(token) = extract_session_token(request.headers()) else {
        return login_redirect();
    };

    let session = match auth_state.sessions().validate(&token).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            debug!("rejected missing or expired session");
            return login_redirect();
        }
        Err(err) => return AuthError::Internal(err).into_response(),
    };

    let user = match auth_state.store().user_by_id(session.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return login_redirect(),
        Err(err) => return AuthError::Internal(err).into_response(),
    };

    let roles = match auth_state.policy().effective_roles(&session).await {
        Ok(roles) => roles,
        Err(err) => return AuthError::Internal(err).into_response(),
    };

    request.extensions_mut().insert(Principal {
        user,
        session,
        roles,
    });
    next.run(request).await
}

/// Best-effort client address used to key the login throttle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl<S> FromRequestParts<S> for ClientKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(client_key(&parts.headers, peer)))
    }
}
