//! Login and logout.
//!
//! Flow Overview:
//! 1) Missing fields are a validation error and do not count as a failure.
//! 2) Once the client address has reached the challenge threshold, the signed
//!    arithmetic answer is checked before the password.
//! 3) Every failed challenge, unknown email or wrong password counts one
//!    failure and yields the same generic message. Unknown emails still run a
//!    password verification so timing does not reveal which accounts exist.
//! 4) Success clears the failure record and mints a brand-new session.

use axum::{
    Form,
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode, header::LOCATION, header::SET_COOKIE},
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::{
    error::AuthError,
    password::{dummy_verify, verify_password},
    principal::{ClientKey, Principal},
    session::{clear_session_cookie, session_cookie},
    state::AuthState,
    storage::User,
    types::LoginForm,
    utils::normalize_email,
};
use crate::api::handlers::pages::{LoginView, login_page as render_login};

pub async fn login_page(
    Extension(auth_state): Extension<Arc<AuthState>>,
    ClientKey(key): ClientKey,
) -> Response {
    render_login_response(&auth_state, &key, StatusCode::OK, "", None)
}

#[instrument(skip_all, fields(client = %key))]
pub async fn login(
    Extension(auth_state): Extension<Arc<AuthState>>,
    ClientKey(key): ClientKey,
    Form(form): Form<LoginForm>,
) -> Response {
    let user = match authenticate(&auth_state, &key, &form).await {
        Ok(user) => user,
        Err(AuthError::Internal(err)) => return AuthError::Internal(err).into_response(),
        Err(err) => {
            return render_login_response(
                &auth_state,
                &key,
                err.status(),
                &form.email,
                Some(err.user_message()),
            );
        }
    };

    let session = match auth_state.sessions().create_session(user.id).await {
        Ok(session) => session,
        Err(err) => return AuthError::Internal(err).into_response(),
    };

    if let Err(err) = auth_state.store().update_last_login(user.id).await {
        error!("Failed to update last login: {err:#}");
    }

    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, HeaderValue::from_static("/"));
    match session_cookie(auth_state.config(), &session.token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            return AuthError::Internal(anyhow::anyhow!("invalid session cookie: {err}"))
                .into_response();
        }
    }
    info!(user_id = %user.id, "login succeeded");
    (StatusCode::SEE_OTHER, headers).into_response()
}

/// Run the throttle, challenge and credential checks for one attempt.
async fn authenticate(
    auth_state: &AuthState,
    key: &str,
    form: &LoginForm,
) -> Result<User, AuthError> {
    let email = normalize_email(&form.email);
    if email.is_empty() || form.password.is_empty() {
        return Err(AuthError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let throttle = auth_state.throttle();
    if auth_state.challenge_required(key)
        && !auth_state
            .challenges()
            .verify(&form.challenge_answer, &form.challenge_token)
    {
        let count = throttle.record_failure(key);
        warn!(count, "login challenge failed");
        return Err(AuthError::InvalidCredentials);
    }

    let user = auth_state.store().user_by_email(&email).await?;
    let password = form.password.clone();
    let stored_hash = user.as_ref().map(|user| user.password_hash.clone());
    let verified = tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => verify_password(&password, &hash),
        None => {
            dummy_verify(&password);
            false
        }
    })
    .await
    .map_err(|err| AuthError::Internal(anyhow::anyhow!("password check panicked: {err}")))?;

    match user {
        Some(user) if verified => {
            throttle.clear_failures(key);
            Ok(user)
        }
        _ => {
            let count = throttle.record_failure(key);
            warn!(count, "login failed");
            Err(AuthError::InvalidCredentials)
        }
    }
}

fn render_login_response(
    auth_state: &AuthState,
    key: &str,
    status: StatusCode,
    email: &str,
    error: Option<&str>,
) -> Response {
    let challenge = auth_state
        .challenge_required(key)
        .then(|| auth_state.challenges().generate());
    let html = render_login(&LoginView {
        site_title: auth_state.config().site_title(),
        email,
        error,
        challenge: challenge.as_ref(),
    });
    (status, Html(html)).into_response()
}

pub async fn logout(
    Extension(auth_state): Extension<Arc<AuthState>>,
    principal: Principal,
) -> Response {
    if let Err(err) = auth_state.sessions().invalidate(&principal.session.token).await {
        error!("Failed to delete session: {err:#}");
    }

    // Always clear the cookie, even if the delete failed.
    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, HeaderValue::from_static("/login"));
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::SEE_OTHER, headers).into_response()
}
