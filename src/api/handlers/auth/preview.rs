//! Preview-as-role: let an editor see the site through another role set.

use axum::{
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{error::AuthError, principal::Principal, state::AuthState, types::StartPreviewForm};

fn redirect_home() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, HeaderValue::from_static("/"));
    (StatusCode::SEE_OTHER, headers).into_response()
}

/// Start previewing either as a specific user (`user_id`) or as a list of `roles`.
///
/// Requires real editor capability, which also rules out nesting previews.
pub async fn start_preview(
    Extension(auth_state): Extension<Arc<AuthState>>,
    principal: Principal,
    body: Bytes,
) -> Result<Response, AuthError> {
    principal.require_editor()?;

    let form = StartPreviewForm::parse(&body);
    let roles = match form.user_id {
        Some(raw) => {
            let user_id = Uuid::parse_str(&raw)
                .map_err(|_| AuthError::Validation("Invalid user id".to_string()))?;
            if auth_state.store().user_by_id(user_id).await?.is_none() {
                return Err(AuthError::NotFound);
            }
            auth_state.store().roles_for_user(user_id).await?
        }
        None => form.roles,
    };

    let attached = auth_state
        .sessions()
        .attach_preview_roles(&principal.session.token, &roles)
        .await?;
    if !attached {
        return Err(AuthError::NotAuthenticated);
    }
    info!(user_id = %principal.user.id, roles = ?roles, "preview started");
    Ok(redirect_home())
}

/// Leave preview mode. Allowed for any signed-in session.
pub async fn stop_preview(
    Extension(auth_state): Extension<Arc<AuthState>>,
    principal: Principal,
) -> Result<Response, AuthError> {
    auth_state
        .sessions()
        .clear_preview_roles(&principal.session.token)
        .await?;
    if principal.is_preview() {
        info!(user_id = %principal.user.id, "preview stopped");
    }
    Ok(redirect_home())
}
