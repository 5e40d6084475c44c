//! Section listing and the per-section access gate.

use axum::{
    extract::{Extension, Path},
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::{
    auth::{AuthError, AuthState, Principal},
    pages,
};

/// `GET /`: every section, marked accessible or not for the effective roles.
pub async fn home(
    Extension(auth_state): Extension<Arc<AuthState>>,
    principal: Principal,
) -> Result<Response, AuthError> {
    let sections = auth_state
        .store()
        .list_sections()
        .await?
        .into_iter()
        .map(|section| {
            let accessible = principal.can_access_section(&section.required_role);
            (section, accessible)
        })
        .collect::<Vec<_>>();

    Ok(Html(pages::home_page(
        auth_state.config().site_title(),
        &principal,
        &sections,
    ))
    .into_response())
}

/// `GET /sections/{name}`: 404 for unknown sections, 403 when the role gate denies.
pub async fn section(
    Extension(auth_state): Extension<Arc<AuthState>>,
    principal: Principal,
    Path(name): Path<String>,
) -> Result<Response, AuthError> {
    let section = auth_state
        .store()
        .section_by_name(&name)
        .await?
        .ok_or(AuthError::NotFound)?;

    if !principal.can_access_section(&section.required_role) {
        debug!(section = %section.name, user_id = %principal.user.id, "section access denied");
        return Err(AuthError::Forbidden);
    }

    Ok(Html(pages::section_page(
        auth_state.config().site_title(),
        &principal,
        &section,
    ))
    .into_response())
}
