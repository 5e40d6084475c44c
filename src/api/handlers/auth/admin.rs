//! Admin-issued password resets.

use axum::{
    extract::{Extension, Path},
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{error::AuthError, principal::Principal, state::AuthState};
use crate::api::{email::EmailMessage, handlers::pages};

/// `POST /admin/users/{id}/reset-password`: issue a reset token and mail the link.
pub async fn send_reset_password(
    Extension(auth_state): Extension<Arc<AuthState>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Response, AuthError> {
    principal.require_admin()?;
    if !auth_state.policy().confirm_admin(principal.user.id).await? {
        return Err(AuthError::Forbidden);
    }

    let user_id = Uuid::parse_str(&id).map_err(|_| AuthError::NotFound)?;
    let user = auth_state
        .store()
        .user_by_id(user_id)
        .await?
        .ok_or(AuthError::NotFound)?;

    let token = auth_state.resets().request_reset(user.id).await?;
    let config = auth_state.config();
    let reset_url = format!("{}/reset-password?token={token}", config.base_url());
    let hours = auth_state.resets().ttl().num_hours();
    let site_title = config.site_title();

    let message = EmailMessage {
        to_email: user.email.clone(),
        subject: format!("[{site_title}] Reset your password"),
        body: format!(
            "Hello {},\r\n\r\n\
             An administrator of {site_title} has requested a password reset for your account.\r\n\r\n\
             Click the link below to set a new password:\r\n{reset_url}\r\n\r\n\
             This link expires in {hours} hours.\r\n\r\n\
             If you did not expect this email, you can safely ignore it.\r\n",
            user.firstname
        ),
    };
    auth_state.email().send(&message)?;

    info!(admin_id = %principal.user.id, %user_id, "password reset email sent");
    Ok(Html(pages::notice_page(
        site_title,
        "Reset link sent",
        &format!("A password reset link was sent to {}.", user.email),
    ))
    .into_response())
}
