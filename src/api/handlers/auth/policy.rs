//! Role resolution and the authorization gates.
//!
//! A request is evaluated against its *effective* role set: the session's
//! preview override when one is attached, otherwise the user's assigned roles.
//!
//! Rules:
//! - Real roles: `admin` implies every other role, `editor` included.
//! - Preview roles: taken literally. The admin bypass is off, and the editor
//!   and admin gates always fail, whatever the real user holds. A previewing
//!   session can never be used to re-escalate.
//! - An empty required role means the section is unrestricted.

use anyhow::Result;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{session::Session, storage::UserDirectory};

pub const ADMIN_ROLE: &str = "admin";
pub const EDITOR_ROLE: &str = "editor";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EffectiveRoles {
    Real(Vec<String>),
    Preview(Vec<String>),
}

impl EffectiveRoles {
    #[must_use]
    pub fn is_preview(&self) -> bool {
        matches!(self, Self::Preview(_))
    }

    #[must_use]
    pub fn roles(&self) -> &[String] {
        match self {
            Self::Real(roles) | Self::Preview(roles) => roles,
        }
    }

    fn contains(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r == role)
    }

    /// Role membership with the admin bypass applied to real sessions only.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        match self {
            Self::Real(_) => self.contains(ADMIN_ROLE) || self.contains(role),
            Self::Preview(_) => self.contains(role),
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        !self.is_preview() && self.contains(ADMIN_ROLE)
    }

    #[must_use]
    pub fn is_editor(&self) -> bool {
        !self.is_preview() && self.has_role(EDITOR_ROLE)
    }

    #[must_use]
    pub fn can_access_section(&self, required_role: &str) -> bool {
        required_role.is_empty() || self.has_role(required_role)
    }
}

/// Resolves effective roles for a session.
pub struct AuthorizationPolicy {
    users: Arc<dyn UserDirectory>,
}

impl std::fmt::Debug for AuthorizationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationPolicy").finish_non_exhaustive()
    }
}

impl AuthorizationPolicy {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    /// # Errors
    /// Returns an error when the user directory fails.
    #[instrument(skip_all, fields(user_id = %session.user_id))]
    pub async fn effective_roles(&self, session: &Session) -> Result<EffectiveRoles> {
        match &session.preview_roles {
            Some(roles) => Ok(EffectiveRoles::Preview(roles.clone())),
            None => Ok(EffectiveRoles::Real(
                self.users.roles_for_user(session.user_id).await?,
            )),
        }
    }

    /// Directory-backed admin check for admin actions.
    ///
    /// # Errors
    /// Returns an error when the user directory fails.
    #[instrument(skip(self))]
    pub async fn confirm_admin(&self, user_id: Uuid) -> Result<bool> {
        self.users.has_role(user_id, ADMIN_ROLE).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::memory::MemoryStore;
    use super::*;
    use chrono::{Duration, Utc};

    fn real(roles: &[&str]) -> EffectiveRoles {
        EffectiveRoles::Real(roles.iter().map(ToString::to_string).collect())
    }

    fn preview(roles: &[&str]) -> EffectiveRoles {
        EffectiveRoles::Preview(roles.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn admin_implies_editor_and_every_section() {
        let roles = real(&["admin"]);
        assert!(roles.is_admin());
        assert!(roles.is_editor());
        assert!(roles.can_access_section("finance"));
    }

    #[test]
    fn editor_is_not_admin() {
        let roles = real(&["editor"]);
        assert!(roles.is_editor());
        assert!(!roles.is_admin());
        assert!(!roles.can_access_section("finance"));
        assert!(roles.can_access_section("editor"));
    }

    #[test]
    fn unrestricted_sections_are_always_visible() {
        assert!(real(&[]).can_access_section(""));
        assert!(preview(&[]).can_access_section(""));
    }

    #[test]
    fn preview_blocks_privileged_gates_even_when_listing_admin() {
        let roles = preview(&["admin", "editor"]);
        assert!(!roles.is_admin());
        assert!(!roles.is_editor());
    }

    #[test]
    fn preview_disables_admin_bypass_for_sections() {
        let roles = preview(&["admin"]);
        assert!(!roles.can_access_section("finance"));
        assert!(roles.can_access_section("admin"));

        let staff = preview(&["staff"]);
        assert!(staff.can_access_section("staff"));
        assert!(!staff.can_access_section("finance"));
    }

    #[tokio::test]
    async fn confirm_admin_reads_the_directory_grant() {
        let store = Arc::new(MemoryStore::new());
        let admin = store.add_user("admin@example.com", "x", &["admin"]);
        let editor = store.add_user("editor@example.com", "x", &["editor"]);
        assert!(!store.has_role(admin, EDITOR_ROLE).await.unwrap());
        let policy = AuthorizationPolicy::new(store.clone());
        assert!(policy.confirm_admin(admin).await.unwrap());
        assert!(!policy.confirm_admin(editor).await.unwrap());
        assert!(!policy.confirm_admin(Uuid::new_v4()).await.unwrap());

        store.set_failing(true);
        assert!(policy.confirm_admin(admin).await.is_err());
    }

    #[tokio::test]
    async fn effective_roles_follow_preview_override() {
        let store = Arc::new(MemoryStore::new());
        let user_id = store.add_user("admin@example.com", "x", &["admin"]);
        let policy = AuthorizationPolicy::new(store);
        let now = Utc::now();
        let mut session = Session {
            token: "t".to_string(),
            user_id,
            created_at: now,
            expires_at: now + Duration::hours(24),
            preview_roles: None,
        };

        let roles = policy.effective_roles(&session).await.unwrap();
        assert!(roles.is_admin());

        session.preview_roles = Some(vec!["staff".to_string()]);
        let roles = policy.effective_roles(&session).await.unwrap();
        assert_eq!(roles, preview(&["staff"]));
        assert!(!roles.is_admin());
        assert!(!roles.is_editor());

        session.preview_roles = None;
        assert!(policy.effective_roles(&session).await.unwrap().is_admin());
    }
}
