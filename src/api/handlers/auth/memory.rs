//! In-memory `Datastore` used by unit and router tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use super::storage::{
    Datastore, ResetTokenRecord, ResetTokenStore, SectionCatalog, SectionRecord, SessionRecord,
    SessionStore, User, UserDirectory,
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Vec<String>>,
    last_login: HashSet<Uuid>,
    sessions: HashMap<Vec<u8>, SessionRecord>,
    reset_tokens: HashMap<String, ResetTokenRecord>,
    sections: Vec<SectionRecord>,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
    failing: AtomicBool,
    failing_password_updates: AtomicBool,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_user(&self, email: &str, password_hash: &str, roles: &[&str]) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock();
        inner.users.insert(
            id,
            User {
                id,
                firstname: "Test".to_string(),
                lastname: "User".to_string(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
            },
        );
        inner
            .roles
            .insert(id, roles.iter().map(ToString::to_string).collect());
        id
    }

    pub(crate) fn add_section(&self, name: &str, title: &str, required_role: &str) {
        self.inner.lock().sections.push(SectionRecord {
            name: name.to_string(),
            title: title.to_string(),
            required_role: required_role.to_string(),
        });
    }

    /// Make every subsequent call fail, to exercise internal-error paths.
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail only `update_password_hash`, leaving reads and token writes working.
    pub(crate) fn set_failing_password_updates(&self, failing: bool) {
        self.failing_password_updates.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub(crate) fn reset_token_count(&self, user_id: Uuid) -> usize {
        self.inner
            .lock()
            .reset_tokens
            .values()
            .filter(|record| record.user_id == user_id)
            .count()
    }

    pub(crate) fn password_hash(&self, user_id: Uuid) -> Option<String> {
        self.inner
            .lock()
            .users
            .get(&user_id)
            .map(|user| user.password_hash.clone())
    }

    pub(crate) fn logged_in(&self, user_id: Uuid) -> bool {
        self.inner.lock().last_login.contains(&user_id)
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("memory store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .users
            .values()
            .find(|user| user.email.to_lowercase() == email)
            .cloned())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.check()?;
        Ok(self.inner.lock().users.get(&id).cloned())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        self.check()?;
        if self.failing_password_updates.load(Ordering::SeqCst) {
            return Err(anyhow!("password update rejected"));
        }
        if let Some(user) = self.inner.lock().users.get_mut(&id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn update_last_login(&self, id: Uuid) -> Result<()> {
        self.check()?;
        self.inner.lock().last_login.insert(id);
        Ok(())
    }

    async fn has_role(&self, id: Uuid, role: &str) -> Result<bool> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .roles
            .get(&id)
            .is_some_and(|roles| roles.iter().any(|r| r == role)))
    }

    async fn roles_for_user(&self, id: Uuid) -> Result<Vec<String>> {
        self.check()?;
        let mut roles = self.inner.lock().roles.get(&id).cloned().unwrap_or_default();
        roles.sort();
        Ok(roles)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        token_hash: &[u8],
        user_id: Uuid,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.check()?;
        self.inner.lock().sessions.insert(
            token_hash.to_vec(),
            SessionRecord {
                user_id,
                expires_at,
                created_at,
                preview_roles: None,
            },
        );
        Ok(())
    }

    async fn session_by_token_hash(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .sessions
            .get(token_hash)
            .filter(|record| now < record.expires_at)
            .cloned())
    }

    async fn set_preview_roles(&self, token_hash: &[u8], roles: &[String]) -> Result<bool> {
        self.check()?;
        let mut inner = self.inner.lock();
        let Some(record) = inner.sessions.get_mut(token_hash) else {
            return Ok(false);
        };
        record.preview_roles = Some(roles.to_vec());
        Ok(true)
    }

    async fn clear_preview_roles(&self, token_hash: &[u8]) -> Result<()> {
        self.check()?;
        if let Some(record) = self.inner.lock().sessions.get_mut(token_hash) {
            record.preview_roles = None;
        }
        Ok(())
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        self.check()?;
        self.inner.lock().sessions.remove(token_hash);
        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<u64> {
        self.check()?;
        let mut inner = self.inner.lock();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, record| record.user_id != user_id);
        Ok((before - inner.sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        self.check()?;
        let mut inner = self.inner.lock();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, record| now < record.expires_at);
        Ok((before - inner.sessions.len()) as u64)
    }
}

#[async_trait]
impl ResetTokenStore for MemoryStore {
    async fn create_reset_token(&self, record: &ResetTokenRecord) -> Result<()> {
        self.check()?;
        self.inner
            .lock()
            .reset_tokens
            .insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetTokenRecord>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .reset_tokens
            .get(token)
            .filter(|record| now < record.expires_at)
            .cloned())
    }

    async fn take_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetTokenRecord>> {
        self.check()?;
        let mut inner = self.inner.lock();
        let valid = inner
            .reset_tokens
            .get(token)
            .is_some_and(|record| now < record.expires_at);
        if !valid {
            return Ok(None);
        }
        Ok(inner.reset_tokens.remove(token))
    }

    async fn delete_reset_tokens_for_user(&self, user_id: Uuid) -> Result<u64> {
        self.check()?;
        let mut inner = self.inner.lock();
        let before = inner.reset_tokens.len();
        inner
            .reset_tokens
            .retain(|_, record| record.user_id != user_id);
        Ok((before - inner.reset_tokens.len()) as u64)
    }
}

#[async_trait]
impl SectionCatalog for MemoryStore {
    async fn list_sections(&self) -> Result<Vec<SectionRecord>> {
        self.check()?;
        Ok(self.inner.lock().sections.clone())
    }

    async fn section_by_name(&self, name: &str) -> Result<Option<SectionRecord>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .sections
            .iter()
            .find(|section| section.name == name)
            .cloned())
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.check()
    }
}
