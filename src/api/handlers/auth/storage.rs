//! Collaborator interfaces consumed by the auth core, and their Postgres backing.
//!
//! Users, roles and sections belong to the wider platform; this module only
//! reads them (plus the password hash update on reset). Sessions and reset
//! tokens are owned here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Account fields needed for login and display.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: String,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Persisted session row, keyed by the SHA-256 digest of the token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub preview_roles: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResetTokenRecord {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A documentation section as far as access control cares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionRecord {
    pub name: String,
    pub title: String,
    /// Empty means unrestricted.
    pub required_role: String,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()>;
    async fn update_last_login(&self, id: Uuid) -> Result<()>;
    async fn has_role(&self, id: Uuid, role: &str) -> Result<bool>;
    async fn roles_for_user(&self, id: Uuid) -> Result<Vec<String>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(
        &self,
        token_hash: &[u8],
        user_id: Uuid,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;
    /// Returns the row only while `now < expires_at`.
    async fn session_by_token_hash(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>>;
    /// Returns false when no row matched.
    async fn set_preview_roles(&self, token_hash: &[u8], roles: &[String]) -> Result<bool>;
    async fn clear_preview_roles(&self, token_hash: &[u8]) -> Result<()>;
    async fn delete_session(&self, token_hash: &[u8]) -> Result<()>;
    async fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<u64>;
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    async fn create_reset_token(&self, record: &ResetTokenRecord) -> Result<()>;
    /// Returns the row only while `now < expires_at`.
    async fn reset_token(&self, token: &str, now: DateTime<Utc>)
        -> Result<Option<ResetTokenRecord>>;
    /// Atomically delete and return an unexpired token.
    async fn take_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetTokenRecord>>;
    async fn delete_reset_tokens_for_user(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait SectionCatalog: Send + Sync {
    async fn list_sections(&self) -> Result<Vec<SectionRecord>>;
    async fn section_by_name(&self, name: &str) -> Result<Option<SectionRecord>>;
}

/// Everything the server needs from persistence.
#[async_trait]
pub trait Datastore: UserDirectory + SessionStore + ResetTokenStore + SectionCatalog {
    async fn ping(&self) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        firstname: row.get("firstname"),
        lastname: row.get("lastname"),
        email: row.get("email"),
        password_hash: row.get("password"),
    }
}

fn reset_token_from_row(row: &sqlx::postgres::PgRow) -> ResetTokenRecord {
    ResetTokenRecord {
        token: row.get("token"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = r"
            SELECT id, firstname, lastname, email, password
            FROM users
            WHERE lower(email) = $1
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup user by email")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = r"
            SELECT id, firstname, lastname, email, password
            FROM users
            WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup user by id")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let query = "UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update password hash")?;
        Ok(())
    }

    async fn update_last_login(&self, id: Uuid) -> Result<()> {
        let query = "UPDATE users SET last_login = NOW() WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update last login")?;
        Ok(())
    }

    async fn has_role(&self, id: Uuid, role: &str) -> Result<bool> {
        let query = r"
            SELECT EXISTS (
                SELECT 1 FROM user_roles ur
                JOIN roles r ON r.id = ur.role_id
                WHERE ur.user_id = $1 AND r.name = $2
            )
        ";
        let row = sqlx::query(query)
            .bind(id)
            .bind(role)
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to check role membership")?;
        Ok(row.get(0))
    }

    async fn roles_for_user(&self, id: Uuid) -> Result<Vec<String>> {
        let query = r"
            SELECT r.name
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
        ";
        let rows = sqlx::query(query)
            .bind(id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to load user roles")?;
        Ok(rows.iter().map(|row| row.get("name")).collect())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(
        &self,
        token_hash: &[u8],
        user_id: Uuid,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = r"
            INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
        ";
        sqlx::query(query)
            .bind(token_hash)
            .bind(user_id)
            .bind(created_at)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert session")?;
        Ok(())
    }

    async fn session_by_token_hash(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT user_id, expires_at, created_at, preview_roles
            FROM sessions
            WHERE token_hash = $1 AND expires_at > $2
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup session")?;
        Ok(row.map(|row| SessionRecord {
            user_id: row.get("user_id"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
            preview_roles: row.get("preview_roles"),
        }))
    }

    async fn set_preview_roles(&self, token_hash: &[u8], roles: &[String]) -> Result<bool> {
        let query = "UPDATE sessions SET preview_roles = $2 WHERE token_hash = $1";
        let result = sqlx::query(query)
            .bind(token_hash)
            .bind(roles)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to set preview roles")?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_preview_roles(&self, token_hash: &[u8]) -> Result<()> {
        let query = "UPDATE sessions SET preview_roles = NULL WHERE token_hash = $1";
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to clear preview roles")?;
        Ok(())
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        // Idempotent: deleting a missing row is fine.
        let query = "DELETE FROM sessions WHERE token_hash = $1";
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE user_id = $1";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete user sessions")?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE expires_at <= $1";
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete expired sessions")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ResetTokenStore for PgStore {
    async fn create_reset_token(&self, record: &ResetTokenRecord) -> Result<()> {
        let query = r"
            INSERT INTO password_reset_tokens (token, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
        ";
        sqlx::query(query)
            .bind(&record.token)
            .bind(record.user_id)
            .bind(record.expires_at)
            .bind(record.created_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert password reset token")?;
        Ok(())
    }

    async fn reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetTokenRecord>> {
        let query = r"
            SELECT token, user_id, expires_at, created_at
            FROM password_reset_tokens
            WHERE token = $1 AND expires_at > $2
        ";
        let row = sqlx::query(query)
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup password reset token")?;
        Ok(row.as_ref().map(reset_token_from_row))
    }

    async fn take_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetTokenRecord>> {
        // DELETE .. RETURNING makes the token single-use under concurrent submits.
        let query = r"
            DELETE FROM password_reset_tokens
            WHERE token = $1 AND expires_at > $2
            RETURNING token, user_id, expires_at, created_at
        ";
        let row = sqlx::query(query)
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to consume password reset token")?;
        Ok(row.as_ref().map(reset_token_from_row))
    }

    async fn delete_reset_tokens_for_user(&self, user_id: Uuid) -> Result<u64> {
        let query = "DELETE FROM password_reset_tokens WHERE user_id = $1";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete password reset tokens")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SectionCatalog for PgStore {
    async fn list_sections(&self) -> Result<Vec<SectionRecord>> {
        let query = r"
            SELECT name, title, COALESCE(required_role, '') AS required_role
            FROM sections
            WHERE deleted = false
            ORDER BY sort_order
        ";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to list sections")?;
        Ok(rows
            .iter()
            .map(|row| SectionRecord {
                name: row.get("name"),
                title: row.get("title"),
                required_role: row.get("required_role"),
            })
            .collect())
    }

    async fn section_by_name(&self, name: &str) -> Result<Option<SectionRecord>> {
        let query = r"
            SELECT name, title, COALESCE(required_role, '') AS required_role
            FROM sections
            WHERE name = $1 AND deleted = false
        ";
        let row = sqlx::query(query)
            .bind(name)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup section")?;
        Ok(row.map(|row| SectionRecord {
            name: row.get("name"),
            title: row.get("title"),
            required_role: row.get("required_role"),
        }))
    }
}

#[async_trait]
impl Datastore for PgStore {
    async fn ping(&self) -> Result<()> {
        let query = "SELECT 1";
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to ping database")?;
        Ok(())
    }
}
