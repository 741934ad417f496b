use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ConfigError;
use crate::roles::{Permission, Role};

use super::User;

fn is_admin_email(admin_email: Option<&str>, email: &str) -> bool {
    admin_email.is_some_and(|admin| admin.eq_ignore_ascii_case(email))
}

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, confirmed, role_id,
                   about_me, member_since, last_seen
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, confirmed, role_id,
                   about_me, member_since, last_seen
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, confirmed, role_id,
                   about_me, member_since, last_seen
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Creates a user with the role fallback rules: the configured admin
    /// email gets the full-permission role, everyone else the default role.
    /// A missing default role means seeding never ran; that is a fatal
    /// configuration error, not something the caller can recover.
    pub async fn create(
        db: &PgPool,
        email: &str,
        username: &str,
        password_hash: &str,
        admin_email: Option<&str>,
    ) -> anyhow::Result<User> {
        let mut role = None;
        if is_admin_email(admin_email, email) {
            role = Role::find_by_permissions(db, Permission::FULL).await?;
        }
        let role = match role {
            Some(r) => r,
            None => Role::default_role(db)
                .await?
                .ok_or(ConfigError::MissingDefaultRole)?,
        };

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, username, password_hash, role_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, username, password_hash, confirmed, role_id,
                      about_me, member_since, last_seen
            "#,
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(role.id)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Marks the account confirmed. Idempotent: re-confirming an already
    /// confirmed account is a no-op.
    pub async fn set_confirmed(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET confirmed = TRUE WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Refreshes `last_seen`; called on authenticated activity.
    pub async fn ping(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_seen = now() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_email_match_is_case_insensitive() {
        assert!(is_admin_email(Some("admin@example.com"), "admin@example.com"));
        assert!(is_admin_email(Some("admin@example.com"), "Admin@Example.COM"));
        assert!(!is_admin_email(Some("admin@example.com"), "user@example.com"));
        assert!(!is_admin_email(None, "admin@example.com"));
    }
}
