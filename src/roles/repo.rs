use sqlx::PgPool;

use super::Role;

impl Role {
    pub async fn find_by_id(db: &PgPool, id: i32) -> anyhow::Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name, permissions, is_default
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(role)
    }

    pub async fn find_by_name(db: &PgPool, name: &str) -> anyhow::Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name, permissions, is_default
            FROM roles
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(db)
        .await?;
        Ok(role)
    }

    /// The role assigned to new users absent other rules.
    pub async fn default_role(db: &PgPool) -> anyhow::Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name, permissions, is_default
            FROM roles
            WHERE is_default = TRUE
            "#,
        )
        .fetch_optional(db)
        .await?;
        Ok(role)
    }

    pub async fn find_by_permissions(db: &PgPool, permissions: i32) -> anyhow::Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name, permissions, is_default
            FROM roles
            WHERE permissions = $1
            "#,
        )
        .bind(permissions)
        .fetch_optional(db)
        .await?;
        Ok(role)
    }

    /// Insert-or-update by name, always overwriting `permissions` and
    /// `is_default` with the given values.
    pub async fn upsert(
        db: &PgPool,
        name: &str,
        permissions: i32,
        is_default: bool,
    ) -> anyhow::Result<Role> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, permissions, is_default)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
                SET permissions = EXCLUDED.permissions,
                    is_default = EXCLUDED.is_default
            RETURNING id, name, permissions, is_default
            "#,
        )
        .bind(name)
        .bind(permissions)
        .bind(is_default)
        .fetch_one(db)
        .await?;
        Ok(role)
    }
}
