use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// One edge of the follower graph, joined with the counterpart's username.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FollowEntry {
    pub user_id: Uuid,
    pub username: String,
    pub since: OffsetDateTime,
}

/// Records `follower` following `followed`. Idempotent: following twice is
/// the same as following once.
pub async fn follow(db: &PgPool, follower: Uuid, followed: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO follows (follower_id, followed_id)
        VALUES ($1, $2)
        ON CONFLICT (follower_id, followed_id) DO NOTHING
        "#,
    )
    .bind(follower)
    .bind(followed)
    .execute(db)
    .await?;
    Ok(())
}

/// Removes the edge; returns whether it existed.
pub async fn unfollow(db: &PgPool, follower: Uuid, followed: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2",
    )
    .bind(follower)
    .bind(followed)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Users who follow `user_id`.
pub async fn followers_of(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<FollowEntry>> {
    let rows = sqlx::query_as::<_, FollowEntry>(
        r#"
        SELECT u.id AS user_id, u.username, f.created_at AS since
        FROM follows f
        JOIN users u ON u.id = f.follower_id
        WHERE f.followed_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Users whom `user_id` follows.
pub async fn followed_by(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<FollowEntry>> {
    let rows = sqlx::query_as::<_, FollowEntry>(
        r#"
        SELECT u.id AS user_id, u.username, f.created_at AS since
        FROM follows f
        JOIN users u ON u.id = f.followed_id
        WHERE f.follower_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
