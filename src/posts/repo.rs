use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub body_html: String,
    pub created_at: OffsetDateTime,
}

/// Post row joined with its author's username for listings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PostWithAuthor {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author: String,
    pub body: String,
    pub body_html: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub body_html: String,
    pub disabled: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommentWithAuthor {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author: String,
    pub body_html: String,
    pub disabled: bool,
    pub created_at: OffsetDateTime,
}

pub async fn create_post(
    db: &PgPool,
    author_id: Uuid,
    body: &str,
    body_html: &str,
) -> anyhow::Result<Post> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (author_id, body, body_html)
        VALUES ($1, $2, $3)
        RETURNING id, author_id, body, body_html, created_at
        "#,
    )
    .bind(author_id)
    .bind(body)
    .bind(body_html)
    .fetch_one(db)
    .await?;
    Ok(post)
}

pub async fn update_post_body(
    db: &PgPool,
    post_id: Uuid,
    body: &str,
    body_html: &str,
) -> anyhow::Result<Post> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts
        SET body = $2, body_html = $3
        WHERE id = $1
        RETURNING id, author_id, body, body_html, created_at
        "#,
    )
    .bind(post_id)
    .bind(body)
    .bind(body_html)
    .fetch_one(db)
    .await?;
    Ok(post)
}

pub async fn find_post(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Post>> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, author_id, body, body_html, created_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(post)
}

pub async fn find_post_with_author(
    db: &PgPool,
    id: Uuid,
) -> anyhow::Result<Option<PostWithAuthor>> {
    let post = sqlx::query_as::<_, PostWithAuthor>(
        r#"
        SELECT p.id, p.author_id, u.username AS author, p.body, p.body_html, p.created_at
        FROM posts p
        JOIN users u ON u.id = p.author_id
        WHERE p.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(post)
}

pub async fn list_posts(
    db: &PgPool,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<PostWithAuthor>> {
    let rows = sqlx::query_as::<_, PostWithAuthor>(
        r#"
        SELECT p.id, p.author_id, u.username AS author, p.body, p.body_html, p.created_at
        FROM posts p
        JOIN users u ON u.id = p.author_id
        ORDER BY p.created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn create_comment(
    db: &PgPool,
    post_id: Uuid,
    author_id: Uuid,
    body: &str,
    body_html: &str,
) -> anyhow::Result<Comment> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, author_id, body, body_html)
        VALUES ($1, $2, $3, $4)
        RETURNING id, post_id, author_id, body, body_html, disabled, created_at
        "#,
    )
    .bind(post_id)
    .bind(author_id)
    .bind(body)
    .bind(body_html)
    .fetch_one(db)
    .await?;
    Ok(comment)
}

pub async fn list_comments(db: &PgPool, post_id: Uuid) -> anyhow::Result<Vec<CommentWithAuthor>> {
    let rows = sqlx::query_as::<_, CommentWithAuthor>(
        r#"
        SELECT c.id, c.post_id, c.author_id, u.username AS author,
               c.body_html, c.disabled, c.created_at
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.post_id = $1
        ORDER BY c.created_at ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_comment(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, author_id, body, body_html, disabled, created_at
        FROM comments
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(comment)
}

pub async fn set_comment_disabled(db: &PgPool, id: Uuid, disabled: bool) -> anyhow::Result<()> {
    sqlx::query("UPDATE comments SET disabled = $2 WHERE id = $1")
        .bind(id)
        .bind(disabled)
        .execute(db)
        .await?;
    Ok(())
}
