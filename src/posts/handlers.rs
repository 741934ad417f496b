use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::internal,
    roles::{authorize, Actor, Permission},
    state::AppState,
};

use super::dto::{
    CommentResponse, CreateCommentRequest, CreatePostRequest, ModerateCommentRequest, Pagination,
    PostResponse, UpdatePostRequest,
};
use super::repo::{self, CommentWithAuthor, PostWithAuthor};
use super::services::{render_comment_markdown, render_markdown};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/:id", get(get_post))
        .route("/posts/:id/comments", get(list_comments))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/:id", put(update_post))
        .route("/posts/:id/comments", post(create_comment))
        .route("/comments/:id", patch(moderate_comment))
}

fn post_response(p: PostWithAuthor) -> PostResponse {
    PostResponse {
        id: p.id,
        author: p.author,
        body: p.body,
        body_html: p.body_html,
        created_at: p.created_at,
    }
}

fn comment_response(c: CommentWithAuthor) -> CommentResponse {
    let body_html = if c.disabled { None } else { Some(c.body_html) };
    CommentResponse {
        id: c.id,
        post_id: c.post_id,
        author: c.author,
        body_html,
        disabled: c.disabled,
        created_at: c.created_at,
    }
}

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<PostResponse>>, (StatusCode, String)> {
    let limit = page.limit.clamp(1, 100);
    let offset = page.offset.max(0);
    let rows = repo::list_posts(&state.db, limit, offset)
        .await
        .map_err(internal)?;
    Ok(Json(rows.into_iter().map(post_response).collect()))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PostResponse>, (StatusCode, String)> {
    let post = repo::find_post_with_author(&state.db, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Post not found".into()))?;
    Ok(Json(post_response(post)))
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), (StatusCode, String)> {
    if payload.body.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Post body must not be empty".into()));
    }

    let actor = Actor::load(&state.db, user_id).await.map_err(internal)?;
    authorize(&actor, Permission::WRITE_ARTICLES)?;
    let Actor::Authenticated { user, .. } = actor else {
        return Err((StatusCode::UNAUTHORIZED, "Authentication required".into()));
    };

    // Markdown is rendered here, at write time; storage never transforms.
    let body_html = render_markdown(&payload.body);
    let post = repo::create_post(&state.db, user_id, &payload.body, &body_html)
        .await
        .map_err(internal)?;

    info!(post_id = %post.id, user_id = %user_id, "post created");
    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            id: post.id,
            author: user.username,
            body: post.body,
            body_html: post.body_html,
            created_at: post.created_at,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>, (StatusCode, String)> {
    if payload.body.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Post body must not be empty".into()));
    }

    let actor = Actor::load(&state.db, user_id).await.map_err(internal)?;
    authorize(&actor, Permission::WRITE_ARTICLES)?;

    let post = repo::find_post(&state.db, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Post not found".into()))?;

    // Only the author or an administrator may edit.
    if post.author_id != user_id && !actor.is_administrator() {
        warn!(post_id = %id, user_id = %user_id, "post edit forbidden");
        return Err((StatusCode::FORBIDDEN, "Not your post".into()));
    }

    let body_html = render_markdown(&payload.body);
    let updated = repo::update_post_body(&state.db, id, &payload.body, &body_html)
        .await
        .map_err(internal)?;

    let with_author = repo::find_post_with_author(&state.db, updated.id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Post not found".into()))?;
    Ok(Json(post_response(with_author)))
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Vec<CommentResponse>>, (StatusCode, String)> {
    if repo::find_post(&state.db, post_id)
        .await
        .map_err(internal)?
        .is_none()
    {
        return Err((StatusCode::NOT_FOUND, "Post not found".into()));
    }
    let rows = repo::list_comments(&state.db, post_id)
        .await
        .map_err(internal)?;
    Ok(Json(rows.into_iter().map(comment_response).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), (StatusCode, String)> {
    if payload.body.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Comment body must not be empty".into(),
        ));
    }

    let actor = Actor::load(&state.db, user_id).await.map_err(internal)?;
    authorize(&actor, Permission::COMMENT)?;
    let Actor::Authenticated { user, .. } = actor else {
        return Err((StatusCode::UNAUTHORIZED, "Authentication required".into()));
    };

    if repo::find_post(&state.db, post_id)
        .await
        .map_err(internal)?
        .is_none()
    {
        return Err((StatusCode::NOT_FOUND, "Post not found".into()));
    }

    let body_html = render_comment_markdown(&payload.body);
    let comment = repo::create_comment(&state.db, post_id, user_id, &payload.body, &body_html)
        .await
        .map_err(internal)?;

    info!(comment_id = %comment.id, post_id = %post_id, user_id = %user_id, "comment created");
    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id: comment.id,
            post_id: comment.post_id,
            author: user.username,
            body_html: Some(comment.body_html),
            disabled: comment.disabled,
            created_at: comment.created_at,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn moderate_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ModerateCommentRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let actor = Actor::load(&state.db, user_id).await.map_err(internal)?;
    authorize(&actor, Permission::MODERATE_COMMENTS)?;

    if repo::find_comment(&state.db, id)
        .await
        .map_err(internal)?
        .is_none()
    {
        return Err((StatusCode::NOT_FOUND, "Comment not found".into()));
    }

    repo::set_comment_disabled(&state.db, id, payload.disabled)
        .await
        .map_err(internal)?;

    info!(comment_id = %id, user_id = %user_id, disabled = payload.disabled, "comment moderated");
    Ok(Json(serde_json::json!({
        "id": id,
        "disabled": payload.disabled,
    })))
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    #[test]
    fn disabled_comment_body_is_withheld() {
        let row = CommentWithAuthor {
            id: Uuid::new_v4(),
            post_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            author: "bob".into(),
            body_html: "<p>spam</p>".into(),
            disabled: true,
            created_at: OffsetDateTime::now_utc(),
        };
        let response = comment_response(row);
        assert!(response.body_html.is_none());
        assert!(response.disabled);

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("spam"));
    }

    #[test]
    fn visible_comment_keeps_body() {
        let row = CommentWithAuthor {
            id: Uuid::new_v4(),
            post_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            author: "bob".into(),
            body_html: "<p>fine</p>".into(),
            disabled: false,
            created_at: OffsetDateTime::now_utc(),
        };
        let response = comment_response(row);
        assert_eq!(response.body_html.as_deref(), Some("<p>fine</p>"));
    }
}
