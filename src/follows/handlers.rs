use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::AuthUser,
    error::internal,
    roles::{authorize, Actor, Permission},
    state::AppState,
    users::User,
};

use super::repo::{self, FollowEntry};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/:username/follow", post(follow).delete(unfollow))
        .route("/users/:username/followers", get(followers))
        .route("/users/:username/following", get(following))
}

async fn resolve_target(
    state: &AppState,
    username: &str,
) -> Result<User, (StatusCode, String)> {
    match User::find_by_username(&state.db, username).await {
        Ok(Some(u)) => Ok(u),
        Ok(None) => Err((StatusCode::NOT_FOUND, "User not found".into())),
        Err(e) => Err(internal(e)),
    }
}

#[instrument(skip(state))]
pub async fn follow(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let actor = Actor::load(&state.db, user_id).await.map_err(internal)?;
    authorize(&actor, Permission::FOLLOW)?;

    let target = resolve_target(&state, &username).await?;
    if target.id == user_id {
        return Err((StatusCode::BAD_REQUEST, "You cannot follow yourself".into()));
    }

    repo::follow(&state.db, user_id, target.id)
        .await
        .map_err(internal)?;
    info!(follower = %user_id, followed = %target.id, "follow");
    Ok(Json(serde_json::json!({ "following": target.username })))
}

#[instrument(skip(state))]
pub async fn unfollow(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let actor = Actor::load(&state.db, user_id).await.map_err(internal)?;
    authorize(&actor, Permission::FOLLOW)?;

    let target = resolve_target(&state, &username).await?;
    let removed = repo::unfollow(&state.db, user_id, target.id)
        .await
        .map_err(internal)?;
    if !removed {
        return Err((StatusCode::NOT_FOUND, "Not following this user".into()));
    }
    info!(follower = %user_id, followed = %target.id, "unfollow");
    Ok(Json(serde_json::json!({ "unfollowed": target.username })))
}

#[instrument(skip(state))]
pub async fn followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<FollowEntry>>, (StatusCode, String)> {
    let target = resolve_target(&state, &username).await?;
    let rows = repo::followers_of(&state.db, target.id)
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn following(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<FollowEntry>>, (StatusCode, String)> {
    let target = resolve_target(&state, &username).await?;
    let rows = repo::followed_by(&state.db, target.id)
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}
