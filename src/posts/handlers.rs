use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::TextRequest,
    repo_types::{Comment, Like, NewComment, NewPost, Post},
};
use crate::{
    auth::{extractors::AuthUser, repo_types::User},
    db::StoreError,
    error::{AppError, AppResult},
    state::AppState,
    validate::Checks,
};

const POST_NOT_FOUND: &str = "Post not found";
const COMMENT_NOT_FOUND: &str = "Comment doesn't exist";
const ALREADY_LIKED: &str = "Post is already liked";
const NOT_LIKED: &str = "You haven't liked this post";

pub fn private_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post).get(list_posts))
        .route("/posts/:post_id", get(get_post).delete(delete_post))
        .route("/posts/like/:post_id", put(like_post))
        .route("/posts/dislike/:post_id", put(unlike_post))
        .route("/posts/comment/:post_id", post(add_comment))
        .route("/posts/comment/:post_id/:comment_id", delete(delete_comment))
}

fn parse_id(raw: &str, msg: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(msg))
}

async fn load_post(state: &AppState, raw_id: &str) -> AppResult<Post> {
    let id = parse_id(raw_id, POST_NOT_FOUND)?;
    state
        .posts
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found(POST_NOT_FOUND))
}

async fn author(state: &AppState, user_id: Uuid) -> AppResult<User> {
    state.users.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(%user_id, "token for a deleted user");
        AppError::not_found("User not found")
    })
}

fn required_text(body: &TextRequest) -> AppResult<String> {
    Checks::new()
        .required("text", body.text.as_deref(), "Text is required")
        .finish()?;
    Ok(body.text.as_deref().unwrap_or_default().trim().to_string())
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> AppResult<Json<Post>> {
    let Json(body) = payload?;
    let text = required_text(&body)?;
    let user = author(&state, user_id).await?;

    let post = state
        .posts
        .create(NewPost {
            user: user.id,
            text,
            name: user.name,
            avatar: user.avatar,
        })
        .await?;
    info!(%user_id, post_id = %post.id, "post created");
    Ok(Json(post))
}

#[instrument(skip(state))]
pub async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<Post>>> {
    Ok(Json(state.posts.list().await?))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Post>> {
    Ok(Json(load_post(&state, &post_id).await?))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<Value>> {
    let post = load_post(&state, &post_id).await?;
    if let Err(e) = auth.ensure_owns(post.user) {
        warn!(user_id = %auth.0, post_id = %post.id, "post delete by non-owner");
        return Err(e);
    }
    if !state.posts.delete(post.id).await? {
        return Err(AppError::not_found(POST_NOT_FOUND));
    }
    info!(user_id = %auth.0, post_id = %post.id, "post deleted");
    Ok(Json(json!({ "msg": "Post Deleted Successfully" })))
}

#[instrument(skip(state))]
pub async fn like_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<Vec<Like>>> {
    let post = load_post(&state, &post_id).await?;
    if post.likes.iter().any(|l| l.user == user_id) {
        return Err(AppError::bad_request(ALREADY_LIKED));
    }
    match state.posts.add_like(post.id, user_id).await {
        Ok(likes) => Ok(Json(likes)),
        Err(StoreError::Duplicate(_)) => Err(AppError::bad_request(ALREADY_LIKED)),
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(state))]
pub async fn unlike_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<Vec<Like>>> {
    let post = load_post(&state, &post_id).await?;
    state
        .posts
        .remove_like(post.id, user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::bad_request(NOT_LIKED))
}

#[instrument(skip(state, payload))]
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<String>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> AppResult<Json<Vec<Comment>>> {
    let Json(body) = payload?;
    let text = required_text(&body)?;
    let post = load_post(&state, &post_id).await?;
    let user = author(&state, user_id).await?;

    let comments = state
        .posts
        .add_comment(
            post.id,
            NewComment {
                user: user.id,
                text,
                name: user.name,
                avatar: user.avatar,
            },
        )
        .await?;
    Ok(Json(comments))
}

#[instrument(skip(state))]
pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> AppResult<Json<Vec<Comment>>> {
    let post = load_post(&state, &post_id).await?;
    let comment_id = parse_id(&comment_id, COMMENT_NOT_FOUND)?;
    let comment = post
        .comments
        .iter()
        .find(|c| c.id == comment_id)
        .ok_or_else(|| AppError::not_found(COMMENT_NOT_FOUND))?;
    if let Err(e) = auth.ensure_owns(comment.user) {
        warn!(user_id = %auth.0, %comment_id, "comment delete by non-owner");
        return Err(e);
    }
    let comments = state.posts.delete_comment(post.id, comment_id).await?;
    Ok(Json(comments))
}
