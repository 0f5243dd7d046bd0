use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ack, RadiusQuery};
use crate::app_state::AppState;
use crate::core::strong_types::DocId;
use crate::domains::{PostOptions, PostUpdate};
use crate::error::AppError;
use crate::infrastructure::database::Document;
use crate::infrastructure::middleware::Viewer;
use crate::services::PostView;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(get_posts).post(create_post))
        .route("/posts/nearby", get(get_nearby_posts))
        .route(
            "/posts/{id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
}

#[derive(Debug, Deserialize)]
struct AuthorQuery {
    author: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePost {
    content: String,
    #[serde(default)]
    reply_to: Option<DocId>,
    #[serde(default)]
    options: Option<PostOptions>,
}

async fn get_posts(
    State(state): State<AppState>,
    Query(query): Query<AuthorQuery>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let author = query.author.as_deref().filter(|a| !a.is_empty());
    Ok(Json(state.posts.list(author).await?))
}

async fn get_nearby_posts(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<RadiusQuery>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let radius = state.radius_meters(query.radius)?;
    Ok(Json(state.posts.nearby(viewer.user, radius).await?))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<DocId>,
) -> Result<Json<Value>, AppError> {
    let (post, comments) = state.posts.thread(id).await?;
    Ok(Json(json!({ "post": post, "comments": comments })))
}

async fn create_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(req): Json<CreatePost>,
) -> Result<Json<Value>, AppError> {
    let post = state
        .posts
        .create(
            viewer.user,
            req.content,
            req.reply_to,
            req.options.unwrap_or_default(),
        )
        .await?;
    Ok(ack("Post successfully created!", json!({ "post": post })))
}

async fn update_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<DocId>,
    Json(body): Json<Document>,
) -> Result<Json<Value>, AppError> {
    let update = PostUpdate::from_document(&body)?;
    state.posts.update(viewer.user, id, &update).await?;
    Ok(ack("Post successfully updated!", Value::Null))
}

async fn delete_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<DocId>,
) -> Result<Json<Value>, AppError> {
    state.posts.delete(viewer.user, id).await?;
    Ok(ack("Post deleted successfully!", Value::Null))
}
