use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde_json::Value;

use super::ack;
use crate::app_state::AppState;
use crate::error::AppError;
use crate::infrastructure::middleware::Viewer;
use crate::services::FriendRequestView;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/friends", get(get_friends))
        .route("/friends/{friend}", delete(remove_friend))
        .route("/friend/requests", get(get_requests))
        .route(
            "/friend/requests/{to}",
            post(send_request).delete(remove_request),
        )
        .route("/friend/accept/{from}", put(accept_request))
        .route("/friend/reject/{from}", put(reject_request))
}

type Ack = Result<Json<Value>, AppError>;

/// Usernames of the caller's friends
async fn get_friends(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.friends.friends_of(viewer.user).await?))
}

async fn remove_friend(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(friend): Path<String>,
) -> Ack {
    state.friends.remove_friend(viewer.user, &friend).await?;
    Ok(ack("Unfriended!", Value::Null))
}

/// Sent and received, in every status
async fn get_requests(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Json<Vec<FriendRequestView>>, AppError> {
    Ok(Json(state.friends.requests_of(viewer.user).await?))
}

async fn send_request(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(to): Path<String>,
) -> Ack {
    state.friends.send_request(viewer.user, &to).await?;
    Ok(ack("Sent request!", Value::Null))
}

async fn remove_request(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(to): Path<String>,
) -> Ack {
    state.friends.remove_request(viewer.user, &to).await?;
    Ok(ack("Removed request!", Value::Null))
}

async fn accept_request(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(from): Path<String>,
) -> Ack {
    state.friends.accept_request(viewer.user, &from).await?;
    Ok(ack("Accepted request!", Value::Null))
}

async fn reject_request(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(from): Path<String>,
) -> Ack {
    state.friends.reject_request(viewer.user, &from).await?;
    Ok(ack("Rejected request!", Value::Null))
}
