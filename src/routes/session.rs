use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ack, LenientNumber};
use crate::app_state::AppState;
use crate::domains::PublicUser;
use crate::error::AppError;
use crate::infrastructure::middleware::{SessionHeader, Viewer};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(get_session_user))
        .route(
            "/users",
            get(get_users)
                .post(create_user)
                .patch(update_user)
                .delete(delete_user),
        )
        .route("/users/{username}", get(get_user))
        .route("/login/address", post(login_with_address))
        .route("/login/coords", post(login_with_coords))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct AccountUpdate {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddressLogin {
    username: String,
    password: String,
    address: String,
}

#[derive(Debug, Deserialize)]
struct CoordsLogin {
    username: String,
    password: String,
    latitude: LenientNumber,
    longitude: LenientNumber,
}

async fn get_session_user(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(state.accounts.current_user(viewer.user).await?))
}

async fn get_users(State(state): State<AppState>) -> Result<Json<Vec<PublicUser>>, AppError> {
    Ok(Json(state.accounts.users().get_users().await?))
}

async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(state.accounts.users().get_user_by_username(&username).await?))
}

async fn create_user(
    State(state): State<AppState>,
    SessionHeader(session): SessionHeader,
    Json(req): Json<Credentials>,
) -> Result<Json<Value>, AppError> {
    let user = state
        .accounts
        .register(session.as_ref(), &req.username, &req.password)
        .await?;
    Ok(ack("Created user successfully!", json!({ "user": user })))
}

async fn update_user(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(req): Json<AccountUpdate>,
) -> Result<Json<Value>, AppError> {
    let user = state
        .accounts
        .update(viewer.user, req.username.as_deref(), req.password.as_deref())
        .await?;
    Ok(ack("Updated user successfully!", json!({ "user": user })))
}

async fn delete_user(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Json<Value>, AppError> {
    state.accounts.delete_account(viewer.user).await?;
    Ok(ack("Deleted user!", Value::Null))
}

async fn login_with_address(
    State(state): State<AppState>,
    Json(req): Json<AddressLogin>,
) -> Result<Json<Value>, AppError> {
    let token = state
        .accounts
        .login_with_address(&req.username, &req.password, &req.address)
        .await?;
    Ok(ack("Logged in!", json!({ "token": token })))
}

async fn login_with_coords(
    State(state): State<AppState>,
    Json(req): Json<CoordsLogin>,
) -> Result<Json<Value>, AppError> {
    let token = state
        .accounts
        .login_with_coords(
            &req.username,
            &req.password,
            req.latitude.value("latitude")?,
            req.longitude.value("longitude")?,
        )
        .await?;
    Ok(ack("Logged in!", json!({ "token": token })))
}

async fn logout(State(state): State<AppState>, viewer: Viewer) -> Result<Json<Value>, AppError> {
    state.accounts.logout(viewer.user, &viewer.session).await?;
    Ok(ack("Logged out!", Value::Null))
}
