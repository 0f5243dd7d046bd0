use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, patch},
    Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::ack;
use crate::app_state::AppState;
use crate::domains::{ProfileDoc, ProfileUpdate};
use crate::error::AppError;
use crate::infrastructure::collection::Record;
use crate::infrastructure::database::Document;
use crate::infrastructure::middleware::Viewer;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/profile/user/{username}", get(get_user_profile))
        .route("/profile/all", get(get_all_profiles))
        .route("/profile/edit", patch(edit_profile))
        .route("/profile/interests/add", patch(add_interest))
        .route("/profile/interests/remove", patch(remove_interest))
}

#[derive(Debug, Deserialize)]
struct InterestBody {
    interest: String,
}

type Profile = Result<Json<Record<ProfileDoc>>, AppError>;

async fn get_profile(State(state): State<AppState>, viewer: Viewer) -> Profile {
    Ok(Json(state.profiles.get_profile(viewer.user).await?))
}

async fn get_user_profile(State(state): State<AppState>, Path(username): Path<String>) -> Profile {
    let person = state.accounts.users().get_user_by_username(&username).await?;
    Ok(Json(state.profiles.get_profile(person.id).await?))
}

/// Most recently updated first
async fn get_all_profiles(
    State(state): State<AppState>,
) -> Result<Json<Vec<Record<ProfileDoc>>>, AppError> {
    Ok(Json(state.profiles.get_profiles().await?))
}

/// Body fields `name`, `bio`, `location` and `birthdate` (`yyyy/mm/dd`)
async fn edit_profile(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(body): Json<Document>,
) -> Result<Json<Value>, AppError> {
    let update = ProfileUpdate::from_document(&body)?;
    state.profiles.update(viewer.user, &update).await?;
    Ok(ack("Profile successfully updated.", Value::Null))
}

async fn add_interest(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(req): Json<InterestBody>,
) -> Result<Json<Value>, AppError> {
    state.profiles.add_interest(viewer.user, &req.interest).await?;
    Ok(ack("Interest added successfully", Value::Null))
}

async fn remove_interest(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(req): Json<InterestBody>,
) -> Result<Json<Value>, AppError> {
    state.profiles.remove_interest(viewer.user, &req.interest).await?;
    Ok(ack("Interest removed successfully.", Value::Null))
}
