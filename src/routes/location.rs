use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::ack;
use crate::app_state::AppState;
use crate::core::strong_types::DocId;
use crate::domains::PointOfInterest;
use crate::error::AppError;
use crate::geo::Coordinate;
use crate::infrastructure::collection::Record;
use crate::infrastructure::middleware::Viewer;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/location", get(get_location).patch(update_location))
        .route("/location/poi/{id}", get(get_location_of))
        .route("/location/distance/{id}", get(get_distance))
        .route("/location/address", get(resolve_address))
}

#[derive(Debug, Deserialize)]
struct AddressBody {
    address: String,
}

type Location = Result<Json<Record<PointOfInterest>>, AppError>;

async fn get_location(State(state): State<AppState>, viewer: Viewer) -> Location {
    Ok(Json(state.locations.location_of(viewer.user).await?))
}

async fn update_location(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(req): Json<AddressBody>,
) -> Result<Json<Value>, AppError> {
    let location = state.locations.relocate(viewer.user, &req.address).await?;
    Ok(ack("Location updated!", json!({ "location": location })))
}

async fn get_location_of(State(state): State<AppState>, Path(id): Path<DocId>) -> Location {
    Ok(Json(state.locations.location_of(id).await?))
}

/// Meters from the caller to the given owner's location
async fn get_distance(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<DocId>,
) -> Result<Json<Value>, AppError> {
    let distance = state.locations.distance(viewer.user, id).await?;
    Ok(Json(json!({ "distance": distance })))
}

async fn resolve_address(
    State(state): State<AppState>,
    Query(query): Query<AddressBody>,
) -> Result<Json<Coordinate>, AppError> {
    Ok(Json(state.locations.resolve(&query.address).await?))
}
