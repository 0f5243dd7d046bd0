use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, patch},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ack, RadiusQuery};
use crate::app_state::AppState;
use crate::core::strong_types::DocId;
use crate::domains::Facet;
use crate::error::AppError;
use crate::infrastructure::database::Document;
use crate::infrastructure::middleware::Viewer;
use crate::services::EventView;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(get_events).post(create_event))
        .route("/events/nearby", get(get_nearby_events))
        .route("/events/upcoming", get(get_upcoming_events))
        .route("/events/ongoing", get(get_ongoing_events))
        .route("/events/interested", get(get_interested_events))
        .route("/events/attending", get(get_attending_events))
        .route("/events/at", get(get_current_events))
        .route("/events/{id}", get(get_event).delete(delete_event))
        .route("/events/{id}/edit", patch(update_event))
        .route("/events/{id}/interest/add", patch(indicate_interest))
        .route("/events/{id}/interest/remove", patch(remove_interest))
        .route("/events/{id}/attendance/add", patch(indicate_attendance))
        .route("/events/{id}/attendance/remove", patch(remove_attendance))
        .route("/events/{id}/{facet}/add", patch(add_facet))
        .route("/events/{id}/{facet}/remove", patch(remove_facet))
}

#[derive(Debug, Deserialize)]
struct HostQuery {
    host: Option<String>,
}

type EventList = Result<Json<Vec<EventView>>, AppError>;

async fn get_events(State(state): State<AppState>, Query(query): Query<HostQuery>) -> EventList {
    let host = query.host.as_deref().filter(|h| !h.is_empty());
    Ok(Json(state.events.list(host).await?))
}

async fn get_nearby_events(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<RadiusQuery>,
) -> EventList {
    let radius = state.radius_meters(query.radius)?;
    Ok(Json(state.events.nearby(viewer.user, radius).await?))
}

async fn get_upcoming_events(State(state): State<AppState>) -> EventList {
    Ok(Json(state.events.upcoming(Utc::now()).await?))
}

async fn get_ongoing_events(State(state): State<AppState>) -> EventList {
    Ok(Json(state.events.ongoing(Utc::now()).await?))
}

async fn get_interested_events(State(state): State<AppState>, viewer: Viewer) -> EventList {
    Ok(Json(state.events.interested(viewer.user, Utc::now()).await?))
}

async fn get_attending_events(State(state): State<AppState>, viewer: Viewer) -> EventList {
    Ok(Json(state.events.attending(viewer.user, Utc::now()).await?))
}

/// Ongoing events the caller attends and is currently at
async fn get_current_events(State(state): State<AppState>, viewer: Viewer) -> EventList {
    Ok(Json(state.events.currently_at(viewer.user, Utc::now()).await?))
}

async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<DocId>,
) -> Result<Json<EventView>, AppError> {
    Ok(Json(state.events.get(id).await?))
}

/// Body: `title`, `description`, `location` (an address), `startTime` and
/// `endTime` (`yyyy/mm/dd hh:mm tz`, 24-hour), `ageReq`, `capacity`
async fn create_event(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(form): Json<Document>,
) -> Result<Json<Value>, AppError> {
    let event = state.events.create(viewer.user, &form).await?;
    Ok(ack("Event successfully created!", json!({ "event": event })))
}

async fn update_event(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<DocId>,
    Json(body): Json<Document>,
) -> Result<Json<Value>, AppError> {
    let event = state.events.edit(viewer.user, id, &body).await?;
    Ok(ack("Event successfully updated!", json!({ "event": event })))
}

async fn delete_event(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<DocId>,
) -> Result<Json<Value>, AppError> {
    state.events.delete(viewer.user, id).await?;
    Ok(ack("Event deleted successfully!", Value::Null))
}

/// The facet value, sent as `{"topic": ..}` (singular facet name) or `{"value": ..}`
fn facet_value(facet: Facet, body: &Document) -> Result<String, AppError> {
    let singular = match facet {
        Facet::Topics => "topic",
        Facet::Amenities => "amenity",
        Facet::Accommodations => "accommodation",
    };
    body.get(singular)
        .or_else(|| body.get("value"))
        .and_then(Value::as_str)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::BadValues(format!("Missing '{}' to change", singular)))
}

async fn add_facet(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((id, facet)): Path<(DocId, String)>,
    Json(body): Json<Document>,
) -> Result<Json<Value>, AppError> {
    let facet: Facet = facet.parse()?;
    let value = facet_value(facet, &body)?;
    state.events.add_facet(viewer.user, id, facet, &value).await?;
    Ok(ack(&format!("Added to {}!", facet), json!({ "value": value })))
}

async fn remove_facet(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((id, facet)): Path<(DocId, String)>,
    Json(body): Json<Document>,
) -> Result<Json<Value>, AppError> {
    let facet: Facet = facet.parse()?;
    let value = facet_value(facet, &body)?;
    state.events.remove_facet(viewer.user, id, facet, &value).await?;
    Ok(ack(&format!("Removed from {}!", facet), json!({ "value": value })))
}

async fn indicate_interest(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<DocId>,
) -> Result<Json<Value>, AppError> {
    state.events.membership().indicate_interest(viewer.user, id).await?;
    Ok(ack("Interest indicated!", Value::Null))
}

async fn remove_interest(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<DocId>,
) -> Result<Json<Value>, AppError> {
    state.events.membership().remove_interest(viewer.user, id).await?;
    Ok(ack("Interest removed!", Value::Null))
}

async fn indicate_attendance(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<DocId>,
) -> Result<Json<Value>, AppError> {
    state.events.membership().indicate_attendance(viewer.user, id).await?;
    Ok(ack("Attendance indicated!", Value::Null))
}

async fn remove_attendance(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<DocId>,
) -> Result<Json<Value>, AppError> {
    state.events.membership().remove_attendance(viewer.user, id).await?;
    Ok(ack("Attendance removed!", Value::Null))
}
