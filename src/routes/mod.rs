// HTTP registration table. Every route of the API is listed here or in the
// per-area `routes()` functions this module merges.

mod events;
mod friends;
mod location;
mod posts;
mod profile;
mod session;

use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};

pub fn create_router(state: AppState) -> Router {
    Router::new().nest("/api", api_routes()).with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(session::routes())
        .merge(posts::routes())
        .merge(events::routes())
        .merge(friends::routes())
        .merge(location::routes())
        .merge(profile::routes())
}

/// `{"msg": ...}` acknowledgement, optionally with extra fields
pub(crate) fn ack(msg: &str, extra: Value) -> Json<Value> {
    let mut body = json!({ "msg": msg });
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
        body.extend(extra);
    }
    Json(body)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RadiusQuery {
    /// Kilometers
    pub radius: Option<f64>,
}

/// Number sent either as JSON number or as text from a form field
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum LenientNumber {
    Number(f64),
    Text(String),
}

impl LenientNumber {
    pub fn value(&self, field: &str) -> AppResult<f64> {
        match self {
            LenientNumber::Number(n) => Ok(*n),
            LenientNumber::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| AppError::BadValues(format!("'{}' must be a number", field))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_merges_fields() {
        let Json(body) = ack("Logged in!", json!({"token": "t"}));
        assert_eq!(body, json!({"msg": "Logged in!", "token": "t"}));
        let Json(body) = ack("done", Value::Null);
        assert_eq!(body, json!({"msg": "done"}));
    }

    #[test]
    fn test_lenient_numbers() {
        let n: LenientNumber = serde_json::from_value(json!("40.5")).unwrap();
        assert_eq!(n.value("latitude").unwrap(), 40.5);
        let n: LenientNumber = serde_json::from_value(json!(-74)).unwrap();
        assert_eq!(n.value("longitude").unwrap(), -74.0);
        let n: LenientNumber = serde_json::from_value(json!("north")).unwrap();
        assert!(matches!(n.value("latitude"), Err(AppError::BadValues(_))));
    }
}
