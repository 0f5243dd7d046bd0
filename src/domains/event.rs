// Event membership - hosted events with interested/attending roles

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::core::strong_types::DocId;
use crate::core::time::require_event_time;
use crate::error::{AppError, AppResult};
use crate::infrastructure::collection::{Collection, Database, Record};
use crate::infrastructure::database::{Document, Filter, SortOrder, ID_FIELD};

pub const EVENTS: &str = "events";

/// Fields only the event itself may set
const PROHIBITED_UPDATES: [&str; 3] = ["host", "interested", "attending"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDoc {
    pub host: DocId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    #[serde(with = "ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub age_req: i64,
    #[serde(default)]
    pub capacity: i64,
    #[serde(default)]
    pub topics: BTreeSet<String>,
    #[serde(default)]
    pub amenities: BTreeSet<String>,
    #[serde(default)]
    pub accommodations: BTreeSet<String>,
    #[serde(default)]
    pub interested: BTreeSet<DocId>,
    #[serde(default)]
    pub attending: BTreeSet<DocId>,
}

/// Where a non-host user stands with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    None,
    Interested,
    Attending,
}

impl EventDoc {
    pub fn membership(&self, user: DocId) -> Membership {
        if self.attending.contains(&user) {
            Membership::Attending
        } else if self.interested.contains(&user) {
            Membership::Interested
        } else {
            Membership::None
        }
    }

    fn facet(&self, facet: Facet) -> &BTreeSet<String> {
        match facet {
            Facet::Topics => &self.topics,
            Facet::Amenities => &self.amenities,
            Facet::Accommodations => &self.accommodations,
        }
    }
}

/// Host-curated string sets on an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Topics,
    Amenities,
    Accommodations,
}

impl Facet {
    pub fn field(self) -> &'static str {
        match self {
            Facet::Topics => "topics",
            Facet::Amenities => "amenities",
            Facet::Accommodations => "accommodations",
        }
    }

    fn singular(self) -> &'static str {
        match self {
            Facet::Topics => "Topic",
            Facet::Amenities => "Amenity",
            Facet::Accommodations => "Accommodation",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for Facet {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topics" => Ok(Facet::Topics),
            "amenities" => Ok(Facet::Amenities),
            "accommodations" => Ok(Facet::Accommodations),
            other => Err(AppError::NotFound(format!("Events have no '{}' list", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub age_req: i64,
    pub capacity: i64,
}

impl NewEvent {
    /// Parse a creation form. `title`, `location`, `startTime` and `endTime`
    /// are required; the rest default to empty or zero.
    pub fn from_document(form: &Document) -> AppResult<Self> {
        let required = |key: &str| -> AppResult<String> {
            text_field(form, key)?
                .ok_or_else(|| AppError::BadValues(format!("'{}' is required", key)))
        };

        Ok(Self {
            title: required("title")?,
            description: text_field(form, "description")?.unwrap_or_default(),
            location: required("location")?,
            start_time: require_event_time(&required("startTime")?, "Start Time")?,
            end_time: require_event_time(&required("endTime")?, "End Time")?,
            age_req: int_field(form, "ageReq")?.unwrap_or(0),
            capacity: int_field(form, "capacity")?.unwrap_or(0),
        })
    }
}

/// Partial edit of an event's core fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_req: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
}

fn text_field(update: &Document, key: &str) -> AppResult<Option<String>> {
    match update.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(AppError::BadValues(format!("'{}' must be a string", key))),
    }
}

/// Integers arrive either as JSON numbers or as numeric strings from forms
pub fn int_field(update: &Document, key: &str) -> AppResult<Option<i64>> {
    match update.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| AppError::BadValues(format!("'{}' must be an integer", key))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadValues(format!("'{}' must be an integer", key))),
        Some(_) => Err(AppError::BadValues(format!("'{}' must be an integer", key))),
    }
}

impl EventUpdate {
    /// Reject attempts to touch host or membership fields
    pub fn sanitize(update: &Document) -> AppResult<()> {
        match update.keys().find(|key| PROHIBITED_UPDATES.contains(&key.as_str())) {
            Some(key) => Err(AppError::NotAllowed(format!("Cannot update '{}' field!", key))),
            None => Ok(()),
        }
    }

    /// Build an update from a raw edit body. Unknown fields are ignored.
    pub fn from_document(update: &Document) -> AppResult<Self> {
        Self::sanitize(update)?;

        let time = |key: &str, label: &str| -> AppResult<Option<i64>> {
            text_field(update, key)?
                .map(|raw| require_event_time(&raw, label).map(|t| t.timestamp_millis()))
                .transpose()
        };

        Ok(Self {
            title: text_field(update, "title")?,
            description: text_field(update, "description")?,
            location: text_field(update, "location")?,
            start_time: time("startTime", "Start Time")?,
            end_time: time("endTime", "End Time")?,
            age_req: int_field(update, "ageReq")?,
            capacity: int_field(update, "capacity")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn require_ordered(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<()> {
    if start > end {
        return Err(AppError::BadValues(
            "Start Time must not be after End Time".to_string(),
        ));
    }
    Ok(())
}

/// Fails unless `user` hosts `event`
fn require_host(event: &Record<EventDoc>, user: DocId) -> AppResult<()> {
    if event.host != user {
        return Err(AppError::NotAllowed(format!(
            "{} is not the host of event {}!",
            user, event.id
        )));
    }
    Ok(())
}

/// Fails when `user` hosts `event`
fn require_not_host(event: &Record<EventDoc>, user: DocId) -> AppResult<()> {
    if event.host == user {
        return Err(AppError::NotAllowed(format!(
            "{} is the host of event {}!",
            user, event.id
        )));
    }
    Ok(())
}

fn from_millis(ms: i64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| AppError::BadValues(format!("Time {} is out of range", ms)))
}

#[derive(Clone)]
pub struct EventMembership {
    events: Collection<EventDoc>,
}

impl EventMembership {
    pub fn new(db: &Database) -> Self {
        Self {
            events: db.collection(EVENTS),
        }
    }

    fn not_found(id: DocId) -> AppError {
        AppError::NotFound(format!("Event {} does not exist!", id))
    }

    pub async fn create(&self, host: DocId, event: NewEvent) -> AppResult<Record<EventDoc>> {
        require_ordered(event.start_time, event.end_time)?;

        let doc = EventDoc {
            host,
            title: event.title,
            description: event.description,
            location: event.location,
            start_time: event.start_time,
            end_time: event.end_time,
            age_req: event.age_req,
            capacity: event.capacity,
            topics: BTreeSet::new(),
            amenities: BTreeSet::new(),
            accommodations: BTreeSet::new(),
            interested: BTreeSet::new(),
            attending: BTreeSet::new(),
        };
        let id = self.events.create(&doc).await?;
        info!("Event {} '{}' created by {}", id, doc.title, host);
        self.get_event(id).await
    }

    pub async fn get_event(&self, id: DocId) -> AppResult<Record<EventDoc>> {
        self.events
            .read_by_id(id)
            .await?
            .ok_or_else(|| Self::not_found(id))
    }

    /// Most recently updated first
    pub async fn get_events(&self, filter: &Filter) -> AppResult<Vec<Record<EventDoc>>> {
        let events = self.events.read_many(filter, SortOrder::RecentlyUpdated).await?;
        debug!("Event query matched {}", events.len());
        Ok(events)
    }

    pub async fn get_by_host(&self, host: DocId) -> AppResult<Vec<Record<EventDoc>>> {
        self.get_events(&Filter::new().eq("host", host)).await
    }

    pub async fn get_many(&self, ids: &[DocId]) -> AppResult<Vec<Record<EventDoc>>> {
        self.get_events(&Filter::new().one_of(ID_FIELD, ids.iter().copied()))
            .await
    }

    pub async fn upcoming(&self, now: DateTime<Utc>) -> AppResult<Vec<Record<EventDoc>>> {
        self.get_events(&Filter::new().gt("startTime", now.timestamp_millis()))
            .await
    }

    pub fn ongoing_filter(now: DateTime<Utc>) -> Filter {
        let now = now.timestamp_millis();
        Filter::new().lte("startTime", now).gte("endTime", now)
    }

    pub async fn ongoing(&self, now: DateTime<Utc>) -> AppResult<Vec<Record<EventDoc>>> {
        self.get_events(&Self::ongoing_filter(now)).await
    }

    /// Events `user` is interested in that have not ended yet
    pub async fn interested_by(
        &self,
        user: DocId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Record<EventDoc>>> {
        let filter = Filter::new()
            .gte("endTime", now.timestamp_millis())
            .contains("interested", user);
        self.get_events(&filter).await
    }

    /// Events `user` is attending that have not ended yet
    pub async fn attending_by(
        &self,
        user: DocId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Record<EventDoc>>> {
        let filter = Filter::new()
            .gte("endTime", now.timestamp_millis())
            .contains("attending", user);
        self.get_events(&filter).await
    }

    /// Of `candidates`, the ongoing events `user` is attending
    pub async fn currently_attending_among(
        &self,
        candidates: &[DocId],
        user: DocId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Record<EventDoc>>> {
        let filter = Self::ongoing_filter(now)
            .one_of(ID_FIELD, candidates.iter().copied())
            .contains("attending", user);
        self.get_events(&filter).await
    }

    /// The event, provided `user` hosts it
    pub async fn is_host(&self, user: DocId, id: DocId) -> AppResult<Record<EventDoc>> {
        let event = self.get_event(id).await?;
        require_host(&event, user)?;
        Ok(event)
    }

    /// The event, provided `user` does not host it
    pub async fn is_not_host(&self, user: DocId, id: DocId) -> AppResult<Record<EventDoc>> {
        let event = self.get_event(id).await?;
        require_not_host(&event, user)?;
        Ok(event)
    }

    /// Patch derived from the event's current state. Checks inside `edit`
    /// run again whenever a concurrent write wins the race.
    async fn modify<P, F>(&self, id: DocId, edit: F) -> AppResult<Record<EventDoc>>
    where
        P: Serialize,
        F: FnMut(&Record<EventDoc>) -> AppResult<P> + Send,
    {
        self.events
            .modify(&Filter::by_id(id), edit)
            .await?
            .ok_or_else(|| Self::not_found(id))
    }

    /// Apply a host edit. The merged start/end pair must stay ordered.
    pub async fn update(
        &self,
        actor: DocId,
        id: DocId,
        update: &EventUpdate,
    ) -> AppResult<Record<EventDoc>> {
        if update.is_empty() {
            return self.is_host(actor, id).await;
        }
        let start = update.start_time.map(from_millis).transpose()?;
        let end = update.end_time.map(from_millis).transpose()?;

        self.modify(id, |event| {
            require_host(event, actor)?;
            require_ordered(
                start.unwrap_or(event.start_time),
                end.unwrap_or(event.end_time),
            )?;
            Ok(update)
        })
        .await?;
        info!("Event {} updated by host", id);
        self.get_event(id).await
    }

    pub async fn delete(&self, actor: DocId, id: DocId) -> AppResult<()> {
        self.is_host(actor, id).await?;
        self.events.delete_one(&Filter::by_id(id)).await?;
        info!("Event {} deleted", id);
        Ok(())
    }

    pub async fn add_facet(
        &self,
        actor: DocId,
        id: DocId,
        facet: Facet,
        value: &str,
    ) -> AppResult<()> {
        self.modify(id, |event| {
            require_host(event, actor)?;
            let mut values = event.facet(facet).clone();
            if !values.insert(value.to_string()) {
                return Err(AppError::NotAllowed(format!(
                    "{} '{}' already exists!",
                    facet.singular(),
                    value
                )));
            }
            Ok(json!({ facet.field(): values }))
        })
        .await?;
        Ok(())
    }

    pub async fn remove_facet(
        &self,
        actor: DocId,
        id: DocId,
        facet: Facet,
        value: &str,
    ) -> AppResult<()> {
        self.modify(id, |event| {
            require_host(event, actor)?;
            let mut values = event.facet(facet).clone();
            if !values.remove(value) {
                return Err(AppError::NotAllowed(format!(
                    "{} '{}' does not exist!",
                    facet.singular(),
                    value
                )));
            }
            Ok(json!({ facet.field(): values }))
        })
        .await?;
        Ok(())
    }

    /// Move a non-host `user` to `target` when `allowed` accepts their
    /// current membership. Both sets go out in one patch so a user is
    /// never in both.
    async fn transition(
        &self,
        user: DocId,
        id: DocId,
        target: Membership,
        allowed: fn(Membership) -> bool,
        refusal: &str,
    ) -> AppResult<()> {
        self.modify(id, |event| {
            require_not_host(event, user)?;
            if !allowed(event.membership(user)) {
                return Err(AppError::NotAllowed(format!(
                    "{} {} event {}!",
                    user, refusal, id
                )));
            }

            let mut interested = event.interested.clone();
            let mut attending = event.attending.clone();
            interested.remove(&user);
            attending.remove(&user);
            match target {
                Membership::Interested => {
                    interested.insert(user);
                }
                Membership::Attending => {
                    attending.insert(user);
                }
                Membership::None => {}
            }

            let mut patch = Map::new();
            patch.insert("interested".to_string(), json!(interested));
            patch.insert("attending".to_string(), json!(attending));
            Ok(patch)
        })
        .await?;
        debug!("User {} is now {:?} for event {}", user, target, id);
        Ok(())
    }

    pub async fn indicate_interest(&self, user: DocId, id: DocId) -> AppResult<()> {
        self.transition(
            user,
            id,
            Membership::Interested,
            |m| m != Membership::Interested,
            "is already interested in",
        )
        .await
    }

    pub async fn remove_interest(&self, user: DocId, id: DocId) -> AppResult<()> {
        self.transition(
            user,
            id,
            Membership::None,
            |m| m == Membership::Interested,
            "is not interested in",
        )
        .await
    }

    pub async fn indicate_attendance(&self, user: DocId, id: DocId) -> AppResult<()> {
        self.transition(
            user,
            id,
            Membership::Attending,
            |m| m != Membership::Attending,
            "is already attending",
        )
        .await
    }

    pub async fn remove_attendance(&self, user: DocId, id: DocId) -> AppResult<()> {
        self.transition(
            user,
            id,
            Membership::None,
            |m| m == Membership::Attending,
            "is not attending",
        )
        .await
    }
}
