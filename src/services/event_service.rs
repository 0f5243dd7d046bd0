// Event use cases - geocoded events and their proximity queries

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::strong_types::DocId;
use crate::domains::{
    EventDoc, EventMembership, EventUpdate, Facet, NewEvent, PoiKind, ProximityIndex,
    UserAccounts,
};
use crate::error::{AppError, AppResult};
use crate::geo::Geocoder;
use crate::infrastructure::collection::Record;
use crate::infrastructure::database::{Document, Filter};

use super::{event_views, EventView};

#[derive(Clone)]
pub struct EventService {
    events: EventMembership,
    locations: ProximityIndex,
    users: UserAccounts,
    geocoder: Arc<dyn Geocoder>,
    co_location_radius_meters: f64,
}

impl EventService {
    pub fn new(
        events: EventMembership,
        locations: ProximityIndex,
        users: UserAccounts,
        geocoder: Arc<dyn Geocoder>,
        co_location_radius_meters: f64,
    ) -> Self {
        Self {
            events,
            locations,
            users,
            geocoder,
            co_location_radius_meters,
        }
    }

    pub fn membership(&self) -> &EventMembership {
        &self.events
    }

    pub async fn list(&self, host: Option<&str>) -> AppResult<Vec<EventView>> {
        let events = match host {
            Some(username) => {
                let host = self.users.get_user_by_username(username).await?;
                self.events.get_by_host(host.id).await?
            }
            None => self.events.get_events(&Filter::new()).await?,
        };
        event_views(&self.users, events).await
    }

    pub async fn get(&self, id: DocId) -> AppResult<EventView> {
        let event = self.events.get_event(id).await?;
        self.single(event).await
    }

    async fn single(&self, event: Record<EventDoc>) -> AppResult<EventView> {
        let id = event.id;
        event_views(&self.users, vec![event])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal(format!("Event {} view could not be built", id)))
    }

    pub async fn nearby(&self, user: DocId, radius_meters: f64) -> AppResult<Vec<EventView>> {
        let hits = self.locations.nearby(user, PoiKind::Event, radius_meters).await?;
        let ids: Vec<DocId> = hits.iter().map(|hit| hit.point.owner).collect();
        let events = self.events.get_many(&ids).await?;
        event_views(&self.users, events).await
    }

    pub async fn upcoming(&self, now: DateTime<Utc>) -> AppResult<Vec<EventView>> {
        let events = self.events.upcoming(now).await?;
        event_views(&self.users, events).await
    }

    pub async fn ongoing(&self, now: DateTime<Utc>) -> AppResult<Vec<EventView>> {
        let events = self.events.ongoing(now).await?;
        event_views(&self.users, events).await
    }

    pub async fn interested(&self, user: DocId, now: DateTime<Utc>) -> AppResult<Vec<EventView>> {
        let events = self.events.interested_by(user, now).await?;
        event_views(&self.users, events).await
    }

    pub async fn attending(&self, user: DocId, now: DateTime<Utc>) -> AppResult<Vec<EventView>> {
        let events = self.events.attending_by(user, now).await?;
        event_views(&self.users, events).await
    }

    /// Ongoing events the user attends and is standing at, within the
    /// co-location radius
    pub async fn currently_at(&self, user: DocId, now: DateTime<Utc>) -> AppResult<Vec<EventView>> {
        let here = self
            .locations
            .nearby(user, PoiKind::Event, self.co_location_radius_meters)
            .await?;
        let candidates: Vec<DocId> = here.iter().map(|hit| hit.point.owner).collect();
        let events = self
            .events
            .currently_attending_among(&candidates, user, now)
            .await?;
        event_views(&self.users, events).await
    }

    /// Geocode, create the event, then register its point of interest. An
    /// event whose location fails to register is left without one.
    pub async fn create(&self, host: DocId, form: &Document) -> AppResult<EventView> {
        let new_event = NewEvent::from_document(form)?;
        let coordinate = self.geocoder.resolve(&new_event.location).await?;
        let address = new_event.location.clone();

        let event = self.events.create(host, new_event).await?;
        if let Err(e) = self
            .locations
            .upsert(event.id, PoiKind::Event, coordinate, Some(address))
            .await
        {
            warn!("Event {} created without a location: {}", event.id, e);
            return Err(e);
        }
        self.single(event).await
    }

    /// Host edit. A new `location` is geocoded before anything is written
    /// and re-registers the event's point of interest afterwards.
    pub async fn edit(&self, host: DocId, id: DocId, body: &Document) -> AppResult<EventView> {
        let update = EventUpdate::from_document(body)?;
        self.events.is_host(host, id).await?;

        let moved_to = match &update.location {
            Some(address) => Some((address.clone(), self.geocoder.resolve(address).await?)),
            None => None,
        };

        let event = self.events.update(host, id, &update).await?;
        if let Some((address, coordinate)) = moved_to {
            if let Err(e) = self
                .locations
                .upsert(id, PoiKind::Event, coordinate, Some(address))
                .await
            {
                warn!("Event {} edited but its location was not moved: {}", id, e);
                return Err(e);
            }
        }
        self.single(event).await
    }

    pub async fn delete(&self, host: DocId, id: DocId) -> AppResult<()> {
        self.events.delete(host, id).await?;
        if let Err(e) = self.locations.delete(id).await {
            warn!("Event {} deleted but its location remains: {}", id, e);
            return Err(e);
        }
        info!("Event {} and its location removed", id);
        Ok(())
    }

    pub async fn add_facet(
        &self,
        host: DocId,
        id: DocId,
        facet: Facet,
        value: &str,
    ) -> AppResult<()> {
        self.events.add_facet(host, id, facet, value).await
    }

    pub async fn remove_facet(
        &self,
        host: DocId,
        id: DocId,
        facet: Facet,
        value: &str,
    ) -> AppResult<()> {
        self.events.remove_facet(host, id, facet, value).await
    }
}
