// Location use cases - the caller's point of interest and address lookups

use std::sync::Arc;
use tracing::info;

use crate::core::strong_types::DocId;
use crate::domains::{PoiKind, PointOfInterest, ProximityIndex};
use crate::error::AppResult;
use crate::geo::{Coordinate, Geocoder};
use crate::infrastructure::collection::Record;

#[derive(Clone)]
pub struct LocationService {
    locations: ProximityIndex,
    geocoder: Arc<dyn Geocoder>,
}

impl LocationService {
    pub fn new(locations: ProximityIndex, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { locations, geocoder }
    }

    pub async fn location_of(&self, owner: DocId) -> AppResult<Record<PointOfInterest>> {
        self.locations.get(owner).await
    }

    pub async fn distance(&self, user: DocId, other: DocId) -> AppResult<f64> {
        self.locations.distance_to(user, other).await
    }

    pub async fn resolve(&self, address: &str) -> AppResult<Coordinate> {
        self.geocoder.resolve(address).await
    }

    /// Move `user` to a geocoded address
    pub async fn relocate(&self, user: DocId, address: &str) -> AppResult<Record<PointOfInterest>> {
        let coordinate = self.geocoder.resolve(address).await?;
        self.locations
            .upsert(user, PoiKind::User, coordinate, Some(address.to_string()))
            .await?;
        info!("User {} moved to '{}'", user, address);
        self.locations.get(user).await
    }
}
