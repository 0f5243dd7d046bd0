// Proximity index - one point of interest per owning entity

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::core::strong_types::DocId;
use crate::error::{AppError, AppResult};
use crate::geo::Coordinate;
use crate::infrastructure::collection::{Collection, Database, Record};
use crate::infrastructure::database::{Filter, SortOrder};

pub const LOCATIONS: &str = "locations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoiKind {
    User,
    Post,
    Event,
}

impl PoiKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PoiKind::User => "user",
            PoiKind::Post => "post",
            PoiKind::Event => "event",
        }
    }
}

impl fmt::Display for PoiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointOfInterest {
    pub owner: DocId,
    pub kind: PoiKind,
    pub coordinate: Coordinate,
    #[serde(default)]
    pub address: Option<String>,
}

/// A point of interest paired with its distance from a query center
#[derive(Debug, Clone, Serialize)]
pub struct NearbyPoint {
    #[serde(flatten)]
    pub point: Record<PointOfInterest>,
    pub distance: f64,
}

/// Linear-scan proximity index. Every radius query re-reads all records of
/// the requested kind.
#[derive(Clone)]
pub struct ProximityIndex {
    locations: Collection<PointOfInterest>,
}

impl ProximityIndex {
    pub fn new(db: &Database) -> Self {
        Self {
            locations: db.collection(LOCATIONS),
        }
    }

    fn owned_by(owner: DocId) -> Filter {
        Filter::new().eq("owner", owner)
    }

    /// Last write wins; the owner keeps a single record
    pub async fn upsert(
        &self,
        owner: DocId,
        kind: PoiKind,
        coordinate: Coordinate,
        address: Option<String>,
    ) -> AppResult<()> {
        let point = PointOfInterest {
            owner,
            kind,
            coordinate,
            address,
        };

        let replaced = self.locations.update_one(&Self::owned_by(owner), &point).await?;
        if !replaced {
            self.locations.create(&point).await?;
        }
        info!(
            "Placed {} {} at ({}, {})",
            kind, owner, coordinate.latitude, coordinate.longitude
        );
        Ok(())
    }

    pub async fn find(&self, owner: DocId) -> AppResult<Option<Record<PointOfInterest>>> {
        self.locations.read_one(&Self::owned_by(owner)).await
    }

    pub async fn get(&self, owner: DocId) -> AppResult<Record<PointOfInterest>> {
        self.find(owner)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Location of {} does not exist!", owner)))
    }

    /// No-op when the owner has no record
    pub async fn delete(&self, owner: DocId) -> AppResult<()> {
        let removed = self.locations.delete_many(&Self::owned_by(owner)).await?;
        if removed > 0 {
            info!("Removed location of {}", owner);
        }
        Ok(())
    }

    /// Records of `kind` within `radius_meters` of `center`, in insertion
    /// order, skipping `exclude`
    pub async fn within(
        &self,
        center: &Coordinate,
        exclude: Option<DocId>,
        kind: PoiKind,
        radius_meters: f64,
    ) -> AppResult<Vec<NearbyPoint>> {
        let candidates = self
            .locations
            .read_many(&Filter::new().eq("kind", kind.as_str()), SortOrder::Inserted)
            .await?;
        let scanned = candidates.len();

        let hits: Vec<NearbyPoint> = candidates
            .into_iter()
            .filter(|record| Some(record.owner) != exclude)
            .filter_map(|record| {
                let distance = center.distance_to(&record.coordinate);
                (distance <= radius_meters).then_some(NearbyPoint {
                    point: record,
                    distance,
                })
            })
            .collect();

        debug!(
            "{} of {} {} locations within {} m",
            hits.len(),
            scanned,
            kind,
            radius_meters
        );
        Ok(hits)
    }

    /// Records of `kind` within `radius_meters` of the center owner's location.
    /// The center's own record is never part of the result.
    pub async fn nearby(
        &self,
        center_owner: DocId,
        kind: PoiKind,
        radius_meters: f64,
    ) -> AppResult<Vec<NearbyPoint>> {
        let center = self.get(center_owner).await?;
        self.within(&center.coordinate, Some(center_owner), kind, radius_meters)
            .await
    }

    pub async fn distance_to(&self, from: DocId, to: DocId) -> AppResult<f64> {
        let origin = self.get(from).await?;
        let destination = self.get(to).await?;
        Ok(origin.coordinate.distance_to(&destination.coordinate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::EARTH_RADIUS_METERS;

    /// Point `meters` north of `origin` along its meridian
    fn north_of(origin: Coordinate, meters: f64) -> Coordinate {
        Coordinate {
            latitude: origin.latitude + (meters / EARTH_RADIUS_METERS).to_degrees(),
            longitude: origin.longitude,
        }
    }

    const ORIGIN: Coordinate = Coordinate {
        latitude: 40.0,
        longitude: -74.0,
    };

    async fn index() -> ProximityIndex {
        ProximityIndex::new(&Database::in_memory().await.unwrap())
    }

    fn owners(points: &[NearbyPoint]) -> Vec<DocId> {
        points.iter().map(|p| p.point.owner).collect()
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let index = index().await;
        let second = north_of(ORIGIN, 100.0);

        index.upsert(DocId(1), PoiKind::User, ORIGIN, None).await.unwrap();
        index
            .upsert(DocId(1), PoiKind::User, second, Some("elsewhere".into()))
            .await
            .unwrap();

        let all = index
            .locations
            .read_many(&ProximityIndex::owned_by(DocId(1)), SortOrder::Inserted)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].coordinate, second);
        assert_eq!(all[0].address.as_deref(), Some("elsewhere"));
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let index = index().await;
        assert!(matches!(index.get(DocId(5)).await, Err(AppError::NotFound(_))));

        index.upsert(DocId(5), PoiKind::Post, ORIGIN, None).await.unwrap();
        assert_eq!(index.get(DocId(5)).await.unwrap().kind, PoiKind::Post);

        index.delete(DocId(5)).await.unwrap();
        index.delete(DocId(5)).await.unwrap();
        assert!(index.find(DocId(5)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nearby_radius_boundary() {
        let index = index().await;
        let user = DocId(1);
        index.upsert(user, PoiKind::User, ORIGIN, None).await.unwrap();
        index
            .upsert(DocId(10), PoiKind::Event, north_of(ORIGIN, 4_000.0), None)
            .await
            .unwrap();
        index
            .upsert(DocId(11), PoiKind::Event, north_of(ORIGIN, 6_000.0), None)
            .await
            .unwrap();

        let hits = index.nearby(user, PoiKind::Event, 5_000.0).await.unwrap();
        assert_eq!(owners(&hits), vec![DocId(10)]);
        assert!((hits[0].distance - 4_000.0).abs() < 1e-3);

        let wider = index.nearby(user, PoiKind::Event, 6_500.0).await.unwrap();
        assert_eq!(owners(&wider), vec![DocId(10), DocId(11)]);
    }

    #[tokio::test]
    async fn test_nearby_filters_kind_and_center() {
        let index = index().await;
        index.upsert(DocId(1), PoiKind::User, ORIGIN, None).await.unwrap();
        index.upsert(DocId(2), PoiKind::User, ORIGIN, None).await.unwrap();
        index.upsert(DocId(3), PoiKind::Post, ORIGIN, None).await.unwrap();

        let users = index.nearby(DocId(1), PoiKind::User, 10.0).await.unwrap();
        assert_eq!(owners(&users), vec![DocId(2)]);

        let posts = index.nearby(DocId(1), PoiKind::Post, 0.0).await.unwrap();
        assert_eq!(owners(&posts), vec![DocId(3)]);
    }

    #[tokio::test]
    async fn test_radius_monotonicity() {
        let index = index().await;
        index.upsert(DocId(1), PoiKind::User, ORIGIN, None).await.unwrap();
        for (i, meters) in [50.0, 900.0, 2_500.0, 7_000.0, 20_000.0].iter().enumerate() {
            index
                .upsert(DocId(100 + i as i64), PoiKind::Post, north_of(ORIGIN, *meters), None)
                .await
                .unwrap();
        }

        let radii = [0.0, 100.0, 1_000.0, 5_000.0, 10_000.0, 50_000.0];
        let mut previous: Vec<DocId> = Vec::new();
        for radius in radii {
            let current = owners(&index.nearby(DocId(1), PoiKind::Post, radius).await.unwrap());
            assert!(previous.iter().all(|id| current.contains(id)));
            previous = current;
        }
        assert_eq!(previous.len(), 5);
    }

    #[tokio::test]
    async fn test_nearby_requires_center() {
        let index = index().await;
        assert!(matches!(
            index.nearby(DocId(1), PoiKind::Event, 1.0).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_distance_to() {
        let index = index().await;
        index.upsert(DocId(1), PoiKind::User, ORIGIN, None).await.unwrap();
        index
            .upsert(DocId(2), PoiKind::Event, north_of(ORIGIN, 1_234.0), None)
            .await
            .unwrap();

        let d = index.distance_to(DocId(1), DocId(2)).await.unwrap();
        assert!((d - 1_234.0).abs() < 1e-3);
        assert!(matches!(
            index.distance_to(DocId(1), DocId(3)).await,
            Err(AppError::NotFound(_))
        ));
    }
}
