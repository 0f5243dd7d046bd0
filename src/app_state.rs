use std::sync::Arc;
use tracing::info;

use crate::{
    config::Config,
    core::id_generator::DocIdGenerator,
    error::{AppError, AppResult},
    domains::{EventMembership, Friendships, PostThread, ProfileRegistry, ProximityIndex, UserAccounts},
    geo::{Geocoder, GoogleGeocoder},
    infrastructure::{
        collection::Database,
        session::{IdentityProvider, InMemorySessions},
        sqlite_database::SqliteDocumentStore,
    },
    services::{AccountService, EventService, FriendService, LocationService, PostService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<dyn IdentityProvider>,
    pub accounts: AccountService,
    pub events: EventService,
    pub friends: FriendService,
    pub posts: PostService,
    pub locations: LocationService,
    pub profiles: ProfileRegistry,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let api_key = config
            .geocoding
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("GOOGLE_API_KEY must be set to geocode addresses"))?;

        let store = SqliteDocumentStore::connect(
            &config.database.url,
            config.database.max_connections,
        )
        .await?;
        let db = Database::new(Arc::new(store), Arc::new(DocIdGenerator::new(config.node_id)));
        let geocoder = GoogleGeocoder::new(config.geocoding.base_url.clone(), api_key)?;

        info!("Geocoding through {}", config.geocoding.base_url);
        Ok(Self::with_components(
            config,
            db,
            Arc::new(geocoder),
            Arc::new(InMemorySessions::new()),
        ))
    }

    /// Wire every component over an existing database and collaborators
    pub fn with_components(
        config: Config,
        db: Database,
        geocoder: Arc<dyn Geocoder>,
        sessions: Arc<dyn IdentityProvider>,
    ) -> Self {
        let users = UserAccounts::new(&db);
        let profiles = ProfileRegistry::new(&db);
        let locations = ProximityIndex::new(&db);
        let events = EventMembership::new(&db);
        let posts = PostThread::new(&db);
        let friends = Friendships::new(&db);

        Self {
            accounts: AccountService::new(
                users.clone(),
                profiles.clone(),
                locations.clone(),
                friends.clone(),
                sessions.clone(),
                geocoder.clone(),
            ),
            events: EventService::new(
                events,
                locations.clone(),
                users.clone(),
                geocoder.clone(),
                config.proximity.co_location_radius_m,
            ),
            friends: FriendService::new(friends, users.clone()),
            posts: PostService::new(posts, profiles.clone(), locations.clone(), users),
            locations: LocationService::new(locations, geocoder),
            profiles,
            sessions,
            config,
        }
    }

    /// Radius in meters for a nearby query given in kilometers; the
    /// configured default when the query names none
    pub fn radius_meters(&self, radius_km: Option<f64>) -> AppResult<f64> {
        match radius_km {
            None => Ok(self.config.proximity.default_radius_km * 1000.0),
            Some(km) if km.is_finite() && km >= 0.0 => Ok(km * 1000.0),
            Some(km) => Err(AppError::BadValues(format!(
                "Radius {} must be a non-negative number of kilometers",
                km
            ))),
        }
    }
}
