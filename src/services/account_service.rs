// Account use cases - registration, login, logout and account removal

use std::sync::Arc;
use tracing::{info, warn};

use crate::core::strong_types::{DocId, SessionToken};
use crate::domains::{Friendships, PoiKind, ProfileRegistry, ProximityIndex, PublicUser, UserAccounts};
use crate::error::AppResult;
use crate::geo::{Coordinate, Geocoder};
use crate::infrastructure::session::IdentityProvider;

#[derive(Clone)]
pub struct AccountService {
    users: UserAccounts,
    profiles: ProfileRegistry,
    locations: ProximityIndex,
    friends: Friendships,
    sessions: Arc<dyn IdentityProvider>,
    geocoder: Arc<dyn Geocoder>,
}

impl AccountService {
    pub fn new(
        users: UserAccounts,
        profiles: ProfileRegistry,
        locations: ProximityIndex,
        friends: Friendships,
        sessions: Arc<dyn IdentityProvider>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        Self {
            users,
            profiles,
            locations,
            friends,
            sessions,
            geocoder,
        }
    }

    pub fn users(&self) -> &UserAccounts {
        &self.users
    }

    /// Create the account and its profile. A profile failure leaves the
    /// account in place.
    pub async fn register(
        &self,
        session: Option<&SessionToken>,
        username: &str,
        password: &str,
    ) -> AppResult<PublicUser> {
        self.sessions.require_logged_out(session).await?;
        let user = self.users.create(username, password).await?;

        if let Err(e) = self.profiles.create(user.id, username).await {
            warn!("User {} registered without a profile: {}", user.id, e);
            return Err(e);
        }
        Ok(user)
    }

    async fn start(&self, user: DocId, coordinate: Coordinate, address: Option<String>) -> AppResult<SessionToken> {
        self.locations
            .upsert(user, PoiKind::User, coordinate, address)
            .await?;
        let token = self.sessions.start_session(user).await?;
        info!("User {} logged in", user);
        Ok(token)
    }

    pub async fn login_with_address(
        &self,
        username: &str,
        password: &str,
        address: &str,
    ) -> AppResult<SessionToken> {
        let user = self.users.authenticate(username, password).await?;
        let coordinate = self.geocoder.resolve(address).await?;
        self.start(user, coordinate, Some(address.to_string())).await
    }

    pub async fn login_with_coords(
        &self,
        username: &str,
        password: &str,
        latitude: f64,
        longitude: f64,
    ) -> AppResult<SessionToken> {
        let user = self.users.authenticate(username, password).await?;
        let coordinate = Coordinate::new(latitude, longitude)?;
        self.start(user, coordinate, None).await
    }

    /// Drop the user's location, then the session
    pub async fn logout(&self, user: DocId, session: &SessionToken) -> AppResult<()> {
        self.locations.delete(user).await?;
        self.friends.forget(user).await?;
        self.sessions.end_session(session).await?;
        info!("User {} logged out", user);
        Ok(())
    }

    pub async fn current_user(&self, user: DocId) -> AppResult<PublicUser> {
        self.users.get_user_by_id(user).await
    }

    pub async fn update(
        &self,
        user: DocId,
        username: Option<&str>,
        password: Option<&str>,
    ) -> AppResult<PublicUser> {
        self.users.update(user, username, password).await
    }

    /// Remove profile, location and sessions, then the account itself
    pub async fn delete_account(&self, user: DocId) -> AppResult<()> {
        self.profiles.delete(user).await?;
        self.locations.delete(user).await?;
        let ended = self.sessions.end_all_sessions(user).await?;
        if let Err(e) = self.users.delete(user).await {
            warn!("Account {} lost its profile and {} sessions but remains: {}", user, ended, e);
            return Err(e);
        }
        info!("Account {} deleted", user);
        Ok(())
    }
}
