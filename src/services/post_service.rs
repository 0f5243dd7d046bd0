// Post use cases - posts placed at their author's location

use tracing::{info, warn};

use crate::core::strong_types::DocId;
use crate::domains::{
    PoiKind, PostOptions, PostThread, PostUpdate, ProfileRegistry, ProximityIndex, UserAccounts,
};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::Filter;

use super::{post_views, PostView};

#[derive(Clone)]
pub struct PostService {
    posts: PostThread,
    profiles: ProfileRegistry,
    locations: ProximityIndex,
    users: UserAccounts,
}

impl PostService {
    pub fn new(
        posts: PostThread,
        profiles: ProfileRegistry,
        locations: ProximityIndex,
        users: UserAccounts,
    ) -> Self {
        Self {
            posts,
            profiles,
            locations,
            users,
        }
    }

    /// All posts, or only those by the named author
    pub async fn list(&self, author: Option<&str>) -> AppResult<Vec<PostView>> {
        let posts = match author {
            Some(username) => {
                let author = self.users.get_user_by_username(username).await?;
                self.posts.get_by_author(author.id).await?
            }
            None => self.posts.get_posts(&Filter::new()).await?,
        };
        post_views(&self.users, posts).await
    }

    pub async fn nearby(&self, user: DocId, radius_meters: f64) -> AppResult<Vec<PostView>> {
        let hits = self.locations.nearby(user, PoiKind::Post, radius_meters).await?;
        let ids: Vec<DocId> = hits.iter().map(|hit| hit.point.owner).collect();
        let posts = self.posts.get_many(&ids).await?;
        post_views(&self.users, posts).await
    }

    /// The post and its direct replies
    pub async fn thread(&self, id: DocId) -> AppResult<(PostView, Vec<PostView>)> {
        let thread = self.posts.get_thread(id).await?;
        let mut root = post_views(&self.users, vec![thread.post]).await?;
        let comments = post_views(&self.users, thread.comments).await?;
        match root.pop() {
            Some(post) => Ok((post, comments)),
            None => Err(AppError::Internal(format!(
                "Post {} vanished while building its view",
                id
            ))),
        }
    }

    /// Create the post where the author currently is and list it on their
    /// profile. A failed later step leaves the post without a location or
    /// profile entry.
    pub async fn create(
        &self,
        author: DocId,
        content: String,
        reply_to: Option<DocId>,
        options: PostOptions,
    ) -> AppResult<PostView> {
        let here = self.locations.get(author).await?;
        let post = self.posts.create(author, content, reply_to, options).await?;

        if let Err(e) = self
            .locations
            .upsert(post.id, PoiKind::Post, here.coordinate, here.address.clone())
            .await
        {
            warn!("Post {} created without a location: {}", post.id, e);
            return Err(e);
        }
        if let Err(e) = self.profiles.add_post(author, post.id).await {
            warn!("Post {} missing from the profile of {}: {}", post.id, author, e);
            return Err(e);
        }

        let mut views = post_views(&self.users, vec![post]).await?;
        views.pop().ok_or_else(|| {
            AppError::Internal("Post view could not be built".to_string())
        })
    }

    /// Apply the edit and move the post to the author's current location
    pub async fn update(&self, author: DocId, id: DocId, update: &PostUpdate) -> AppResult<()> {
        self.posts.update(author, id, update).await?;
        match self.locations.find(author).await? {
            Some(here) => {
                self.locations
                    .upsert(id, PoiKind::Post, here.coordinate, here.address.clone())
                    .await?
            }
            None => warn!("Author {} has no location; post {} stays put", author, id),
        }
        Ok(())
    }

    pub async fn delete(&self, author: DocId, id: DocId) -> AppResult<()> {
        self.posts.delete(author, id).await?;
        self.locations.delete(id).await?;
        if let Err(e) = self.profiles.remove_post(author, id).await {
            warn!("Post {} deleted but still listed for {}: {}", id, author, e);
            return Err(e);
        }
        info!("Post {} and its location removed", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::geo::Coordinate;
    use crate::infrastructure::collection::Database;

    struct Fixture {
        service: PostService,
        locations: ProximityIndex,
        profiles: ProfileRegistry,
        alice: DocId,
        bob: DocId,
    }

    const HERE: Coordinate = Coordinate { latitude: 40.0, longitude: -74.0 };

    async fn fixture() -> Fixture {
        let db = Database::in_memory().await.unwrap();
        let users = UserAccounts::new(&db);
        let profiles = ProfileRegistry::new(&db);
        let locations = ProximityIndex::new(&db);

        let alice = users.create("alice", "pw").await.unwrap().id;
        let bob = users.create("bob", "pw").await.unwrap().id;
        for id in [alice, bob] {
            profiles.create(id, "someone").await.unwrap();
            locations.upsert(id, PoiKind::User, HERE, None).await.unwrap();
        }

        Fixture {
            service: PostService::new(PostThread::new(&db), profiles.clone(), locations.clone(), users),
            locations,
            profiles,
            alice,
            bob,
        }
    }

    #[tokio::test]
    async fn test_create_places_post_and_lists_it() {
        let f = fixture().await;
        let view = f
            .service
            .create(f.alice, "hi".into(), None, PostOptions::default())
            .await
            .unwrap();

        assert_eq!(view.author_name.as_deref(), Some("alice"));
        let poi = f.locations.get(view.post.id).await.unwrap();
        assert_eq!((poi.kind, poi.coordinate), (PoiKind::Post, HERE));
        assert_eq!(f.profiles.get_profile(f.alice).await.unwrap().posts, vec![view.post.id]);

        let nearby = f.service.nearby(f.bob, 100.0).await.unwrap();
        assert_eq!(nearby.len(), 1);
    }

    #[tokio::test]
    async fn test_create_requires_author_location() {
        let f = fixture().await;
        f.locations.delete(f.alice).await.unwrap();
        assert!(matches!(
            f.service
                .create(f.alice, "hi".into(), None, PostOptions::default())
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(f.service.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_thread_and_author_filter() {
        let f = fixture().await;
        let root = f
            .service
            .create(f.alice, "root".into(), None, PostOptions::default())
            .await
            .unwrap();
        f.service
            .create(f.bob, "reply".into(), Some(root.post.id), PostOptions::default())
            .await
            .unwrap();

        let (post, comments) = f.service.thread(root.post.id).await.unwrap();
        assert_eq!(post.post.id, root.post.id);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author_name.as_deref(), Some("bob"));

        assert_eq!(f.service.list(Some("bob")).await.unwrap().len(), 1);
        assert!(matches!(f.service.list(Some("carol")).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_moves_post_and_delete_cascades() {
        let f = fixture().await;
        let view = f
            .service
            .create(f.alice, "hi".into(), None, PostOptions::default())
            .await
            .unwrap();
        let id = view.post.id;

        let moved = Coordinate { latitude: 41.0, longitude: -74.0 };
        f.locations.upsert(f.alice, PoiKind::User, moved, None).await.unwrap();
        let update = PostUpdate {
            content: Some("edited".into()),
            options: None,
        };
        f.service.update(f.alice, id, &update).await.unwrap();
        assert_eq!(f.locations.get(id).await.unwrap().coordinate, moved);
        assert_eq!(f.locations.get(f.alice).await.unwrap().kind, PoiKind::User);

        assert!(matches!(f.service.delete(f.bob, id).await, Err(AppError::NotAllowed(_))));
        f.service.delete(f.alice, id).await.unwrap();
        assert!(f.locations.find(id).await.unwrap().is_none());
        assert!(f.profiles.get_profile(f.alice).await.unwrap().posts.is_empty());
    }
}
