// Use-case layer. Each service sequences several components for one inbound
// action; the store has no multi-document transactions, so a failure midway
// leaves the earlier steps in place and is logged with `warn!`.

pub mod account_service;
pub mod event_service;
pub mod friend_service;
pub mod location_service;
pub mod post_service;

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::core::strong_types::DocId;
use crate::domains::{EventDoc, PostDoc, UserAccounts};
use crate::error::{AppError, AppResult};
use crate::infrastructure::collection::Record;

pub use account_service::AccountService;
pub use event_service::EventService;
pub use friend_service::{FriendRequestView, FriendService};
pub use location_service::LocationService;
pub use post_service::PostService;

/// A post as clients see it, with the author's username beside the id
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Record<PostDoc>,
    pub author_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    #[serde(flatten)]
    pub event: Record<EventDoc>,
    pub host_name: Option<String>,
}

/// Usernames for the given ids; ids of deleted accounts are left out
async fn usernames(
    users: &UserAccounts,
    ids: impl IntoIterator<Item = DocId>,
) -> AppResult<HashMap<DocId, String>> {
    let mut names = HashMap::new();
    for id in ids.into_iter().collect::<BTreeSet<_>>() {
        match users.get_user_by_id(id).await {
            Ok(user) => {
                names.insert(id, user.username);
            }
            Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(names)
}

pub(crate) async fn post_views(
    users: &UserAccounts,
    posts: Vec<Record<PostDoc>>,
) -> AppResult<Vec<PostView>> {
    let names = usernames(users, posts.iter().map(|p| p.author)).await?;
    Ok(posts
        .into_iter()
        .map(|post| PostView {
            author_name: names.get(&post.author).cloned(),
            post,
        })
        .collect())
}

pub(crate) async fn event_views(
    users: &UserAccounts,
    events: Vec<Record<EventDoc>>,
) -> AppResult<Vec<EventView>> {
    let names = usernames(users, events.iter().map(|e| e.host)).await?;
    Ok(events
        .into_iter()
        .map(|event| EventView {
            host_name: names.get(&event.host).cloned(),
            event,
        })
        .collect())
}
