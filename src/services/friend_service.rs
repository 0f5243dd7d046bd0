// Friend use cases - the HTTP surface names people by username

use serde::Serialize;

use super::usernames;
use crate::core::strong_types::DocId;
use crate::domains::{Friendships, RequestStatus, UserAccounts};
use crate::error::AppResult;

/// A friend request with both ends shown as usernames
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestView {
    #[serde(rename = "_id")]
    pub id: DocId,
    pub date_created: i64,
    pub date_updated: i64,
    pub from: Option<String>,
    pub to: Option<String>,
    pub status: RequestStatus,
}

#[derive(Clone)]
pub struct FriendService {
    friends: Friendships,
    users: UserAccounts,
}

impl FriendService {
    pub fn new(friends: Friendships, users: UserAccounts) -> Self {
        Self { friends, users }
    }

    async fn id_of(&self, username: &str) -> AppResult<DocId> {
        Ok(self.users.get_user_by_username(username).await?.id)
    }

    pub async fn friends_of(&self, user: DocId) -> AppResult<Vec<String>> {
        let ids = self.friends.get_friends(user).await?;
        let names = usernames(&self.users, ids.iter().copied()).await?;
        Ok(ids.iter().filter_map(|id| names.get(id).cloned()).collect())
    }

    pub async fn requests_of(&self, user: DocId) -> AppResult<Vec<FriendRequestView>> {
        let requests = self.friends.get_requests(user).await?;
        let names = usernames(
            &self.users,
            requests.iter().flat_map(|r| [r.from, r.to]),
        )
        .await?;
        Ok(requests
            .into_iter()
            .map(|r| FriendRequestView {
                id: r.id,
                date_created: r.date_created,
                date_updated: r.date_updated,
                from: names.get(&r.from).cloned(),
                to: names.get(&r.to).cloned(),
                status: r.status,
            })
            .collect())
    }

    pub async fn send_request(&self, user: DocId, to: &str) -> AppResult<()> {
        let to = self.id_of(to).await?;
        self.friends.send_request(user, to).await?;
        Ok(())
    }

    pub async fn remove_request(&self, user: DocId, to: &str) -> AppResult<()> {
        let to = self.id_of(to).await?;
        self.friends.remove_request(user, to).await
    }

    pub async fn accept_request(&self, user: DocId, from: &str) -> AppResult<()> {
        let from = self.id_of(from).await?;
        self.friends.accept_request(from, user).await
    }

    pub async fn reject_request(&self, user: DocId, from: &str) -> AppResult<()> {
        let from = self.id_of(from).await?;
        self.friends.reject_request(from, user).await
    }

    pub async fn remove_friend(&self, user: DocId, friend: &str) -> AppResult<()> {
        let friend = self.id_of(friend).await?;
        self.friends.remove_friend(user, friend).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::collection::Database;

    async fn service() -> (FriendService, DocId, DocId) {
        let db = Database::in_memory().await.unwrap();
        let users = UserAccounts::new(&db);
        let alice = users.create("alice", "pw").await.unwrap().id;
        let bob = users.create("bob", "pw").await.unwrap().id;
        (FriendService::new(Friendships::new(&db), users), alice, bob)
    }

    #[tokio::test]
    async fn test_requests_shown_by_username() {
        let (friends, alice, bob) = service().await;
        friends.send_request(alice, "bob").await.unwrap();

        let requests = friends.requests_of(bob).await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].from.as_deref(), Some("alice"));
        assert_eq!(requests[0].to.as_deref(), Some("bob"));
        assert_eq!(requests[0].status, RequestStatus::Pending);

        friends.accept_request(bob, "alice").await.unwrap();
        assert_eq!(friends.friends_of(alice).await.unwrap(), vec!["bob"]);
        assert_eq!(friends.friends_of(bob).await.unwrap(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_unknown_usernames() {
        let (friends, alice, _) = service().await;
        assert!(matches!(
            friends.send_request(alice, "nobody").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            friends.send_request(alice, "alice").await,
            Err(AppError::NotAllowed(_))
        ));
    }
}
