// Friendships - requests between two users and the friendships they form

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::core::strong_types::DocId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::collection::{Collection, Database, Record};
use crate::infrastructure::database::{Filter, SortOrder};

pub const FRIEND_REQUESTS: &str = "friendRequests";
pub const FRIENDSHIPS: &str = "friendships";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequestDoc {
    pub from: DocId,
    pub to: DocId,
    pub status: RequestStatus,
}

/// Unordered pair, stored with the smaller id first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendshipDoc {
    pub members: [DocId; 2],
}

impl FriendshipDoc {
    fn between(a: DocId, b: DocId) -> Self {
        Self {
            members: if a <= b { [a, b] } else { [b, a] },
        }
    }

    pub fn other(&self, user: DocId) -> DocId {
        if self.members[0] == user {
            self.members[1]
        } else {
            self.members[0]
        }
    }
}

#[derive(Clone)]
pub struct Friendships {
    requests: Collection<FriendRequestDoc>,
    friendships: Collection<FriendshipDoc>,
}

impl Friendships {
    pub fn new(db: &Database) -> Self {
        Self {
            requests: db.collection(FRIEND_REQUESTS),
            friendships: db.collection(FRIENDSHIPS),
        }
    }

    fn pair(a: DocId, b: DocId) -> Filter {
        Filter::new().contains("members", a).contains("members", b)
    }

    fn pending(from: DocId, to: DocId) -> Filter {
        Filter::new()
            .eq("from", from)
            .eq("to", to)
            .eq("status", RequestStatus::Pending.as_str())
    }

    pub async fn are_friends(&self, a: DocId, b: DocId) -> AppResult<bool> {
        Ok(self.friendships.read_one(&Self::pair(a, b)).await?.is_some())
    }

    /// Ids of everyone `user` is friends with, oldest friendship first
    pub async fn get_friends(&self, user: DocId) -> AppResult<Vec<DocId>> {
        let friendships = self
            .friendships
            .read_many(&Filter::new().contains("members", user), SortOrder::Inserted)
            .await?;
        Ok(friendships.iter().map(|f| f.other(user)).collect())
    }

    /// Requests `user` sent or received, in every status, most recently updated first
    pub async fn get_requests(&self, user: DocId) -> AppResult<Vec<Record<FriendRequestDoc>>> {
        let mut requests = self
            .requests
            .read_many(&Filter::new().eq("from", user), SortOrder::RecentlyUpdated)
            .await?;
        requests.extend(
            self.requests
                .read_many(&Filter::new().eq("to", user), SortOrder::RecentlyUpdated)
                .await?
                .into_iter()
                .filter(|r| r.from != user),
        );
        requests.sort_by(|a, b| {
            b.date_updated
                .cmp(&a.date_updated)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(requests)
    }

    pub async fn send_request(&self, from: DocId, to: DocId) -> AppResult<Record<FriendRequestDoc>> {
        if from == to {
            return Err(AppError::NotAllowed(
                "Cannot send a friend request to yourself!".to_string(),
            ));
        }
        if self.are_friends(from, to).await? {
            return Err(AppError::NotAllowed(format!(
                "{} and {} are already friends!",
                from, to
            )));
        }
        for filter in [Self::pending(from, to), Self::pending(to, from)] {
            if self.requests.read_one(&filter).await?.is_some() {
                return Err(AppError::NotAllowed(format!(
                    "Friend request between {} and {} already exists!",
                    from, to
                )));
            }
        }

        let id = self
            .requests
            .create(&FriendRequestDoc {
                from,
                to,
                status: RequestStatus::Pending,
            })
            .await?;
        info!("Friend request {} sent from {} to {}", id, from, to);
        self.requests
            .read_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Friend request {} does not exist!", id)))
    }

    /// Withdraw a pending request `from` sent to `to`
    pub async fn remove_request(&self, from: DocId, to: DocId) -> AppResult<()> {
        if !self.requests.delete_one(&Self::pending(from, to)).await? {
            return Err(Self::no_request(from, to));
        }
        info!("Friend request from {} to {} withdrawn", from, to);
        Ok(())
    }

    pub async fn accept_request(&self, from: DocId, to: DocId) -> AppResult<()> {
        self.resolve(from, to, RequestStatus::Accepted).await?;
        if !self.are_friends(from, to).await? {
            self.friendships.create(&FriendshipDoc::between(from, to)).await?;
        }
        info!("{} and {} are now friends", from, to);
        Ok(())
    }

    pub async fn reject_request(&self, from: DocId, to: DocId) -> AppResult<()> {
        self.resolve(from, to, RequestStatus::Rejected).await?;
        info!("Friend request from {} to {} rejected", from, to);
        Ok(())
    }

    // The pending filter no longer matches once another writer resolves the
    // request, so only one of two racing answers succeeds.
    async fn resolve(&self, from: DocId, to: DocId, status: RequestStatus) -> AppResult<()> {
        self.requests
            .modify(&Self::pending(from, to), |_| {
                Ok(json!({ "status": status.as_str() }))
            })
            .await?
            .map(|_| ())
            .ok_or_else(|| Self::no_request(from, to))
    }

    pub async fn remove_friend(&self, user: DocId, friend: DocId) -> AppResult<()> {
        if !self.friendships.delete_one(&Self::pair(user, friend)).await? {
            return Err(AppError::NotFound(format!(
                "{} and {} are not friends!",
                user, friend
            )));
        }
        info!("{} and {} are no longer friends", user, friend);
        Ok(())
    }

    /// Drop every friendship and request involving `user`
    pub async fn forget(&self, user: DocId) -> AppResult<u64> {
        let mut removed = self
            .friendships
            .delete_many(&Filter::new().contains("members", user))
            .await?;
        removed += self.requests.delete_many(&Filter::new().eq("from", user)).await?;
        removed += self.requests.delete_many(&Filter::new().eq("to", user)).await?;
        Ok(removed)
    }

    fn no_request(from: DocId, to: DocId) -> AppError {
        AppError::NotFound(format!(
            "Friend request from {} to {} does not exist!",
            from, to
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: DocId = DocId(1);
    const BOB: DocId = DocId(2);
    const CAROL: DocId = DocId(3);

    async fn friendships() -> Friendships {
        Friendships::new(&Database::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_request_accept_flow() {
        let f = friendships().await;
        let request = f.send_request(ALICE, BOB).await.unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(!f.are_friends(ALICE, BOB).await.unwrap());

        f.accept_request(ALICE, BOB).await.unwrap();
        assert_eq!(f.get_friends(ALICE).await.unwrap(), vec![BOB]);
        assert_eq!(f.get_friends(BOB).await.unwrap(), vec![ALICE]);

        let requests = f.get_requests(BOB).await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].status, RequestStatus::Accepted);

        assert!(matches!(
            f.accept_request(ALICE, BOB).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_self_and_duplicate_requests_refused() {
        let f = friendships().await;
        assert!(matches!(
            f.send_request(ALICE, ALICE).await,
            Err(AppError::NotAllowed(_))
        ));

        f.send_request(ALICE, BOB).await.unwrap();
        assert!(matches!(
            f.send_request(ALICE, BOB).await,
            Err(AppError::NotAllowed(_))
        ));
        assert!(matches!(
            f.send_request(BOB, ALICE).await,
            Err(AppError::NotAllowed(_))
        ));

        f.accept_request(ALICE, BOB).await.unwrap();
        assert!(matches!(
            f.send_request(BOB, ALICE).await,
            Err(AppError::NotAllowed(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_allows_a_new_request() {
        let f = friendships().await;
        f.send_request(ALICE, BOB).await.unwrap();
        f.reject_request(ALICE, BOB).await.unwrap();
        assert!(f.get_friends(BOB).await.unwrap().is_empty());
        assert!(matches!(
            f.reject_request(ALICE, BOB).await,
            Err(AppError::NotFound(_))
        ));

        f.send_request(ALICE, BOB).await.unwrap();
        let statuses: Vec<_> = f
            .get_requests(ALICE)
            .await
            .unwrap()
            .iter()
            .map(|r| r.status)
            .collect();
        assert_eq!(statuses, vec![RequestStatus::Pending, RequestStatus::Rejected]);
    }

    #[tokio::test]
    async fn test_withdraw_and_unfriend() {
        let f = friendships().await;
        f.send_request(ALICE, BOB).await.unwrap();
        assert!(matches!(
            f.remove_request(BOB, ALICE).await,
            Err(AppError::NotFound(_))
        ));
        f.remove_request(ALICE, BOB).await.unwrap();
        assert!(f.get_requests(BOB).await.unwrap().is_empty());

        f.send_request(CAROL, ALICE).await.unwrap();
        f.accept_request(CAROL, ALICE).await.unwrap();
        assert!(matches!(
            f.remove_friend(ALICE, BOB).await,
            Err(AppError::NotFound(_))
        ));
        f.remove_friend(ALICE, CAROL).await.unwrap();
        assert!(f.get_friends(CAROL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_answers_resolve_once() {
        let f = friendships().await;
        f.send_request(ALICE, BOB).await.unwrap();

        let accept = {
            let f = f.clone();
            tokio::spawn(async move { f.accept_request(ALICE, BOB).await })
        };
        let reject = {
            let f = f.clone();
            tokio::spawn(async move { f.reject_request(ALICE, BOB).await })
        };
        let outcomes = [accept.await.unwrap(), reject.await.unwrap()];
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        assert_eq!(f.get_requests(ALICE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_forget_removes_everything() {
        let f = friendships().await;
        f.send_request(ALICE, BOB).await.unwrap();
        f.accept_request(ALICE, BOB).await.unwrap();
        f.send_request(CAROL, ALICE).await.unwrap();
        f.send_request(BOB, CAROL).await.unwrap();

        assert_eq!(f.forget(ALICE).await.unwrap(), 3);
        assert!(f.get_friends(BOB).await.unwrap().is_empty());
        assert_eq!(f.get_requests(CAROL).await.unwrap().len(), 1);
    }
}
