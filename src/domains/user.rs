// User accounts - credential storage behind login

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::core::strong_types::DocId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::collection::{Collection, Database, Record};
use crate::infrastructure::database::{Filter, SortOrder};

pub const USERS: &str = "users";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
}

/// What the outside world gets to see of an account
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: DocId,
    pub username: String,
    pub date_created: i64,
}

impl From<Record<UserDoc>> for PublicUser {
    fn from(record: Record<UserDoc>) -> Self {
        Self {
            id: record.id,
            date_created: record.date_created,
            username: record.doc.username,
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex(&hasher.finalize())
}

fn new_salt() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex(&bytes)
}

#[derive(Clone)]
pub struct UserAccounts {
    users: Collection<UserDoc>,
}

impl UserAccounts {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection(USERS),
        }
    }

    fn require_filled(username: &str, password: &str) -> AppResult<()> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AppError::BadValues(
                "Username and password must be non-empty!".to_string(),
            ));
        }
        Ok(())
    }

    async fn require_unique(&self, username: &str) -> AppResult<()> {
        let taken = self
            .users
            .read_one(&Filter::new().eq("username", username))
            .await?;
        if taken.is_some() {
            return Err(AppError::NotAllowed(format!(
                "Username {} already in use!",
                username
            )));
        }
        Ok(())
    }

    pub async fn create(&self, username: &str, password: &str) -> AppResult<PublicUser> {
        Self::require_filled(username, password)?;
        self.require_unique(username).await?;

        let salt = new_salt();
        let doc = UserDoc {
            username: username.to_string(),
            password_hash: hash_password(&salt, password),
            salt,
        };
        let id = self.users.create(&doc).await?;
        info!("Registered user {} as {}", username, id);
        self.get_user_by_id(id).await
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<DocId> {
        let record = self
            .users
            .read_one(&Filter::new().eq("username", username))
            .await?;
        match record {
            Some(user) if hash_password(&user.salt, password) == user.password_hash => Ok(user.id),
            _ => Err(AppError::Unauthorized(
                "Username or password is incorrect.".to_string(),
            )),
        }
    }

    pub async fn get_user_by_id(&self, id: DocId) -> AppResult<PublicUser> {
        self.users
            .read_by_id(id)
            .await?
            .map(PublicUser::from)
            .ok_or_else(|| AppError::NotFound("User not found!".to_string()))
    }

    pub async fn get_user_by_username(&self, username: &str) -> AppResult<PublicUser> {
        self.users
            .read_one(&Filter::new().eq("username", username))
            .await?
            .map(PublicUser::from)
            .ok_or_else(|| AppError::NotFound(format!("User with username {} does not exist!", username)))
    }

    pub async fn get_users(&self) -> AppResult<Vec<PublicUser>> {
        Ok(self
            .users
            .read_many(&Filter::new(), SortOrder::Inserted)
            .await?
            .into_iter()
            .map(PublicUser::from)
            .collect())
    }

    pub async fn update(
        &self,
        id: DocId,
        username: Option<&str>,
        password: Option<&str>,
    ) -> AppResult<PublicUser> {
        let mut patch = serde_json::Map::new();

        if let Some(username) = username {
            if username.trim().is_empty() {
                return Err(AppError::BadValues("Username must be non-empty!".to_string()));
            }
            let current = self.get_user_by_id(id).await?;
            if current.username != username {
                self.require_unique(username).await?;
            }
            patch.insert("username".to_string(), json!(username));
        }
        if let Some(password) = password {
            if password.is_empty() {
                return Err(AppError::BadValues("Password must be non-empty!".to_string()));
            }
            let salt = new_salt();
            patch.insert("passwordHash".to_string(), json!(hash_password(&salt, password)));
            patch.insert("salt".to_string(), json!(salt));
        }

        if !patch.is_empty() && !self.users.update_one(&Filter::by_id(id), &patch).await? {
            return Err(AppError::NotFound("User not found!".to_string()));
        }
        self.get_user_by_id(id).await
    }

    pub async fn delete(&self, id: DocId) -> AppResult<()> {
        if !self.users.delete_one(&Filter::by_id(id)).await? {
            return Err(AppError::NotFound("User not found!".to_string()));
        }
        info!("Deleted user {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn accounts() -> UserAccounts {
        UserAccounts::new(&Database::in_memory().await.unwrap())
    }

    #[test]
    fn test_salted_hash() {
        assert_eq!(hash_password("s", "pw"), hash_password("s", "pw"));
        assert_ne!(hash_password("s", "pw"), hash_password("t", "pw"));
        assert_eq!(hash_password("s", "pw").len(), 64);
        assert_ne!(new_salt(), new_salt());
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let accounts = accounts().await;
        let alice = accounts.create("alice", "secret").await.unwrap();

        assert_eq!(accounts.authenticate("alice", "secret").await.unwrap(), alice.id);
        assert!(matches!(
            accounts.authenticate("alice", "wrong").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            accounts.authenticate("bob", "secret").await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_usernames_are_unique_and_required() {
        let accounts = accounts().await;
        accounts.create("alice", "secret").await.unwrap();

        assert!(matches!(
            accounts.create("alice", "other").await,
            Err(AppError::NotAllowed(_))
        ));
        assert!(matches!(
            accounts.create(" ", "pw").await,
            Err(AppError::BadValues(_))
        ));
        assert!(matches!(
            accounts.create("carol", "").await,
            Err(AppError::BadValues(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let accounts = accounts().await;
        let alice = accounts.create("alice", "secret").await.unwrap();
        accounts.create("bob", "pw").await.unwrap();

        assert!(matches!(
            accounts.update(alice.id, Some("bob"), None).await,
            Err(AppError::NotAllowed(_))
        ));
        let renamed = accounts
            .update(alice.id, Some("alicia"), Some("fresh"))
            .await
            .unwrap();
        assert_eq!(renamed.username, "alicia");
        assert!(accounts.authenticate("alicia", "fresh").await.is_ok());
        assert!(accounts.authenticate("alicia", "secret").await.is_err());

        accounts.delete(alice.id).await.unwrap();
        assert!(matches!(
            accounts.get_user_by_username("alicia").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(accounts.get_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_public_view_hides_credentials() {
        let accounts = accounts().await;
        let alice = accounts.create("alice", "secret").await.unwrap();
        let value = serde_json::to_value(&alice).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("salt").is_none());
        assert_eq!(value["username"], "alice");
    }
}
