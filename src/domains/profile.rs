// Profile registry - one profile per person

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::core::strong_types::DocId;
use crate::core::time::parse_birthdate;
use crate::error::{AppError, AppResult};
use crate::infrastructure::collection::{Collection, Database, Record};
use crate::infrastructure::database::{Document, Filter, SortOrder};

pub const PROFILES: &str = "profiles";

const PROHIBITED_UPDATES: [&str; 1] = ["person"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDoc {
    pub person: DocId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub birthdate: Option<NaiveDate>,
    #[serde(default)]
    pub posts: Vec<DocId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
}

impl ProfileUpdate {
    pub fn sanitize(update: &Document) -> AppResult<()> {
        match update.keys().find(|key| PROHIBITED_UPDATES.contains(&key.as_str())) {
            Some(key) => Err(AppError::NotAllowed(format!("Cannot update '{}' field!", key))),
            None => Ok(()),
        }
    }

    /// Build an update from an edit form. Birthdates are `yyyy/mm/dd`;
    /// fields other than the editable ones are ignored.
    pub fn from_document(update: &Document) -> AppResult<Self> {
        Self::sanitize(update)?;

        let text = |key: &str| -> AppResult<Option<String>> {
            match update.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(AppError::BadValues(format!("'{}' must be a string", key))),
            }
        };

        Ok(Self {
            name: text("name")?,
            bio: text("bio")?,
            location: text("location")?,
            birthdate: text("birthdate")?
                .filter(|raw| !raw.trim().is_empty())
                .map(|raw| parse_birthdate(&raw))
                .transpose()?,
        })
    }
}

#[derive(Clone)]
pub struct ProfileRegistry {
    profiles: Collection<ProfileDoc>,
}

impl ProfileRegistry {
    pub fn new(db: &Database) -> Self {
        Self {
            profiles: db.collection(PROFILES),
        }
    }

    fn of(person: DocId) -> Filter {
        Filter::new().eq("person", person)
    }

    pub async fn create(&self, person: DocId, name: &str) -> AppResult<Record<ProfileDoc>> {
        if self.profiles.read_one(&Self::of(person)).await?.is_some() {
            return Err(AppError::NotAllowed(format!(
                "{} already has a profile!",
                person
            )));
        }

        self.profiles
            .create(&ProfileDoc {
                person,
                name: name.to_string(),
                bio: String::new(),
                location: String::new(),
                interests: Vec::new(),
                birthdate: None,
                posts: Vec::new(),
            })
            .await?;
        info!("Profile created for {}", person);
        self.get_profile(person).await
    }

    pub async fn get_profile(&self, person: DocId) -> AppResult<Record<ProfileDoc>> {
        self.profiles
            .read_one(&Self::of(person))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile of {} does not exist!", person)))
    }

    pub async fn get_profiles(&self) -> AppResult<Vec<Record<ProfileDoc>>> {
        self.profiles
            .read_many(&Filter::new(), SortOrder::RecentlyUpdated)
            .await
    }

    pub async fn update(&self, person: DocId, update: &ProfileUpdate) -> AppResult<Record<ProfileDoc>> {
        let profile = self.get_profile(person).await?;
        if *update != ProfileUpdate::default() {
            self.profiles
                .update_one(&Filter::by_id(profile.id), update)
                .await?;
            info!("Profile of {} updated", person);
        }
        self.get_profile(person).await
    }

    /// No-op when the person has no profile
    pub async fn delete(&self, person: DocId) -> AppResult<()> {
        if self.profiles.delete_one(&Self::of(person)).await? {
            info!("Profile of {} deleted", person);
        }
        Ok(())
    }

    pub async fn is_persons_profile(&self, person: DocId, id: DocId) -> AppResult<()> {
        let profile = self
            .profiles
            .read_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {} does not exist!", id)))?;
        if profile.person != person {
            return Err(AppError::NotAllowed(format!(
                "{} is not the person of profile {}!",
                person, id
            )));
        }
        Ok(())
    }

    /// Patch derived from the person's current profile, re-derived when a
    /// concurrent write lands first
    async fn modify<F>(&self, person: DocId, edit: F) -> AppResult<()>
    where
        F: FnMut(&Record<ProfileDoc>) -> AppResult<Value> + Send,
    {
        self.profiles
            .modify(&Self::of(person), edit)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile of {} does not exist!", person)))?;
        Ok(())
    }

    pub async fn add_interest(&self, person: DocId, interest: &str) -> AppResult<()> {
        self.modify(person, |profile| {
            if profile.interests.iter().any(|i| i == interest) {
                return Err(AppError::NotAllowed("Interest already exists.".to_string()));
            }
            let mut interests = profile.interests.clone();
            interests.push(interest.to_string());
            Ok(json!({ "interests": interests }))
        })
        .await
    }

    pub async fn remove_interest(&self, person: DocId, interest: &str) -> AppResult<()> {
        self.modify(person, |profile| {
            if !profile.interests.iter().any(|i| i == interest) {
                return Err(AppError::NotAllowed("Interest does not exist.".to_string()));
            }
            let interests: Vec<&String> =
                profile.interests.iter().filter(|i| *i != interest).collect();
            Ok(json!({ "interests": interests }))
        })
        .await
    }

    pub async fn add_post(&self, person: DocId, post: DocId) -> AppResult<()> {
        if self.get_profile(person).await?.posts.contains(&post) {
            return Ok(());
        }
        self.modify(person, |profile| {
            let mut posts = profile.posts.clone();
            if !posts.contains(&post) {
                posts.push(post);
            }
            Ok(json!({ "posts": posts }))
        })
        .await
    }

    pub async fn remove_post(&self, person: DocId, post: DocId) -> AppResult<()> {
        if !self.get_profile(person).await?.posts.contains(&post) {
            return Ok(());
        }
        self.modify(person, |profile| {
            let posts: Vec<DocId> = profile.posts.iter().copied().filter(|p| *p != post).collect();
            Ok(json!({ "posts": posts }))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERSON: DocId = DocId(7);

    async fn registry() -> ProfileRegistry {
        ProfileRegistry::new(&Database::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_interest_set_semantics() {
        let profiles = registry().await;
        profiles.create(PERSON, "pat").await.unwrap();

        profiles.add_interest(PERSON, "hiking").await.unwrap();
        assert!(matches!(
            profiles.add_interest(PERSON, "hiking").await,
            Err(AppError::NotAllowed(_))
        ));
        assert_eq!(profiles.get_profile(PERSON).await.unwrap().interests, vec!["hiking"]);

        profiles.remove_interest(PERSON, "hiking").await.unwrap();
        assert!(matches!(
            profiles.remove_interest(PERSON, "hiking").await,
            Err(AppError::NotAllowed(_))
        ));
        assert!(profiles.get_profile(PERSON).await.unwrap().interests.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_list_edits_all_land() {
        let profiles = registry().await;
        profiles.create(PERSON, "pat").await.unwrap();

        let mut tasks = Vec::new();
        for n in 0..6 {
            let profiles = profiles.clone();
            tasks.push(tokio::spawn(async move {
                profiles.add_interest(PERSON, &format!("interest {}", n)).await?;
                profiles.add_post(PERSON, DocId(200 + n)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let profile = profiles.get_profile(PERSON).await.unwrap();
        assert_eq!(profile.interests.len(), 6);
        assert_eq!(profile.posts.len(), 6);
    }

    #[tokio::test]
    async fn test_one_profile_per_person() {
        let profiles = registry().await;
        profiles.create(PERSON, "pat").await.unwrap();
        assert!(matches!(
            profiles.create(PERSON, "pat again").await,
            Err(AppError::NotAllowed(_))
        ));
        assert_eq!(profiles.get_profiles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_ownership() {
        let profiles = registry().await;
        let created = profiles.create(PERSON, "pat").await.unwrap();

        let body = json!({"bio": "walks a lot", "birthdate": "1990/02/03"});
        let update = ProfileUpdate::from_document(body.as_object().unwrap()).unwrap();
        let updated = profiles.update(PERSON, &update).await.unwrap();
        assert_eq!(updated.bio, "walks a lot");
        assert_eq!(updated.name, "pat");
        assert_eq!(updated.birthdate, NaiveDate::from_ymd_opt(1990, 2, 3));

        assert!(profiles.is_persons_profile(PERSON, created.id).await.is_ok());
        assert!(matches!(
            profiles.is_persons_profile(DocId(8), created.id).await,
            Err(AppError::NotAllowed(_))
        ));
    }

    #[test]
    fn test_person_is_immutable() {
        let body = json!({"person": 9, "name": "x"});
        assert!(matches!(
            ProfileUpdate::from_document(body.as_object().unwrap()),
            Err(AppError::NotAllowed(_))
        ));
        let body = json!({"birthdate": "03/02/1990"});
        assert!(matches!(
            ProfileUpdate::from_document(body.as_object().unwrap()),
            Err(AppError::BadValues(_))
        ));
    }

    #[tokio::test]
    async fn test_post_list() {
        let profiles = registry().await;
        profiles.create(PERSON, "pat").await.unwrap();
        profiles.add_post(PERSON, DocId(100)).await.unwrap();
        profiles.add_post(PERSON, DocId(101)).await.unwrap();
        profiles.remove_post(PERSON, DocId(100)).await.unwrap();
        assert_eq!(profiles.get_profile(PERSON).await.unwrap().posts, vec![DocId(101)]);

        profiles.delete(PERSON).await.unwrap();
        profiles.delete(PERSON).await.unwrap();
        assert!(matches!(profiles.get_profile(PERSON).await, Err(AppError::NotFound(_))));
    }
}
