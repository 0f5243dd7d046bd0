// Post thread - authored posts with one-level reply links

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::strong_types::DocId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::collection::{Collection, Database, Record};
use crate::infrastructure::database::{Document, Filter, SortOrder, ID_FIELD};

pub const POSTS: &str = "posts";

const ALLOWED_UPDATES: [&str; 2] = ["content", "options"];

/// Display options. Written as a whole on edit: unset options serialize as
/// `null`, which the store's merge treats as a removal, so `{"options": {}}`
/// clears every option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostOptions {
    #[serde(default)]
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDoc {
    pub author: DocId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<DocId>,
    #[serde(default)]
    pub options: PostOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<PostOptions>,
}

impl PostUpdate {
    pub fn from_document(update: &Document) -> AppResult<Self> {
        if let Some(key) = update
            .keys()
            .find(|key| !ALLOWED_UPDATES.contains(&key.as_str()))
        {
            return Err(AppError::NotAllowed(format!("Cannot update '{}' field!", key)));
        }
        serde_json::from_value(serde_json::Value::Object(update.clone()))
            .map_err(|e| AppError::BadValues(format!("Invalid post update: {}", e)))
    }
}

/// A post with its direct replies
#[derive(Debug, Clone)]
pub struct Thread {
    pub post: Record<PostDoc>,
    pub comments: Vec<Record<PostDoc>>,
}

#[derive(Clone)]
pub struct PostThread {
    posts: Collection<PostDoc>,
}

impl PostThread {
    pub fn new(db: &Database) -> Self {
        Self {
            posts: db.collection(POSTS),
        }
    }

    fn not_found(id: DocId) -> AppError {
        AppError::NotFound(format!("Post {} does not exist!", id))
    }

    pub async fn create(
        &self,
        author: DocId,
        content: String,
        reply_to: Option<DocId>,
        options: PostOptions,
    ) -> AppResult<Record<PostDoc>> {
        if let Some(parent) = reply_to {
            self.get_post(parent).await?;
        }

        let id = self
            .posts
            .create(&PostDoc {
                author,
                content,
                reply_to,
                options,
            })
            .await?;
        match reply_to {
            Some(parent) => info!("Post {} by {} replies to {}", id, author, parent),
            None => info!("Post {} created by {}", id, author),
        }
        self.get_post(id).await
    }

    pub async fn get_post(&self, id: DocId) -> AppResult<Record<PostDoc>> {
        self.posts
            .read_by_id(id)
            .await?
            .ok_or_else(|| Self::not_found(id))
    }

    /// Most recently updated first
    pub async fn get_posts(&self, filter: &Filter) -> AppResult<Vec<Record<PostDoc>>> {
        self.posts.read_many(filter, SortOrder::RecentlyUpdated).await
    }

    pub async fn get_by_author(&self, author: DocId) -> AppResult<Vec<Record<PostDoc>>> {
        self.get_posts(&Filter::new().eq("author", author)).await
    }

    pub async fn get_many(&self, ids: &[DocId]) -> AppResult<Vec<Record<PostDoc>>> {
        self.get_posts(&Filter::new().one_of(ID_FIELD, ids.iter().copied()))
            .await
    }

    /// The post and the posts replying directly to it. Replies to replies
    /// need their own call.
    pub async fn get_thread(&self, id: DocId) -> AppResult<Thread> {
        let post = self.get_post(id).await?;
        let comments = self.get_posts(&Filter::new().eq("replyTo", id)).await?;
        Ok(Thread { post, comments })
    }

    pub async fn is_author(&self, user: DocId, id: DocId) -> AppResult<Record<PostDoc>> {
        let post = self.get_post(id).await?;
        if post.author != user {
            return Err(AppError::NotAllowed(format!(
                "{} is not the author of post {}!",
                user, id
            )));
        }
        Ok(post)
    }

    pub async fn update(
        &self,
        actor: DocId,
        id: DocId,
        update: &PostUpdate,
    ) -> AppResult<Record<PostDoc>> {
        self.is_author(actor, id).await?;
        if *update != PostUpdate::default() {
            self.posts.update_one(&Filter::by_id(id), update).await?;
            info!("Post {} updated", id);
        }
        self.get_post(id).await
    }

    pub async fn delete(&self, actor: DocId, id: DocId) -> AppResult<()> {
        self.is_author(actor, id).await?;
        self.posts.delete_one(&Filter::by_id(id)).await?;
        info!("Post {} deleted", id);
        Ok(())
    }
}
