use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::database::{next_modified_at, replace_if_unmodified, MongoStoryStore};
use crate::error::Error;
use crate::typedid::to_bson_array;
use crate::user::UserId;
use crate::utils::bson_now;

use super::{Story, StoryId};

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": "stories",
            "indexes": [
                // mongo removes the document once expires_at has passed
                { "key": { "expires_at": 1 }, "name": "expiry", "expireAfterSeconds": 0 },
                { "key": { "user": 1, "created_at": -1 }, "name": "by_user" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

/// The TTL monitor only runs once a minute, so every read also filters on
/// `expires_at`.
#[async_trait]
pub trait StoryStore: Send + Sync {
    async fn insert_story(&self, story: &Story) -> Result<(), Error>;

    async fn fetch_story_by_id(&self, story_id: StoryId) -> Result<Option<Story>, Error>;

    /// Unexpired stories of any of the given users, newest first.
    async fn fetch_live_stories_by_users(
        &self,
        users: &[UserId],
        now: DateTime<Utc>,
    ) -> Result<Vec<Story>, Error>;

    async fn update_story(&self, story: Story) -> Result<Story, Error>;

    async fn delete_story(&self, story_id: StoryId) -> Result<(), Error>;

    async fn count_live_stories(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}

#[async_trait]
impl StoryStore for MongoStoryStore {
    #[tracing::instrument(skip(self, story), fields(story_id = %story.id))]
    async fn insert_story(&self, story: &Story) -> Result<(), Error> {
        self.insert_one(story, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_story_by_id(&self, story_id: StoryId) -> Result<Option<Story>, Error> {
        let story = self.find_one(bson::doc! { "_id": story_id }, None).await?;

        Ok(story)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_live_stories_by_users(
        &self,
        users: &[UserId],
        now: DateTime<Utc>,
    ) -> Result<Vec<Story>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": -1 })
            .build();

        let stories: Vec<Story> = self
            .find(
                bson::doc! {
                    "user": { "$in": to_bson_array(users) },
                    "expires_at": { "$gt": bson_now(now) },
                },
                options,
            )
            .await?
            .try_collect()
            .await?;

        Ok(stories)
    }

    #[tracing::instrument(skip(self, story), fields(story_id = %story.id))]
    async fn update_story(&self, mut story: Story) -> Result<Story, Error> {
        let read_modified_at = story.modified_at;
        story.modified_at = next_modified_at(read_modified_at, Utc::now());

        replace_if_unmodified(self, story.id, read_modified_at, &story).await?;

        Ok(story)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_story(&self, story_id: StoryId) -> Result<(), Error> {
        self.delete_one(bson::doc! { "_id": story_id }, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn count_live_stories(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let count = self
            .count_documents(bson::doc! { "expires_at": { "$gt": bson_now(now) } }, None)
            .await?;

        Ok(count)
    }
}
