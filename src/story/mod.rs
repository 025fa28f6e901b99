use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::typedid::{TypedId, TypedIdMarker};
use crate::user::UserId;

pub mod db;
pub mod endpoints;
pub mod manager;
pub use endpoints::*;

pub type StoryId = TypedId<Story>;

/// How long a story stays visible after it is posted.
pub fn story_lifetime() -> Duration {
    Duration::hours(24)
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Story {
    #[serde(rename = "_id")]
    pub id: StoryId,
    pub user: UserId,
    pub media: StoryMedia,
    pub caption: Option<String>,
    #[serde(default)]
    pub viewers: Vec<UserId>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl Story {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl TypedIdMarker for Story {
    fn kind() -> &'static str {
        "story"
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct StoryMedia {
    pub media_type: StoryMediaType,
    pub url: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryMediaType {
    Image,
    Video,
}
