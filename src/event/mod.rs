use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::typedid::{TypedId, TypedIdMarker};
use crate::user::UserId;
use crate::vendor::VendorId;

pub mod db;
pub mod endpoints;
pub mod manager;
pub use endpoints::*;

pub type EventId = TypedId<Event>;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub venue: Venue,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    pub capacity: u32,
    pub tickets_sold: u32,
    pub price: f64,
    pub currency: String,
    pub organizer: UserId,
    #[serde(default)]
    pub vendors: Vec<VendorId>,
    pub status: EventStatus,
    pub image: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl Event {
    pub fn tickets_available(&self) -> u32 {
        self.capacity.saturating_sub(self.tickets_sold)
    }

    /// Tickets can be bought for published events that have not ended.
    pub fn is_on_sale(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Published && self.end_date > now
    }
}

impl TypedIdMarker for Event {
    fn kind() -> &'static str {
        "event"
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, validator::Validate)]
pub struct Venue {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    #[validate(length(min = 1, max = 80))]
    pub city: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Completed => "completed",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventFilter {
    pub city: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub upcoming: bool,
}
