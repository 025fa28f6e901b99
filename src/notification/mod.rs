use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::typedid::{TypedId, TypedIdMarker};
use crate::user::UserId;

pub mod db;
pub mod endpoints;
pub mod manager;
pub use endpoints::*;

pub type NotificationId = TypedId<Notification>;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: NotificationId,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read: bool,
    /// Id of the document the notification is about, if any.
    pub reference: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl TypedIdMarker for Notification {
    fn kind() -> &'static str {
        "notification"
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FriendRequestReceived,
    FriendRequestAccepted,
    MessageReceived,
    TicketPurchased,
    EventCancelled,
    OrderPlaced,
    OrderStatusChanged,
    VendorRequestReceived,
    VendorRequestAnswered,
    AdBudgetExhausted,
    Broadcast,
}
