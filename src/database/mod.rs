use chrono::{DateTime, Utc};
use mongodb::bson::{self, Bson};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::Collection;
use serde::Serialize;

use crate::advertisement::db::AdvertisementStore;
use crate::advertisement::Advertisement;
use crate::error::Error;
use crate::event::db::EventStore;
use crate::event::Event;
use crate::notification::db::NotificationStore;
use crate::notification::Notification;
use crate::order::db::OrderStore;
use crate::order::Order;
use crate::social::db::{FriendRequestStore, MessageStore};
use crate::social::{FriendRequest, Message};
use crate::story::db::StoryStore;
use crate::story::Story;
use crate::ticket::db::TicketStore;
use crate::ticket::Ticket;
use crate::user::db::UserStore;
use crate::user::User;
use crate::vendor::db::{VendorRequestStore, VendorStore};
use crate::vendor::{Vendor, VendorRequest};


/// How often a read-modify-write is retried after losing a race.
pub const MAX_SAVE_ATTEMPTS: usize = 5;

pub type MongoUserStore = Collection<User>;
pub type MongoEventStore = Collection<Event>;
pub type MongoVendorStore = Collection<Vendor>;
pub type MongoVendorRequestStore = Collection<VendorRequest>;
pub type MongoTicketStore = Collection<Ticket>;
pub type MongoOrderStore = Collection<Order>;
pub type MongoAdvertisementStore = Collection<Advertisement>;
pub type MongoStoryStore = Collection<Story>;
pub type MongoFriendRequestStore = Collection<FriendRequest>;
pub type MongoMessageStore = Collection<Message>;
pub type MongoNotificationStore = Collection<Notification>;

pub trait Database: Send + Sync {
    fn users(&self) -> &dyn UserStore;
    fn events(&self) -> &dyn EventStore;
    fn vendors(&self) -> &dyn VendorStore;
    fn vendor_requests(&self) -> &dyn VendorRequestStore;
    fn tickets(&self) -> &dyn TicketStore;
    fn orders(&self) -> &dyn OrderStore;
    fn advertisements(&self) -> &dyn AdvertisementStore;
    fn stories(&self) -> &dyn StoryStore;
    fn friend_requests(&self) -> &dyn FriendRequestStore;
    fn messages(&self) -> &dyn MessageStore;
    fn notifications(&self) -> &dyn NotificationStore;
}

#[derive(Debug, Clone)]
pub struct MongoDatabase {
    users: MongoUserStore,
    events: MongoEventStore,
    vendors: MongoVendorStore,
    vendor_requests: MongoVendorRequestStore,
    tickets: MongoTicketStore,
    orders: MongoOrderStore,
    advertisements: MongoAdvertisementStore,
    stories: MongoStoryStore,
    friend_requests: MongoFriendRequestStore,
    messages: MongoMessageStore,
    notifications: MongoNotificationStore,
}

impl MongoDatabase {
    pub async fn initialize(db: mongodb::Database) -> Result<MongoDatabase, Error> {
        // ping the database to ensure connection is established
        db.run_command(bson::doc! { "ping": 1 }, None).await?;

        crate::user::db::initialize(&db).await?;
        crate::event::db::initialize(&db).await?;
        crate::vendor::db::initialize(&db).await?;
        crate::ticket::db::initialize(&db).await?;
        crate::order::db::initialize(&db).await?;
        crate::advertisement::db::initialize(&db).await?;
        crate::story::db::initialize(&db).await?;
        crate::social::db::initialize(&db).await?;
        crate::notification::db::initialize(&db).await?;

        Ok(MongoDatabase {
            users: db.collection("users"),
            events: db.collection("events"),
            vendors: db.collection("vendors"),
            vendor_requests: db.collection("vendor_requests"),
            tickets: db.collection("tickets"),
            orders: db.collection("orders"),
            advertisements: db.collection("advertisements"),
            stories: db.collection("stories"),
            friend_requests: db.collection("friend_requests"),
            messages: db.collection("messages"),
            notifications: db.collection("notifications"),
        })
    }
}

impl Database for MongoDatabase {
    fn users(&self) -> &dyn UserStore {
        &self.users
    }

    fn events(&self) -> &dyn EventStore {
        &self.events
    }

    fn vendors(&self) -> &dyn VendorStore {
        &self.vendors
    }

    fn vendor_requests(&self) -> &dyn VendorRequestStore {
        &self.vendor_requests
    }

    fn tickets(&self) -> &dyn TicketStore {
        &self.tickets
    }

    fn orders(&self) -> &dyn OrderStore {
        &self.orders
    }

    fn advertisements(&self) -> &dyn AdvertisementStore {
        &self.advertisements
    }

    fn stories(&self) -> &dyn StoryStore {
        &self.stories
    }

    fn friend_requests(&self) -> &dyn FriendRequestStore {
        &self.friend_requests
    }

    fn messages(&self) -> &dyn MessageStore {
        &self.messages
    }

    fn notifications(&self) -> &dyn NotificationStore {
        &self.notifications
    }
}

/// The `modified_at` to store with the next save of a document read at
/// `read_modified_at`. Stored times keep only milliseconds, so the result is
/// truncated and always at least one millisecond past the read version.
pub fn next_modified_at(read_modified_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let read = bson::DateTime::from_chrono(read_modified_at).timestamp_millis();
    let now = bson::DateTime::from_chrono(now).timestamp_millis();

    bson::DateTime::from_millis(now.max(read + 1)).to_chrono()
}

/// Replaces a whole document, but only if nobody else has saved it since it
/// was read. Every document carries `modified_at`, which doubles as the
/// version checked here; saves must stamp it with [`next_modified_at`].
pub async fn replace_if_unmodified<T>(
    collection: &Collection<T>,
    id: impl Into<Bson>,
    read_modified_at: DateTime<Utc>,
    document: &T,
) -> Result<(), Error>
where
    T: Serialize,
{
    let result = collection
        .replace_one(
            bson::doc! {
                "_id": id.into(),
                "modified_at": bson::DateTime::from_chrono(read_modified_at),
            },
            document,
            None,
        )
        .await?;

    if result.matched_count == 0 {
        return Err(Error::ConcurrentModificationDetected);
    }

    Ok(())
}

pub fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::database::test::sample_notification;
    use crate::user::UserId;

    /// The `modified_at` value as MongoDB compares it.
    fn stored_version(notification: &Notification) -> Bson {
        let document = bson::to_document(notification).unwrap();
        document.get("modified_at").cloned().unwrap()
    }

    #[test]
    fn saves_within_one_millisecond_change_the_version() {
        let read_at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let mut notification = sample_notification(UserId::new());
        notification.modified_at = read_at;

        // both writers hold the same version, the first one saves
        let stale_filter = Bson::DateTime(bson::DateTime::from_chrono(read_at));
        notification.modified_at = next_modified_at(read_at, read_at + Duration::microseconds(400));

        assert_ne!(stored_version(&notification), stale_filter);
        assert_eq!(notification.modified_at, read_at + Duration::milliseconds(1));
    }

    #[test]
    fn version_advances_when_the_clock_is_behind() {
        let read_at = Utc.timestamp_millis_opt(1_700_000_000_500).unwrap();

        let next = next_modified_at(read_at, read_at - Duration::seconds(2));

        assert_eq!(next, read_at + Duration::milliseconds(1));
    }

    #[test]
    fn version_uses_the_clock_truncated_to_milliseconds() {
        let read_at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let now = read_at + Duration::seconds(3) + Duration::microseconds(250);

        let next = next_modified_at(read_at, now);

        assert_eq!(next, read_at + Duration::seconds(3));
    }
}
