use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::database::{
    next_modified_at, replace_if_unmodified, MongoFriendRequestStore, MongoMessageStore,
};
use crate::error::Error;
use crate::user::UserId;
use crate::utils::bson_now;

use super::{FriendRequest, FriendRequestId, FriendRequestStatus, Message};

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": "friend_requests",
            "indexes": [
                { "key": { "to": 1, "status": 1 }, "name": "by_recipient" },
                { "key": { "from": 1, "to": 1, "status": 1 }, "name": "by_pair" },
            ]
        },
        None,
    )
    .await?;

    db.run_command(
        bson::doc! {
            "createIndexes": "messages",
            "indexes": [
                { "key": { "sender": 1, "recipient": 1, "created_at": 1 }, "name": "by_conversation" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait FriendRequestStore: Send + Sync {
    async fn insert_friend_request(&self, friend_request: &FriendRequest) -> Result<(), Error>;

    async fn fetch_friend_request_by_id(
        &self,
        friend_request_id: FriendRequestId,
    ) -> Result<Option<FriendRequest>, Error>;

    /// A pending request between the two users, in either direction.
    async fn fetch_pending_friend_request(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<FriendRequest>, Error>;

    /// Pending requests sent to the user, newest first.
    async fn fetch_incoming_friend_requests(
        &self,
        user_id: UserId,
    ) -> Result<Vec<FriendRequest>, Error>;

    async fn update_friend_request(
        &self,
        friend_request: FriendRequest,
    ) -> Result<FriendRequest, Error>;
}

#[async_trait]
impl FriendRequestStore for MongoFriendRequestStore {
    #[tracing::instrument(skip(self, friend_request), fields(friend_request_id = %friend_request.id))]
    async fn insert_friend_request(&self, friend_request: &FriendRequest) -> Result<(), Error> {
        self.insert_one(friend_request, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_friend_request_by_id(
        &self,
        friend_request_id: FriendRequestId,
    ) -> Result<Option<FriendRequest>, Error> {
        let friend_request = self
            .find_one(bson::doc! { "_id": friend_request_id }, None)
            .await?;

        Ok(friend_request)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_pending_friend_request(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<FriendRequest>, Error> {
        let friend_request = self
            .find_one(
                bson::doc! {
                    "status": FriendRequestStatus::Pending.as_str(),
                    "$or": [
                        { "from": a, "to": b },
                        { "from": b, "to": a },
                    ],
                },
                None,
            )
            .await?;

        Ok(friend_request)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_incoming_friend_requests(
        &self,
        user_id: UserId,
    ) -> Result<Vec<FriendRequest>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": -1 })
            .build();

        let friend_requests: Vec<FriendRequest> = self
            .find(
                bson::doc! { "to": user_id, "status": FriendRequestStatus::Pending.as_str() },
                options,
            )
            .await?
            .try_collect()
            .await?;

        Ok(friend_requests)
    }

    #[tracing::instrument(skip(self, friend_request), fields(friend_request_id = %friend_request.id))]
    async fn update_friend_request(
        &self,
        mut friend_request: FriendRequest,
    ) -> Result<FriendRequest, Error> {
        let read_modified_at = friend_request.modified_at;
        friend_request.modified_at = next_modified_at(read_modified_at, Utc::now());

        replace_if_unmodified(self, friend_request.id, read_modified_at, &friend_request).await?;

        Ok(friend_request)
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, message: &Message) -> Result<(), Error>;

    /// Every message between the two users, oldest first.
    async fn fetch_conversation(&self, a: UserId, b: UserId) -> Result<Vec<Message>, Error>;

    /// Marks everything `sender` sent to `recipient` as read. Returns how many
    /// messages changed.
    async fn mark_conversation_read(&self, sender: UserId, recipient: UserId)
        -> Result<u64, Error>;
}

#[async_trait]
impl MessageStore for MongoMessageStore {
    #[tracing::instrument(skip(self, message), fields(message_id = %message.id))]
    async fn insert_message(&self, message: &Message) -> Result<(), Error> {
        self.insert_one(message, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_conversation(&self, a: UserId, b: UserId) -> Result<Vec<Message>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": 1 })
            .build();

        let messages: Vec<Message> = self
            .find(
                bson::doc! {
                    "$or": [
                        { "sender": a, "recipient": b },
                        { "sender": b, "recipient": a },
                    ],
                },
                options,
            )
            .await?
            .try_collect()
            .await?;

        Ok(messages)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_conversation_read(
        &self,
        sender: UserId,
        recipient: UserId,
    ) -> Result<u64, Error> {
        let result = self
            .update_many(
                bson::doc! { "sender": sender, "recipient": recipient, "read": false },
                bson::doc! { "$set": { "read": true, "modified_at": bson_now(Utc::now()) } },
                None,
            )
            .await?;

        Ok(result.modified_count)
    }
}
