use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::database::{next_modified_at, replace_if_unmodified, MongoNotificationStore};
use crate::error::Error;
use crate::user::UserId;
use crate::utils::bson_now;

use super::{Notification, NotificationId};

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": "notifications",
            "indexes": [
                { "key": { "recipient": 1, "read": 1, "created_at": -1 }, "name": "by_recipient" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notifications(&self, notifications: &[Notification]) -> Result<(), Error>;

    async fn fetch_notifications(
        &self,
        recipient: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, Error>;

    async fn fetch_notification_by_id(
        &self,
        notification_id: NotificationId,
    ) -> Result<Option<Notification>, Error>;

    async fn count_unread_notifications(&self, recipient: UserId) -> Result<u64, Error>;

    async fn update_notification(&self, notification: Notification)
        -> Result<Notification, Error>;

    /// Returns how many notifications changed.
    async fn mark_all_notifications_read(&self, recipient: UserId) -> Result<u64, Error>;

    async fn delete_notification(&self, notification_id: NotificationId) -> Result<(), Error>;
}

#[async_trait]
impl NotificationStore for MongoNotificationStore {
    #[tracing::instrument(skip(self, notifications), fields(count = notifications.len()))]
    async fn insert_notifications(&self, notifications: &[Notification]) -> Result<(), Error> {
        if notifications.is_empty() {
            return Ok(());
        }

        self.insert_many(notifications, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_notifications(
        &self,
        recipient: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, Error> {
        let mut query = bson::doc! { "recipient": recipient };
        if unread_only {
            query.insert("read", false);
        }
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": -1 })
            .build();

        let notifications: Vec<Notification> =
            self.find(query, options).await?.try_collect().await?;

        Ok(notifications)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_notification_by_id(
        &self,
        notification_id: NotificationId,
    ) -> Result<Option<Notification>, Error> {
        let notification = self
            .find_one(bson::doc! { "_id": notification_id }, None)
            .await?;

        Ok(notification)
    }

    #[tracing::instrument(skip(self))]
    async fn count_unread_notifications(&self, recipient: UserId) -> Result<u64, Error> {
        let count = self
            .count_documents(bson::doc! { "recipient": recipient, "read": false }, None)
            .await?;

        Ok(count)
    }

    #[tracing::instrument(skip(self, notification), fields(notification_id = %notification.id))]
    async fn update_notification(
        &self,
        mut notification: Notification,
    ) -> Result<Notification, Error> {
        let read_modified_at = notification.modified_at;
        notification.modified_at = next_modified_at(read_modified_at, Utc::now());

        replace_if_unmodified(self, notification.id, read_modified_at, &notification).await?;

        Ok(notification)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_all_notifications_read(&self, recipient: UserId) -> Result<u64, Error> {
        let result = self
            .update_many(
                bson::doc! { "recipient": recipient, "read": false },
                bson::doc! { "$set": { "read": true, "modified_at": bson_now(Utc::now()) } },
                None,
            )
            .await?;

        Ok(result.modified_count)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_notification(&self, notification_id: NotificationId) -> Result<(), Error> {
        self.delete_one(bson::doc! { "_id": notification_id }, None)
            .await?;

        Ok(())
    }
}
