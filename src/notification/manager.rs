use chrono::Utc;

use crate::database::Database;
use crate::error::Error;
use crate::user::{Role, UserId};

use super::{Notification, NotificationId, NotificationKind};

/// Sends the same notification to each recipient in one write.
#[tracing::instrument(skip(db, body))]
pub async fn notify_many(
    db: &dyn Database,
    recipients: &[UserId],
    kind: NotificationKind,
    title: &str,
    body: &str,
    reference: Option<String>,
) -> Result<u64, Error> {
    if recipients.is_empty() {
        return Ok(0);
    }

    let now = Utc::now();
    let notifications: Vec<Notification> = recipients
        .iter()
        .map(|recipient| Notification {
            id: NotificationId::new(),
            recipient: *recipient,
            kind,
            title: title.to_owned(),
            body: body.to_owned(),
            read: false,
            reference: reference.clone(),
            created_at: now,
            modified_at: now,
        })
        .collect();

    db.notifications()
        .insert_notifications(&notifications)
        .await?;

    Ok(notifications.len() as u64)
}

#[tracing::instrument(skip(db, body))]
pub async fn notify(
    db: &dyn Database,
    recipient: UserId,
    kind: NotificationKind,
    title: &str,
    body: &str,
    reference: Option<String>,
) -> Result<(), Error> {
    notify_many(db, &[recipient], kind, title, body, reference).await?;

    Ok(())
}

/// Notifies every user, or every user with the given role. Returns how
/// many were notified.
#[tracing::instrument(skip(db, body))]
pub async fn broadcast(
    db: &dyn Database,
    role: Option<Role>,
    title: &str,
    body: &str,
) -> Result<u64, Error> {
    let recipients: Vec<UserId> = db
        .users()
        .fetch_users(role)
        .await?
        .into_iter()
        .map(|user| user.id)
        .collect();

    notify_many(db, &recipients, NotificationKind::Broadcast, title, body, None).await
}

#[tracing::instrument(skip(db))]
pub async fn get_notifications(
    db: &dyn Database,
    recipient: UserId,
    unread_only: bool,
) -> Result<Vec<Notification>, Error> {
    db.notifications()
        .fetch_notifications(recipient, unread_only)
        .await
}

#[tracing::instrument(skip(db))]
pub async fn count_unread(db: &dyn Database, recipient: UserId) -> Result<u64, Error> {
    db.notifications()
        .count_unread_notifications(recipient)
        .await
}

/// Someone else's notification is reported as not found.
async fn expect_own_notification(
    db: &dyn Database,
    recipient: UserId,
    notification_id: NotificationId,
) -> Result<Notification, Error> {
    db.notifications()
        .fetch_notification_by_id(notification_id)
        .await?
        .filter(|notification| notification.recipient == recipient)
        .ok_or(Error::NotificationNotFound { notification_id })
}

#[tracing::instrument(skip(db))]
pub async fn mark_read(
    db: &dyn Database,
    recipient: UserId,
    notification_id: NotificationId,
) -> Result<Notification, Error> {
    let mut notification = expect_own_notification(db, recipient, notification_id).await?;
    if notification.read {
        return Ok(notification);
    }

    notification.read = true;

    db.notifications().update_notification(notification).await
}

#[tracing::instrument(skip(db))]
pub async fn mark_all_read(db: &dyn Database, recipient: UserId) -> Result<u64, Error> {
    db.notifications()
        .mark_all_notifications_read(recipient)
        .await
}

#[tracing::instrument(skip(db))]
pub async fn delete_notification(
    db: &dyn Database,
    recipient: UserId,
    notification_id: NotificationId,
) -> Result<(), Error> {
    expect_own_notification(db, recipient, notification_id).await?;

    db.notifications()
        .delete_notification(notification_id)
        .await
}
