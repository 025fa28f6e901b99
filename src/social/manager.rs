use chrono::Utc;

use crate::database::{Database, MAX_SAVE_ATTEMPTS};
use crate::error::Error;
use crate::notification::manager as notifications;
use crate::notification::NotificationKind;
use crate::user::manager as users;
use crate::user::{add_unique, remove_id, User, UserId};

use super::{FriendRequest, FriendRequestId, FriendRequestStatus, Message, MessageId};

/// Applies `change` to a freshly read user and saves it, retrying when
/// someone else saved in between. Nothing is written if `change` reports no
/// difference.
async fn modify_user<F>(db: &dyn Database, user_id: UserId, change: F) -> Result<User, Error>
where
    F: Fn(&mut User) -> bool,
{
    for _ in 0..MAX_SAVE_ATTEMPTS {
        let mut user = users::expect_user_by_id(db, user_id).await?;
        if !change(&mut user) {
            return Ok(user);
        }

        match db.users().update_user(user).await {
            Err(Error::ConcurrentModificationDetected) => continue,
            result => return result,
        }
    }

    Err(Error::ConcurrentModificationDetected)
}

#[tracing::instrument(skip(db))]
pub async fn send_friend_request(
    db: &dyn Database,
    from: UserId,
    to: UserId,
) -> Result<FriendRequest, Error> {
    if from == to {
        return Err(Error::FriendRequestToSelf);
    }

    let sender = users::expect_user_by_id(db, from).await?;
    let recipient = users::expect_user_by_id(db, to).await?;
    if sender.is_friend(to) {
        return Err(Error::AlreadyFriends { user_id: to });
    }

    if let Some(pending) = db.friend_requests().fetch_pending_friend_request(from, to).await? {
        return Err(Error::FriendRequestAlreadyPending {
            friend_request_id: pending.id,
        });
    }

    let now = Utc::now();
    let friend_request = FriendRequest {
        id: FriendRequestId::new(),
        from,
        to,
        status: FriendRequestStatus::Pending,
        created_at: now,
        modified_at: now,
    };

    db.friend_requests()
        .insert_friend_request(&friend_request)
        .await?;

    notifications::notify(
        db,
        recipient.id,
        NotificationKind::FriendRequestReceived,
        "New friend request",
        &format!("{} wants to be your friend", sender.name),
        Some(friend_request.id.to_string()),
    )
    .await?;

    Ok(friend_request)
}

#[tracing::instrument(skip(db))]
pub async fn get_incoming_friend_requests(
    db: &dyn Database,
    user_id: UserId,
) -> Result<Vec<FriendRequest>, Error> {
    db.friend_requests()
        .fetch_incoming_friend_requests(user_id)
        .await
}

/// Requests addressed to someone else are reported as not found.
async fn expect_pending_request_to(
    db: &dyn Database,
    user_id: UserId,
    friend_request_id: FriendRequestId,
) -> Result<FriendRequest, Error> {
    let friend_request = db
        .friend_requests()
        .fetch_friend_request_by_id(friend_request_id)
        .await?
        .filter(|friend_request| friend_request.to == user_id)
        .ok_or(Error::FriendRequestNotFound { friend_request_id })?;

    if friend_request.status != FriendRequestStatus::Pending {
        return Err(Error::FriendRequestNotPending { friend_request_id });
    }

    Ok(friend_request)
}

/// Closing the request is saved first so two concurrent accepts cannot both
/// go through.
#[tracing::instrument(skip(db))]
pub async fn accept_friend_request(
    db: &dyn Database,
    user_id: UserId,
    friend_request_id: FriendRequestId,
) -> Result<FriendRequest, Error> {
    let mut friend_request = expect_pending_request_to(db, user_id, friend_request_id).await?;
    friend_request.status = FriendRequestStatus::Accepted;
    let friend_request = db
        .friend_requests()
        .update_friend_request(friend_request)
        .await?;

    let (from, to) = (friend_request.from, friend_request.to);
    modify_user(db, from, |user| add_unique(&mut user.friends, to)).await?;
    let accepter = modify_user(db, to, |user| add_unique(&mut user.friends, from)).await?;

    notifications::notify(
        db,
        from,
        NotificationKind::FriendRequestAccepted,
        "Friend request accepted",
        &format!("{} accepted your friend request", accepter.name),
        Some(friend_request.id.to_string()),
    )
    .await?;

    Ok(friend_request)
}

#[tracing::instrument(skip(db))]
pub async fn reject_friend_request(
    db: &dyn Database,
    user_id: UserId,
    friend_request_id: FriendRequestId,
) -> Result<FriendRequest, Error> {
    let mut friend_request = expect_pending_request_to(db, user_id, friend_request_id).await?;
    friend_request.status = FriendRequestStatus::Rejected;

    db.friend_requests()
        .update_friend_request(friend_request)
        .await
}

#[tracing::instrument(skip(db))]
pub async fn get_friends(db: &dyn Database, user_id: UserId) -> Result<Vec<User>, Error> {
    let user = users::expect_user_by_id(db, user_id).await?;
    if user.friends.is_empty() {
        return Ok(vec![]);
    }

    db.users().fetch_users_by_ids(&user.friends).await
}

#[tracing::instrument(skip(db))]
pub async fn unfriend(db: &dyn Database, user_id: UserId, friend: UserId) -> Result<(), Error> {
    let user = users::expect_user_by_id(db, user_id).await?;
    if !user.is_friend(friend) {
        return Err(Error::NotFriends { user_id: friend });
    }

    modify_user(db, user_id, |user| remove_id(&mut user.friends, friend)).await?;
    modify_user(db, friend, |user| remove_id(&mut user.friends, user_id)).await?;

    Ok(())
}

#[tracing::instrument(skip(db))]
pub async fn follow(db: &dyn Database, user_id: UserId, target: UserId) -> Result<User, Error> {
    if user_id == target {
        return Err(Error::CannotFollowSelf);
    }

    users::expect_user_by_id(db, target).await?;

    let user = modify_user(db, user_id, |user| add_unique(&mut user.following, target)).await?;
    modify_user(db, target, |user| add_unique(&mut user.followers, user_id)).await?;

    Ok(user)
}

#[tracing::instrument(skip(db))]
pub async fn unfollow(db: &dyn Database, user_id: UserId, target: UserId) -> Result<User, Error> {
    let user = modify_user(db, user_id, |user| remove_id(&mut user.following, target)).await?;
    modify_user(db, target, |user| remove_id(&mut user.followers, user_id)).await?;

    Ok(user)
}

#[tracing::instrument(skip(db, content))]
pub async fn send_message(
    db: &dyn Database,
    sender: UserId,
    recipient: UserId,
    content: String,
) -> Result<Message, Error> {
    let author = users::expect_user_by_id(db, sender).await?;
    if !author.is_friend(recipient) {
        return Err(Error::NotFriends { user_id: recipient });
    }

    let now = Utc::now();
    let message = Message {
        id: MessageId::new(),
        sender,
        recipient,
        content,
        read: false,
        created_at: now,
        modified_at: now,
    };

    db.messages().insert_message(&message).await?;

    notifications::notify(
        db,
        recipient,
        NotificationKind::MessageReceived,
        "New message",
        &format!("{} sent you a message", author.name),
        Some(message.id.to_string()),
    )
    .await?;

    Ok(message)
}

/// Messages between the two users, oldest first. Whatever `other` sent is
/// marked read.
#[tracing::instrument(skip(db))]
pub async fn get_conversation(
    db: &dyn Database,
    user_id: UserId,
    other: UserId,
) -> Result<Vec<Message>, Error> {
    db.messages().mark_conversation_read(other, user_id).await?;

    db.messages().fetch_conversation(user_id, other).await
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::database::test::{sample_friend_request, sample_user, MockDatabase};
    use crate::user::Role;

    #[tokio::test]
    async fn cannot_befriend_self() {
        let db = MockDatabase::new();
        let user_id = UserId::new();

        let result = send_friend_request(&db, user_id, user_id).await;

        assert_eq!(result.unwrap_err(), Error::FriendRequestToSelf);
    }

    #[tokio::test]
    async fn duplicate_pending_request_is_rejected() {
        let mut db = MockDatabase::new();
        let sender = sample_user(Role::User);
        let recipient = sample_user(Role::User);
        let (from, to) = (sender.id, recipient.id);
        db.users.on_fetch_user_by_id = Box::new(move |user_id| {
            Ok(Some(if user_id == from {
                sender.clone()
            } else {
                recipient.clone()
            }))
        });
        // the earlier request went the other way
        let pending = sample_friend_request(to, from);
        let friend_request_id = pending.id;
        db.friend_requests.on_fetch_pending_friend_request =
            Box::new(move |_, _| Ok(Some(pending.clone())));

        let result = send_friend_request(&db, from, to).await;

        assert_eq!(
            result.unwrap_err(),
            Error::FriendRequestAlreadyPending { friend_request_id }
        );
    }

    #[tokio::test]
    async fn existing_friends_cannot_request_again() {
        let mut db = MockDatabase::new();
        let mut sender = sample_user(Role::User);
        let to = UserId::new();
        sender.friends = vec![to];
        let from = sender.id;
        db.users.on_fetch_user_by_id = Box::new(move |user_id| {
            let mut user = sender.clone();
            user.id = user_id;
            Ok(Some(user))
        });

        let result = send_friend_request(&db, from, to).await;

        assert_eq!(result.unwrap_err(), Error::AlreadyFriends { user_id: to });
    }

    #[tokio::test]
    async fn accepting_makes_both_users_friends() {
        let mut db = MockDatabase::new();
        let from = sample_user(Role::User);
        let to = sample_user(Role::User);
        let (from_id, to_id) = (from.id, to.id);
        let friend_request = sample_friend_request(from_id, to_id);
        let friend_request_id = friend_request.id;
        db.friend_requests.on_fetch_friend_request_by_id =
            Box::new(move |_| Ok(Some(friend_request.clone())));
        db.friend_requests.on_update_friend_request = Box::new(Ok);
        db.users.on_fetch_user_by_id = Box::new(move |user_id| {
            Ok(Some(if user_id == from_id {
                from.clone()
            } else {
                to.clone()
            }))
        });
        let saved = Arc::new(Mutex::new(vec![]));
        let saved_clone = Arc::clone(&saved);
        db.users.on_update_user = Box::new(move |user| {
            saved_clone.lock().unwrap().push(user.clone());
            Ok(user)
        });
        db.notifications.on_insert_notifications = Box::new(|batch| {
            assert_eq!(batch[0].kind, NotificationKind::FriendRequestAccepted);
            Ok(())
        });

        let friend_request = accept_friend_request(&db, to_id, friend_request_id)
            .await
            .unwrap();

        let saved = saved.lock().unwrap();
        assert_eq!(friend_request.status, FriendRequestStatus::Accepted);
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].friends, vec![to_id]);
        assert_eq!(saved[1].friends, vec![from_id]);
    }

    #[tokio::test]
    async fn only_the_recipient_may_answer() {
        let mut db = MockDatabase::new();
        let friend_request = sample_friend_request(UserId::new(), UserId::new());
        let friend_request_id = friend_request.id;
        db.friend_requests.on_fetch_friend_request_by_id =
            Box::new(move |_| Ok(Some(friend_request.clone())));

        let result = reject_friend_request(&db, UserId::new(), friend_request_id).await;

        assert_eq!(
            result.unwrap_err(),
            Error::FriendRequestNotFound { friend_request_id }
        );
    }

    #[tokio::test]
    async fn answered_request_cannot_be_answered_again() {
        let mut db = MockDatabase::new();
        let mut friend_request = sample_friend_request(UserId::new(), UserId::new());
        friend_request.status = FriendRequestStatus::Rejected;
        let (friend_request_id, to) = (friend_request.id, friend_request.to);
        db.friend_requests.on_fetch_friend_request_by_id =
            Box::new(move |_| Ok(Some(friend_request.clone())));

        let result = accept_friend_request(&db, to, friend_request_id).await;

        assert_eq!(
            result.unwrap_err(),
            Error::FriendRequestNotPending { friend_request_id }
        );
    }

    #[tokio::test]
    async fn messages_require_friendship() {
        let mut db = MockDatabase::new();
        let user = sample_user(Role::User);
        let user_id = user.id;
        db.users.on_fetch_user_by_id = Box::new(move |_| Ok(Some(user.clone())));
        let stranger = UserId::new();

        let result = send_message(&db, user_id, stranger, "hi".into()).await;

        assert_eq!(result.unwrap_err(), Error::NotFriends { user_id: stranger });
    }

    #[tokio::test]
    async fn cannot_follow_self() {
        let db = MockDatabase::new();
        let user_id = UserId::new();

        let result = follow(&db, user_id, user_id).await;

        assert_eq!(result.unwrap_err(), Error::CannotFollowSelf);
    }

    #[tokio::test]
    async fn reading_a_conversation_marks_incoming_read() {
        let mut db = MockDatabase::new();
        let (me, other) = (UserId::new(), UserId::new());
        let marked = Arc::new(Mutex::new(None));
        let marked_clone = Arc::clone(&marked);
        db.messages.on_mark_conversation_read = Box::new(move |sender, recipient| {
            *marked_clone.lock().unwrap() = Some((sender, recipient));
            Ok(1)
        });
        db.messages.on_fetch_conversation = Box::new(|_, _| Ok(vec![]));

        get_conversation(&db, me, other).await.unwrap();

        assert_eq!(*marked.lock().unwrap(), Some((other, me)));
    }
}
