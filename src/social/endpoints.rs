use actix_web::web::{Data, Json, Path};
use actix_web::{delete, get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::AuthUser;
use crate::database::Database;
use crate::error::Error;
use crate::user::{ProfileBody, UserId};
use crate::utils::SuccessBody;

use super::manager;
use super::{FriendRequest, FriendRequestId, FriendRequestStatus, Message, MessageId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FriendRequestBody {
    pub id: FriendRequestId,
    pub from: UserId,
    pub to: UserId,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
}

impl FriendRequestBody {
    pub fn render(friend_request: FriendRequest) -> FriendRequestBody {
        FriendRequestBody {
            id: friend_request.id,
            from: friend_request.from,
            to: friend_request.to,
            status: friend_request.status,
            created_at: friend_request.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub id: MessageId,
    pub sender: UserId,
    pub recipient: UserId,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageBody {
    pub fn render(message: Message) -> MessageBody {
        MessageBody {
            id: message.id,
            sender: message.sender,
            recipient: message.recipient,
            content: message.content,
            read: message.read,
            created_at: message.created_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SendFriendRequestBody {
    pub to: UserId,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct SendMessageBody {
    pub recipient: UserId,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

#[post("/social/friend-requests")]
#[tracing::instrument(skip(db))]
pub async fn send_friend_request(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    body: Json<SendFriendRequestBody>,
) -> Result<Json<FriendRequestBody>, Error> {
    let friend_request = manager::send_friend_request(&***db, auth.user_id, body.to).await?;

    Ok(Json(FriendRequestBody::render(friend_request)))
}

#[get("/social/friend-requests")]
#[tracing::instrument(skip(db))]
pub async fn get_friend_requests(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
) -> Result<Json<Vec<FriendRequestBody>>, Error> {
    let friend_requests = manager::get_incoming_friend_requests(&***db, auth.user_id).await?;

    Ok(Json(
        friend_requests
            .into_iter()
            .map(FriendRequestBody::render)
            .collect(),
    ))
}

#[post("/social/friend-requests/{friend_request_id}/accept")]
#[tracing::instrument(skip(db))]
pub async fn accept_friend_request(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<FriendRequestId>,
) -> Result<Json<FriendRequestBody>, Error> {
    let friend_request =
        manager::accept_friend_request(&***db, auth.user_id, params.into_inner()).await?;

    Ok(Json(FriendRequestBody::render(friend_request)))
}

#[post("/social/friend-requests/{friend_request_id}/reject")]
#[tracing::instrument(skip(db))]
pub async fn reject_friend_request(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<FriendRequestId>,
) -> Result<Json<FriendRequestBody>, Error> {
    let friend_request =
        manager::reject_friend_request(&***db, auth.user_id, params.into_inner()).await?;

    Ok(Json(FriendRequestBody::render(friend_request)))
}

#[get("/social/friends")]
#[tracing::instrument(skip(db))]
pub async fn get_friends(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
) -> Result<Json<Vec<ProfileBody>>, Error> {
    let friends = manager::get_friends(&***db, auth.user_id).await?;

    Ok(Json(friends.into_iter().map(ProfileBody::render).collect()))
}

#[delete("/social/friends/{user_id}")]
#[tracing::instrument(skip(db))]
pub async fn unfriend(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<UserId>,
) -> Result<Json<SuccessBody>, Error> {
    manager::unfriend(&***db, auth.user_id, params.into_inner()).await?;

    Ok(Json(SuccessBody::ok()))
}

#[post("/social/follow/{user_id}")]
#[tracing::instrument(skip(db))]
pub async fn follow(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<UserId>,
) -> Result<Json<SuccessBody>, Error> {
    manager::follow(&***db, auth.user_id, params.into_inner()).await?;

    Ok(Json(SuccessBody::ok()))
}

#[delete("/social/follow/{user_id}")]
#[tracing::instrument(skip(db))]
pub async fn unfollow(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<UserId>,
) -> Result<Json<SuccessBody>, Error> {
    manager::unfollow(&***db, auth.user_id, params.into_inner()).await?;

    Ok(Json(SuccessBody::ok()))
}

#[post("/social/messages")]
#[tracing::instrument(skip(db, body))]
pub async fn send_message(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    body: Json<SendMessageBody>,
) -> Result<Json<MessageBody>, Error> {
    let body = body.into_inner();
    body.validate()?;

    let message = manager::send_message(&***db, auth.user_id, body.recipient, body.content).await?;

    Ok(Json(MessageBody::render(message)))
}

#[get("/social/messages/{user_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_conversation(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<UserId>,
) -> Result<Json<Vec<MessageBody>>, Error> {
    let messages = manager::get_conversation(&***db, auth.user_id, params.into_inner()).await?;

    Ok(Json(messages.into_iter().map(MessageBody::render).collect()))
}
