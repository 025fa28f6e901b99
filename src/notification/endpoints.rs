use actix_web::web::{Data, Json, Path, Query};
use actix_web::{delete, get, patch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::database::Database;
use crate::error::Error;
use crate::utils::{CountBody, SuccessBody};

use super::manager;
use super::{Notification, NotificationId, NotificationKind};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationBody {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationBody {
    pub fn render(notification: Notification) -> NotificationBody {
        NotificationBody {
            id: notification.id,
            kind: notification.kind,
            title: notification.title,
            body: notification.body,
            read: notification.read,
            reference: notification.reference,
            created_at: notification.created_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

#[get("/notifications")]
#[tracing::instrument(skip(db))]
pub async fn get_notifications(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    query: Query<NotificationQuery>,
) -> Result<Json<Vec<NotificationBody>>, Error> {
    let notifications = manager::get_notifications(&***db, auth.user_id, query.unread).await?;

    Ok(Json(
        notifications
            .into_iter()
            .map(NotificationBody::render)
            .collect(),
    ))
}

#[get("/notifications/unread-count")]
#[tracing::instrument(skip(db))]
pub async fn get_unread_count(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
) -> Result<Json<CountBody>, Error> {
    let count = manager::count_unread(&***db, auth.user_id).await?;

    Ok(Json(CountBody { count }))
}

#[patch("/notifications/read-all")]
#[tracing::instrument(skip(db))]
pub async fn mark_all_read(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
) -> Result<Json<CountBody>, Error> {
    let count = manager::mark_all_read(&***db, auth.user_id).await?;

    Ok(Json(CountBody { count }))
}

#[patch("/notifications/{notification_id}/read")]
#[tracing::instrument(skip(db))]
pub async fn mark_read(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<NotificationId>,
) -> Result<Json<NotificationBody>, Error> {
    let notification = manager::mark_read(&***db, auth.user_id, params.into_inner()).await?;

    Ok(Json(NotificationBody::render(notification)))
}

#[delete("/notifications/{notification_id}")]
#[tracing::instrument(skip(db))]
pub async fn delete_notification(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<NotificationId>,
) -> Result<Json<SuccessBody>, Error> {
    manager::delete_notification(&***db, auth.user_id, params.into_inner()).await?;

    Ok(Json(SuccessBody::ok()))
}
