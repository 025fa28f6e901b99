use std::time::Duration;

use actix_web::web::{Data, Json, Path, Query};
use actix_web::{delete, get, patch, post};
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use crate::advertisement::manager as advertisements;
use crate::advertisement::{AdvertisementBody, AdvertisementId, AdvertisementStatus};
use crate::auth::AuthUser;
use crate::cache::{self, keys, Cache};
use crate::database::Database;
use crate::error::Error;
use crate::event::manager as events;
use crate::event::EventId;
use crate::notification::manager as notifications;
use crate::story::manager as stories;
use crate::story::StoryId;
use crate::user::manager as users;
use crate::user::{Role, UserBody, UserId, UserStatus};
use crate::utils::{CountBody, SuccessBody};
use crate::vendor::manager as vendors;
use crate::vendor::{VendorBody, VendorId, VendorStatus};

use super::manager;
use super::DashboardStats;

const DASHBOARD_TTL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, Deserialize)]
pub struct RoleQuery {
    pub role: Option<Role>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AdvertisementStatusQuery {
    pub status: Option<AdvertisementStatus>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserStatusBody {
    pub status: UserStatus,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserRoleBody {
    pub role: Role,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VendorStatusBody {
    pub status: VendorStatus,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AdvertisementStatusBody {
    pub status: AdvertisementStatus,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct BroadcastBody {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub body: String,
    /// Only users with this role, or everyone when absent.
    pub role: Option<Role>,
}

#[get("/admin/dashboard")]
#[tracing::instrument(skip(db, cache))]
pub async fn get_dashboard(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    auth: AuthUser,
) -> Result<Json<DashboardStats>, Error> {
    auth.require_admin()?;

    if let Some(stats) = cache::get_json::<DashboardStats>(&***cache, keys::DASHBOARD).await {
        return Ok(Json(stats));
    }

    let stats = manager::get_dashboard_stats(&***db, Utc::now()).await?;
    cache::set_json(&***cache, keys::DASHBOARD, &stats, DASHBOARD_TTL).await;

    Ok(Json(stats))
}

#[get("/admin/users")]
#[tracing::instrument(skip(db))]
pub async fn get_users(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    query: Query<RoleQuery>,
) -> Result<Json<Vec<UserBody>>, Error> {
    auth.require_admin()?;

    let users = users::get_users(&***db, query.role).await?;

    Ok(Json(users.into_iter().map(UserBody::render).collect()))
}

#[patch("/admin/users/{user_id}/status")]
#[tracing::instrument(skip(db))]
pub async fn set_user_status(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<UserId>,
    body: Json<UserStatusBody>,
) -> Result<Json<UserBody>, Error> {
    auth.require_admin()?;

    let user = users::set_user_status(&***db, params.into_inner(), body.status).await?;

    Ok(Json(UserBody::render(user)))
}

#[patch("/admin/users/{user_id}/role")]
#[tracing::instrument(skip(db))]
pub async fn set_user_role(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<UserId>,
    body: Json<UserRoleBody>,
) -> Result<Json<UserBody>, Error> {
    auth.require_admin()?;

    let user = users::set_user_role(&***db, params.into_inner(), body.role).await?;

    Ok(Json(UserBody::render(user)))
}

#[delete("/admin/events/{event_id}")]
#[tracing::instrument(skip(db, cache))]
pub async fn delete_event(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    auth: AuthUser,
    params: Path<EventId>,
) -> Result<Json<SuccessBody>, Error> {
    auth.require_admin()?;

    events::delete_event(&***db, &auth, params.into_inner()).await?;
    cache::invalidate_prefix(&***cache, keys::EVENTS_PREFIX).await;

    Ok(Json(SuccessBody::ok()))
}

#[patch("/admin/vendors/{vendor_id}/status")]
#[tracing::instrument(skip(db))]
pub async fn set_vendor_status(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<VendorId>,
    body: Json<VendorStatusBody>,
) -> Result<Json<VendorBody>, Error> {
    auth.require_admin()?;

    let vendor = vendors::set_vendor_status(&***db, params.into_inner(), body.status).await?;

    Ok(Json(VendorBody::render(vendor)))
}

#[delete("/admin/stories/{story_id}")]
#[tracing::instrument(skip(db))]
pub async fn delete_story(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<StoryId>,
) -> Result<Json<SuccessBody>, Error> {
    auth.require_admin()?;

    stories::delete_story(&***db, &auth, params.into_inner()).await?;

    Ok(Json(SuccessBody::ok()))
}

#[get("/admin/advertisements")]
#[tracing::instrument(skip(db))]
pub async fn get_advertisements(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    query: Query<AdvertisementStatusQuery>,
) -> Result<Json<Vec<AdvertisementBody>>, Error> {
    auth.require_admin()?;

    let advertisements = advertisements::get_advertisements(&***db, query.status).await?;

    Ok(Json(
        advertisements
            .into_iter()
            .map(AdvertisementBody::render)
            .collect(),
    ))
}

#[patch("/admin/advertisements/{advertisement_id}/status")]
#[tracing::instrument(skip(db))]
pub async fn set_advertisement_status(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<AdvertisementId>,
    body: Json<AdvertisementStatusBody>,
) -> Result<Json<AdvertisementBody>, Error> {
    auth.require_admin()?;

    let advertisement =
        advertisements::set_advertisement_status(&***db, params.into_inner(), body.status).await?;

    Ok(Json(AdvertisementBody::render(advertisement)))
}

#[post("/admin/notifications")]
#[tracing::instrument(skip(db, body))]
pub async fn broadcast(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    body: Json<BroadcastBody>,
) -> Result<Json<CountBody>, Error> {
    auth.require_admin()?;

    let body = body.into_inner();
    body.validate()?;

    let count = notifications::broadcast(&***db, body.role, &body.title, &body.body).await?;

    Ok(Json(CountBody { count }))
}
