use std::time::Duration;

use actix_web::web::{Data, Json, Path, Query};
use actix_web::{delete, get, patch, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::AuthUser;
use crate::cache::{self, keys, Cache};
use crate::config::CacheConfig;
use crate::database::Database;
use crate::error::Error;
use crate::user::{Role, UserId};
use crate::utils::SuccessBody;
use crate::vendor::VendorId;

use super::manager::{self, EventChanges, NewEvent};
use super::{Event, EventFilter, EventId, EventStatus, Venue};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventBody {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub venue: Venue,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: u32,
    pub tickets_sold: u32,
    pub tickets_available: u32,
    pub price: f64,
    pub currency: String,
    pub organizer: UserId,
    pub vendors: Vec<VendorId>,
    pub status: EventStatus,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl EventBody {
    pub fn render(event: Event) -> EventBody {
        EventBody {
            tickets_available: event.tickets_available(),
            id: event.id,
            title: event.title,
            description: event.description,
            category: event.category,
            venue: event.venue,
            start_date: event.start_date,
            end_date: event.end_date,
            capacity: event.capacity,
            tickets_sold: event.tickets_sold,
            price: event.price,
            currency: event.currency,
            organizer: event.organizer,
            vendors: event.vendors,
            status: event.status,
            image: event.image,
            created_at: event.created_at,
            modified_at: event.modified_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CreateEventBody {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 60))]
    pub category: String,
    #[validate(nested)]
    pub venue: Venue,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub capacity: u32,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(length(equal = 3))]
    pub currency: String,
    #[validate(url)]
    pub image: Option<String>,
    pub status: Option<EventStatus>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct UpdateEventBody {
    #[validate(length(min = 1, max = 120))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub category: Option<String>,
    #[validate(nested)]
    pub venue: Option<Venue>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1))]
    pub capacity: Option<u32>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[validate(url)]
    pub image: Option<String>,
    pub status: Option<EventStatus>,
}

#[post("/events")]
#[tracing::instrument(skip(db, cache))]
pub async fn create_event(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    auth: AuthUser,
    body: Json<CreateEventBody>,
) -> Result<Json<EventBody>, Error> {
    auth.require_role(&[Role::Organizer])?;

    let body = body.into_inner();
    body.validate()?;

    let new_event = NewEvent {
        title: body.title,
        description: body.description,
        category: body.category,
        venue: body.venue,
        start_date: body.start_date,
        end_date: body.end_date,
        capacity: body.capacity,
        price: body.price,
        currency: body.currency,
        image: body.image,
        status: body.status.unwrap_or(EventStatus::Draft),
    };
    let event = manager::create_event(&***db, auth.user_id, new_event).await?;

    cache::invalidate_prefix(&***cache, keys::EVENTS_PREFIX).await;

    Ok(Json(EventBody::render(event)))
}

#[get("/events")]
#[tracing::instrument(skip(db, cache))]
pub async fn get_events(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    cache_config: Data<CacheConfig>,
    query: Query<EventFilter>,
) -> Result<Json<Vec<EventBody>>, Error> {
    let filter = query.into_inner();
    let key = keys::public_events(
        filter.city.as_deref(),
        filter.category.as_deref(),
        filter.upcoming,
    );

    if let Some(body) = cache::get_json::<Vec<EventBody>>(&***cache, &key).await {
        return Ok(Json(body));
    }

    let body: Vec<EventBody> = manager::get_published_events(&***db, &filter, Utc::now())
        .await?
        .into_iter()
        .map(EventBody::render)
        .collect();

    let ttl = Duration::from_secs(cache_config.ttl_seconds);
    cache::set_json(&***cache, &key, &body, ttl).await;

    Ok(Json(body))
}

#[get("/events/mine")]
#[tracing::instrument(skip(db))]
pub async fn get_my_events(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
) -> Result<Json<Vec<EventBody>>, Error> {
    auth.require_role(&[Role::Organizer])?;

    let events = manager::get_events_by_organizer(&***db, auth.user_id).await?;

    Ok(Json(events.into_iter().map(EventBody::render).collect()))
}

#[get("/events/{event_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_event_by_id(
    db: Data<Box<dyn Database>>,
    auth: Option<AuthUser>,
    params: Path<EventId>,
) -> Result<Json<EventBody>, Error> {
    let event = manager::get_visible_event(&***db, auth.as_ref(), params.into_inner()).await?;

    Ok(Json(EventBody::render(event)))
}

#[patch("/events/{event_id}")]
#[tracing::instrument(skip(db, cache))]
pub async fn update_event(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    auth: AuthUser,
    params: Path<EventId>,
    body: Json<UpdateEventBody>,
) -> Result<Json<EventBody>, Error> {
    auth.require_role(&[Role::Organizer])?;

    let body = body.into_inner();
    body.validate()?;

    let changes = EventChanges {
        title: body.title,
        description: body.description,
        category: body.category,
        venue: body.venue,
        start_date: body.start_date,
        end_date: body.end_date,
        capacity: body.capacity,
        price: body.price,
        currency: body.currency,
        image: body.image,
        status: body.status,
    };
    let event = manager::update_event(&***db, &auth, params.into_inner(), changes).await?;

    cache::invalidate_prefix(&***cache, keys::EVENTS_PREFIX).await;

    Ok(Json(EventBody::render(event)))
}

#[delete("/events/{event_id}")]
#[tracing::instrument(skip(db, cache))]
pub async fn delete_event(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    auth: AuthUser,
    params: Path<EventId>,
) -> Result<Json<SuccessBody>, Error> {
    auth.require_role(&[Role::Organizer])?;

    manager::delete_event(&***db, &auth, params.into_inner()).await?;

    cache::invalidate_prefix(&***cache, keys::EVENTS_PREFIX).await;

    Ok(Json(SuccessBody::ok()))
}

#[post("/events/{event_id}/vendors/{vendor_id}")]
#[tracing::instrument(skip(db, cache))]
pub async fn attach_vendor(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    auth: AuthUser,
    params: Path<(EventId, VendorId)>,
) -> Result<Json<EventBody>, Error> {
    auth.require_role(&[Role::Organizer])?;

    let (event_id, vendor_id) = params.into_inner();
    let event = manager::attach_vendor(&***db, &auth, event_id, vendor_id).await?;

    cache::invalidate_prefix(&***cache, keys::EVENTS_PREFIX).await;

    Ok(Json(EventBody::render(event)))
}

#[delete("/events/{event_id}/vendors/{vendor_id}")]
#[tracing::instrument(skip(db, cache))]
pub async fn detach_vendor(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    auth: AuthUser,
    params: Path<(EventId, VendorId)>,
) -> Result<Json<EventBody>, Error> {
    auth.require_role(&[Role::Organizer])?;

    let (event_id, vendor_id) = params.into_inner();
    let event = manager::detach_vendor(&***db, &auth, event_id, vendor_id).await?;

    cache::invalidate_prefix(&***cache, keys::EVENTS_PREFIX).await;

    Ok(Json(EventBody::render(event)))
}
