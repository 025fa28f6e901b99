use actix_web::web::{Data, Json, Path, Query};
use actix_web::{delete, get, patch, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::AuthUser;
use crate::config::AdConfig;
use crate::database::Database;
use crate::error::Error;
use crate::event::EventId;
use crate::user::{Role, UserId};
use crate::utils::SuccessBody;

use super::manager::{self, AdvertisementChanges, NewAdvertisement, NewBudget};
use super::{
    AdContent, AdFilter, Advertisement, AdvertisementId, AdvertisementStatus, AgeRange, Budget,
    CallToAction, MediaType, Metrics, Schedule, Targeting, TimeWindow,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdvertisementBody {
    pub id: AdvertisementId,
    pub title: String,
    pub description: String,
    pub content: AdContent,
    pub targeting: Targeting,
    pub schedule: Schedule,
    pub metrics: Metrics,
    pub status: AdvertisementStatus,
    pub advertiser: UserId,
    pub budget: Budget,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl AdvertisementBody {
    pub fn render(advertisement: Advertisement) -> AdvertisementBody {
        AdvertisementBody {
            id: advertisement.id,
            title: advertisement.title,
            description: advertisement.description,
            content: advertisement.content,
            targeting: advertisement.targeting,
            schedule: advertisement.schedule,
            metrics: advertisement.metrics,
            status: advertisement.status,
            advertiser: advertisement.advertiser,
            budget: advertisement.budget,
            created_at: advertisement.created_at,
            modified_at: advertisement.modified_at,
        }
    }
}

/// What the delivery endpoint hands out: no budget or metrics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicAdvertisementBody {
    pub id: AdvertisementId,
    pub title: String,
    pub description: String,
    pub content: AdContent,
}

impl PublicAdvertisementBody {
    pub fn render(advertisement: Advertisement) -> PublicAdvertisementBody {
        PublicAdvertisementBody {
            id: advertisement.id,
            title: advertisement.title,
            description: advertisement.description,
            content: advertisement.content,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CallToActionInput {
    #[validate(length(min = 1, max = 40))]
    pub label: String,
    #[validate(url)]
    pub url: String,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ContentInput {
    pub media_type: MediaType,
    #[validate(url)]
    pub url: String,
    #[validate(url)]
    pub thumbnail: Option<String>,
    #[validate(nested)]
    pub call_to_action: Option<CallToActionInput>,
}

impl ContentInput {
    fn into_content(self) -> AdContent {
        AdContent {
            media_type: self.media_type,
            url: self.url,
            thumbnail: self.thumbnail,
            call_to_action: self.call_to_action.map(|cta| CallToAction {
                label: cta.label,
                url: cta.url,
            }),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AgeRangeInput {
    #[validate(range(min = 13, max = 120))]
    pub min: u32,
    #[validate(range(min = 13, max = 120))]
    pub max: u32,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct TargetingInput {
    #[serde(default)]
    pub locations: Vec<String>,
    #[validate(nested)]
    pub age_range: Option<AgeRangeInput>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub events: Vec<EventId>,
}

impl TargetingInput {
    fn into_targeting(self) -> Targeting {
        Targeting {
            locations: self.locations,
            age_range: self.age_range.map(|range| AgeRange {
                min: range.min,
                max: range.max,
            }),
            interests: self.interests,
            events: self.events,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScheduleInput {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub time_windows: Vec<TimeWindow>,
}

impl ScheduleInput {
    fn into_schedule(self) -> Schedule {
        Schedule {
            start_date: self.start_date,
            end_date: self.end_date,
            time_windows: self.time_windows,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct BudgetInput {
    #[validate(range(exclusive_min = 0.0))]
    pub total: f64,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub spent: f64,
    #[validate(length(equal = 3))]
    pub currency: String,
    #[validate(range(exclusive_min = 0.0))]
    pub cost_per_click: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CreateAdvertisementBody {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[validate(nested)]
    pub content: ContentInput,
    #[validate(nested)]
    #[serde(default)]
    pub targeting: TargetingInput,
    pub schedule: ScheduleInput,
    #[validate(nested)]
    pub budget: BudgetInput,
    pub status: Option<AdvertisementStatus>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct UpdateBudgetInput {
    #[validate(range(exclusive_min = 0.0))]
    pub total: Option<f64>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[validate(range(exclusive_min = 0.0))]
    pub cost_per_click: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct UpdateAdvertisementBody {
    #[validate(length(min = 1, max = 120))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(nested)]
    pub content: Option<ContentInput>,
    #[validate(nested)]
    pub targeting: Option<TargetingInput>,
    pub schedule: Option<ScheduleInput>,
    #[validate(nested)]
    pub budget: Option<UpdateBudgetInput>,
    pub status: Option<AdvertisementStatus>,
}

#[post("/advertisements")]
#[tracing::instrument(skip(db))]
pub async fn create_advertisement(
    db: Data<Box<dyn Database>>,
    config: Data<AdConfig>,
    auth: AuthUser,
    body: Json<CreateAdvertisementBody>,
) -> Result<Json<AdvertisementBody>, Error> {
    auth.require_role(&[Role::Vendor, Role::Organizer])?;

    let body = body.into_inner();
    body.validate()?;

    let new_ad = NewAdvertisement {
        title: body.title,
        description: body.description,
        content: body.content.into_content(),
        targeting: body.targeting.into_targeting(),
        schedule: body.schedule.into_schedule(),
        budget: NewBudget {
            total: body.budget.total,
            spent: body.budget.spent,
            currency: body.budget.currency,
            cost_per_click: body.budget.cost_per_click,
        },
        status: body.status,
    };
    let advertisement =
        manager::create_advertisement(&***db, &config, auth.user_id, new_ad).await?;

    Ok(Json(AdvertisementBody::render(advertisement)))
}

#[get("/advertisements/public")]
#[tracing::instrument(skip(db))]
pub async fn get_public_ads(
    db: Data<Box<dyn Database>>,
    query: Query<AdFilter>,
) -> Result<Json<Vec<PublicAdvertisementBody>>, Error> {
    let advertisements = manager::get_public_ads(&***db, Utc::now(), &query).await?;

    Ok(Json(
        advertisements
            .into_iter()
            .map(PublicAdvertisementBody::render)
            .collect(),
    ))
}

#[get("/advertisements/my-ads")]
#[tracing::instrument(skip(db))]
pub async fn get_my_ads(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
) -> Result<Json<Vec<AdvertisementBody>>, Error> {
    let advertisements = manager::get_my_ads(&***db, auth.user_id).await?;

    Ok(Json(
        advertisements
            .into_iter()
            .map(AdvertisementBody::render)
            .collect(),
    ))
}

#[get("/advertisements/{advertisement_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_advertisement_by_id(
    db: Data<Box<dyn Database>>,
    auth: Option<AuthUser>,
    params: Path<AdvertisementId>,
) -> Result<Json<AdvertisementBody>, Error> {
    let advertisement =
        manager::get_visible_advertisement(&***db, auth.as_ref(), params.into_inner()).await?;

    Ok(Json(AdvertisementBody::render(advertisement)))
}

#[patch("/advertisements/{advertisement_id}")]
#[tracing::instrument(skip(db))]
pub async fn update_advertisement(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<AdvertisementId>,
    body: Json<UpdateAdvertisementBody>,
) -> Result<Json<AdvertisementBody>, Error> {
    let body = body.into_inner();
    body.validate()?;

    let (budget_total, currency, cost_per_click) = match body.budget {
        Some(budget) => (budget.total, budget.currency, budget.cost_per_click),
        None => (None, None, None),
    };
    let changes = AdvertisementChanges {
        title: body.title,
        description: body.description,
        content: body.content.map(ContentInput::into_content),
        targeting: body.targeting.map(TargetingInput::into_targeting),
        schedule: body.schedule.map(ScheduleInput::into_schedule),
        budget_total,
        currency,
        cost_per_click,
        status: body.status,
    };
    let advertisement =
        manager::update_advertisement(&***db, &auth, params.into_inner(), changes).await?;

    Ok(Json(AdvertisementBody::render(advertisement)))
}

#[delete("/advertisements/{advertisement_id}")]
#[tracing::instrument(skip(db))]
pub async fn delete_advertisement(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<AdvertisementId>,
) -> Result<Json<SuccessBody>, Error> {
    manager::delete_advertisement(&***db, &auth, params.into_inner()).await?;

    Ok(Json(SuccessBody::ok()))
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsBody {
    pub id: AdvertisementId,
    pub status: AdvertisementStatus,
    pub metrics: Metrics,
    pub spent: f64,
}

impl MetricsBody {
    pub fn render(advertisement: Advertisement) -> MetricsBody {
        MetricsBody {
            id: advertisement.id,
            status: advertisement.status,
            metrics: advertisement.metrics,
            spent: advertisement.budget.spent,
        }
    }
}

#[post("/advertisements/{advertisement_id}/metrics/view")]
#[tracing::instrument(skip(db))]
pub async fn record_view(
    db: Data<Box<dyn Database>>,
    params: Path<AdvertisementId>,
) -> Result<Json<MetricsBody>, Error> {
    let advertisement = manager::record_view(&***db, params.into_inner()).await?;

    Ok(Json(MetricsBody::render(advertisement)))
}

#[post("/advertisements/{advertisement_id}/metrics/click")]
#[tracing::instrument(skip(db))]
pub async fn record_click(
    db: Data<Box<dyn Database>>,
    params: Path<AdvertisementId>,
) -> Result<Json<MetricsBody>, Error> {
    let advertisement = manager::record_click(&***db, params.into_inner()).await?;

    Ok(Json(MetricsBody::render(advertisement)))
}
