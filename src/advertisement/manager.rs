use chrono::{DateTime, Utc};

use crate::auth::AuthUser;
use crate::config::AdConfig;
use crate::database::{Database, MAX_SAVE_ATTEMPTS};
use crate::error::{invalid_field, Error};
use crate::notification::manager as notifications;
use crate::notification::NotificationKind;
use crate::user::UserId;

use super::{
    AdContent, AdFilter, Advertisement, AdvertisementId, AdvertisementStatus, Budget, Metrics,
    Schedule, Targeting,
};

#[derive(Clone, Debug)]
pub struct NewAdvertisement {
    pub title: String,
    pub description: String,
    pub content: AdContent,
    pub targeting: Targeting,
    pub schedule: Schedule,
    pub budget: NewBudget,
    pub status: Option<AdvertisementStatus>,
}

#[derive(Clone, Debug)]
pub struct NewBudget {
    pub total: f64,
    pub spent: f64,
    pub currency: String,
    pub cost_per_click: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct AdvertisementChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<AdContent>,
    pub targeting: Option<Targeting>,
    pub schedule: Option<Schedule>,
    pub budget_total: Option<f64>,
    pub currency: Option<String>,
    pub cost_per_click: Option<f64>,
    pub status: Option<AdvertisementStatus>,
}

fn check_shape(targeting: &Targeting, schedule: &Schedule) -> Result<(), Error> {
    if schedule.end_date <= schedule.start_date {
        return Err(invalid_field(
            "schedule.end_date",
            "end_date must be after start_date",
        ));
    }
    if let Some(age_range) = targeting.age_range {
        if age_range.min > age_range.max {
            return Err(invalid_field(
                "targeting.age_range",
                "min must not be greater than max",
            ));
        }
    }
    Ok(())
}

#[tracing::instrument(skip(db))]
pub async fn create_advertisement(
    db: &dyn Database,
    config: &AdConfig,
    advertiser: UserId,
    new_ad: NewAdvertisement,
) -> Result<Advertisement, Error> {
    check_shape(&new_ad.targeting, &new_ad.schedule)?;

    let now = Utc::now();
    let mut advertisement = Advertisement {
        id: AdvertisementId::new(),
        title: new_ad.title,
        description: new_ad.description,
        content: new_ad.content,
        targeting: new_ad.targeting,
        schedule: new_ad.schedule,
        metrics: Metrics::default(),
        status: AdvertisementStatus::Draft,
        advertiser,
        budget: Budget {
            total: new_ad.budget.total,
            spent: new_ad.budget.spent,
            currency: new_ad.budget.currency.to_uppercase(),
            cost_per_click: new_ad.budget.cost_per_click.unwrap_or(config.default_cost_per_click),
        },
        created_at: now,
        modified_at: now,
    };

    match new_ad.status {
        Some(AdvertisementStatus::Completed) => {
            return Err(Error::InvalidAdvertisementStatusTransition {
                advertisement_id: advertisement.id,
                from: AdvertisementStatus::Draft,
                to: AdvertisementStatus::Completed,
            });
        }
        Some(status) => advertisement.set_status(status)?,
        None => {}
    }

    db.advertisements()
        .insert_advertisement(&advertisement)
        .await?;

    Ok(advertisement)
}

/// Ads to show right now: active, inside their schedule and time windows,
/// and targeted at the filter.
#[tracing::instrument(skip(db))]
pub async fn get_public_ads(
    db: &dyn Database,
    now: DateTime<Utc>,
    filter: &AdFilter,
) -> Result<Vec<Advertisement>, Error> {
    let advertisements = db
        .advertisements()
        .fetch_running_advertisements(now)
        .await?
        .into_iter()
        .filter(|ad| ad.is_deliverable(now, filter))
        .collect();

    Ok(advertisements)
}

#[tracing::instrument(skip(db))]
pub async fn get_my_ads(db: &dyn Database, advertiser: UserId) -> Result<Vec<Advertisement>, Error> {
    db.advertisements()
        .fetch_advertisements_by_advertiser(advertiser)
        .await
}

#[tracing::instrument(skip(db))]
pub async fn get_advertisements(
    db: &dyn Database,
    status: Option<AdvertisementStatus>,
) -> Result<Vec<Advertisement>, Error> {
    db.advertisements().fetch_advertisements(status).await
}

#[tracing::instrument(skip(db))]
pub async fn expect_advertisement_by_id(
    db: &dyn Database,
    advertisement_id: AdvertisementId,
) -> Result<Advertisement, Error> {
    db.advertisements()
        .fetch_advertisement_by_id(advertisement_id)
        .await?
        .ok_or(Error::AdvertisementNotFound { advertisement_id })
}

/// Active ads are public; anything else is only visible to the advertiser
/// and admins.
#[tracing::instrument(skip(db))]
pub async fn get_visible_advertisement(
    db: &dyn Database,
    auth: Option<&AuthUser>,
    advertisement_id: AdvertisementId,
) -> Result<Advertisement, Error> {
    let advertisement = expect_advertisement_by_id(db, advertisement_id).await?;
    let is_owner = auth.map_or(false, |auth| {
        auth.require_owner_or_admin(advertisement.advertiser).is_ok()
    });

    if advertisement.status != AdvertisementStatus::Active && !is_owner {
        return Err(Error::AdvertisementNotFound { advertisement_id });
    }

    Ok(advertisement)
}

#[tracing::instrument(skip(db))]
pub async fn update_advertisement(
    db: &dyn Database,
    auth: &AuthUser,
    advertisement_id: AdvertisementId,
    changes: AdvertisementChanges,
) -> Result<Advertisement, Error> {
    let mut advertisement = expect_advertisement_by_id(db, advertisement_id).await?;
    auth.require_owner_or_admin(advertisement.advertiser)?;

    if let Some(title) = changes.title {
        advertisement.title = title;
    }
    if let Some(description) = changes.description {
        advertisement.description = description;
    }
    if let Some(content) = changes.content {
        advertisement.content = content;
    }
    if let Some(targeting) = changes.targeting {
        advertisement.targeting = targeting;
    }
    if let Some(schedule) = changes.schedule {
        advertisement.schedule = schedule;
    }
    if let Some(total) = changes.budget_total {
        advertisement.budget.total = total;
    }
    if let Some(currency) = changes.currency {
        advertisement.budget.currency = currency.to_uppercase();
    }
    if let Some(cost_per_click) = changes.cost_per_click {
        advertisement.budget.cost_per_click = cost_per_click;
    }

    check_shape(&advertisement.targeting, &advertisement.schedule)?;

    match changes.status {
        Some(status) => advertisement.set_status(status)?,
        // a lowered total can leave an active ad without budget
        None if advertisement.status == AdvertisementStatus::Active
            && advertisement.budget.is_exhausted() =>
        {
            return Err(Error::AdvertisementBudgetExhausted { advertisement_id });
        }
        None => {}
    }

    db.advertisements()
        .update_advertisement(advertisement)
        .await
}

#[tracing::instrument(skip(db))]
pub async fn set_advertisement_status(
    db: &dyn Database,
    advertisement_id: AdvertisementId,
    status: AdvertisementStatus,
) -> Result<Advertisement, Error> {
    let mut advertisement = expect_advertisement_by_id(db, advertisement_id).await?;
    advertisement.set_status(status)?;

    db.advertisements()
        .update_advertisement(advertisement)
        .await
}

#[tracing::instrument(skip(db))]
pub async fn delete_advertisement(
    db: &dyn Database,
    auth: &AuthUser,
    advertisement_id: AdvertisementId,
) -> Result<(), Error> {
    let advertisement = expect_advertisement_by_id(db, advertisement_id).await?;
    auth.require_owner_or_admin(advertisement.advertiser)?;

    if advertisement.status == AdvertisementStatus::Active {
        return Err(Error::CannotDeleteActiveAdvertisement { advertisement_id });
    }

    db.advertisements()
        .delete_advertisement(advertisement_id)
        .await
}

#[tracing::instrument(skip(db))]
pub async fn record_view(
    db: &dyn Database,
    advertisement_id: AdvertisementId,
) -> Result<Advertisement, Error> {
    for _ in 0..MAX_SAVE_ATTEMPTS {
        let mut advertisement = expect_advertisement_by_id(db, advertisement_id).await?;
        if advertisement.status != AdvertisementStatus::Active {
            return Err(Error::AdvertisementNotActive { advertisement_id });
        }

        advertisement.record_view();

        match db.advertisements().update_advertisement(advertisement).await {
            Err(Error::ConcurrentModificationDetected) => continue,
            result => return result,
        }
    }

    Err(Error::ConcurrentModificationDetected)
}

/// Counts a click against the budget. The click that uses up the budget
/// completes the ad and tells the advertiser.
#[tracing::instrument(skip(db))]
pub async fn record_click(
    db: &dyn Database,
    advertisement_id: AdvertisementId,
) -> Result<Advertisement, Error> {
    for _ in 0..MAX_SAVE_ATTEMPTS {
        let mut advertisement = expect_advertisement_by_id(db, advertisement_id).await?;
        if advertisement.status != AdvertisementStatus::Active {
            return Err(Error::AdvertisementNotActive { advertisement_id });
        }

        let exhausted = advertisement.record_click();

        let advertisement = match db.advertisements().update_advertisement(advertisement).await {
            Err(Error::ConcurrentModificationDetected) => continue,
            result => result?,
        };

        if exhausted {
            tracing::info!(%advertisement_id, "advertisement budget exhausted");
            let notified = notifications::notify(
                db,
                advertisement.advertiser,
                NotificationKind::AdBudgetExhausted,
                "Advertisement budget spent",
                &format!(
                    "{} has spent its budget of {:.2} {} and was completed",
                    advertisement.title, advertisement.budget.total, advertisement.budget.currency
                ),
                Some(advertisement.id.to_string()),
            )
            .await;
            if let Err(err) = notified {
                tracing::warn!(%advertisement_id, error = %err, "could not notify advertiser");
            }
        }

        return Ok(advertisement);
    }

    Err(Error::ConcurrentModificationDetected)
}
