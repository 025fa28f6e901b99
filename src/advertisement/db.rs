use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::database::{next_modified_at, replace_if_unmodified, MongoAdvertisementStore};
use crate::error::Error;
use crate::user::UserId;
use crate::utils::bson_now;

use super::{Advertisement, AdvertisementId, AdvertisementStatus};

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": "advertisements",
            "indexes": [
                {
                    "key": { "status": 1, "schedule.start_date": 1, "schedule.end_date": 1 },
                    "name": "by_status_and_schedule",
                },
                { "key": { "advertiser": 1, "created_at": -1 }, "name": "by_advertiser" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait AdvertisementStore: Send + Sync {
    async fn insert_advertisement(&self, advertisement: &Advertisement) -> Result<(), Error>;

    async fn fetch_advertisement_by_id(
        &self,
        advertisement_id: AdvertisementId,
    ) -> Result<Option<Advertisement>, Error>;

    async fn fetch_advertisements_by_advertiser(
        &self,
        advertiser: UserId,
    ) -> Result<Vec<Advertisement>, Error>;

    async fn fetch_advertisements(
        &self,
        status: Option<AdvertisementStatus>,
    ) -> Result<Vec<Advertisement>, Error>;

    /// Active ads whose date range contains `now`. Time windows and
    /// targeting are left to the caller.
    async fn fetch_running_advertisements(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Advertisement>, Error>;

    async fn update_advertisement(&self, advertisement: Advertisement)
        -> Result<Advertisement, Error>;

    async fn delete_advertisement(&self, advertisement_id: AdvertisementId) -> Result<(), Error>;

    async fn count_advertisements(&self, status: Option<AdvertisementStatus>) -> Result<u64, Error>;
}

fn status_filter(status: Option<AdvertisementStatus>) -> bson::Document {
    match status {
        Some(status) => bson::doc! { "status": status.as_str() },
        None => bson::doc! {},
    }
}

#[async_trait]
impl AdvertisementStore for MongoAdvertisementStore {
    #[tracing::instrument(skip(self, advertisement), fields(advertisement_id = %advertisement.id))]
    async fn insert_advertisement(&self, advertisement: &Advertisement) -> Result<(), Error> {
        self.insert_one(advertisement, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_advertisement_by_id(
        &self,
        advertisement_id: AdvertisementId,
    ) -> Result<Option<Advertisement>, Error> {
        let advertisement = self
            .find_one(bson::doc! { "_id": advertisement_id }, None)
            .await?;

        Ok(advertisement)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_advertisements_by_advertiser(
        &self,
        advertiser: UserId,
    ) -> Result<Vec<Advertisement>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": -1 })
            .build();

        let advertisements: Vec<Advertisement> = self
            .find(bson::doc! { "advertiser": advertiser }, options)
            .await?
            .try_collect()
            .await?;

        Ok(advertisements)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_advertisements(
        &self,
        status: Option<AdvertisementStatus>,
    ) -> Result<Vec<Advertisement>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": -1 })
            .build();

        let advertisements: Vec<Advertisement> = self
            .find(status_filter(status), options)
            .await?
            .try_collect()
            .await?;

        Ok(advertisements)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_running_advertisements(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Advertisement>, Error> {
        let now = bson_now(now);
        let query = bson::doc! {
            "status": AdvertisementStatus::Active.as_str(),
            "schedule.start_date": { "$lte": now },
            "schedule.end_date": { "$gte": now },
        };

        let advertisements: Vec<Advertisement> =
            self.find(query, None).await?.try_collect().await?;

        Ok(advertisements)
    }

    #[tracing::instrument(skip(self, advertisement), fields(advertisement_id = %advertisement.id))]
    async fn update_advertisement(
        &self,
        mut advertisement: Advertisement,
    ) -> Result<Advertisement, Error> {
        let read_modified_at = advertisement.modified_at;
        advertisement.modified_at = next_modified_at(read_modified_at, Utc::now());

        replace_if_unmodified(self, advertisement.id, read_modified_at, &advertisement).await?;

        Ok(advertisement)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_advertisement(&self, advertisement_id: AdvertisementId) -> Result<(), Error> {
        self.delete_one(bson::doc! { "_id": advertisement_id }, None)
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn count_advertisements(&self, status: Option<AdvertisementStatus>) -> Result<u64, Error> {
        let count = self.count_documents(status_filter(status), None).await?;

        Ok(count)
    }
}
