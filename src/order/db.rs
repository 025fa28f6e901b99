use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::database::{next_modified_at, replace_if_unmodified, MongoOrderStore};
use crate::error::Error;
use crate::user::UserId;
use crate::vendor::VendorId;

use super::{Order, OrderId};

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": "orders",
            "indexes": [
                { "key": { "user": 1, "created_at": -1 }, "name": "by_user" },
                { "key": { "vendor": 1, "created_at": -1 }, "name": "by_vendor" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), Error>;

    async fn fetch_order_by_id(&self, order_id: OrderId) -> Result<Option<Order>, Error>;

    async fn fetch_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, Error>;

    async fn fetch_orders_by_vendor(&self, vendor_id: VendorId) -> Result<Vec<Order>, Error>;

    async fn update_order(&self, order: Order) -> Result<Order, Error>;

    async fn count_orders(&self) -> Result<u64, Error>;
}

#[async_trait]
impl OrderStore for MongoOrderStore {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    async fn insert_order(&self, order: &Order) -> Result<(), Error> {
        self.insert_one(order, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_order_by_id(&self, order_id: OrderId) -> Result<Option<Order>, Error> {
        let order = self.find_one(bson::doc! { "_id": order_id }, None).await?;

        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": -1 })
            .build();

        let orders: Vec<Order> = self
            .find(bson::doc! { "user": user_id }, options)
            .await?
            .try_collect()
            .await?;

        Ok(orders)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_orders_by_vendor(&self, vendor_id: VendorId) -> Result<Vec<Order>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": -1 })
            .build();

        let orders: Vec<Order> = self
            .find(bson::doc! { "vendor": vendor_id }, options)
            .await?
            .try_collect()
            .await?;

        Ok(orders)
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    async fn update_order(&self, mut order: Order) -> Result<Order, Error> {
        let read_modified_at = order.modified_at;
        order.modified_at = next_modified_at(read_modified_at, Utc::now());

        replace_if_unmodified(self, order.id, read_modified_at, &order).await?;

        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    async fn count_orders(&self) -> Result<u64, Error> {
        let count = self.count_documents(bson::doc! {}, None).await?;

        Ok(count)
    }
}
