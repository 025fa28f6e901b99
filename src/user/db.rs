use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::database::{is_duplicate_key, next_modified_at, replace_if_unmodified, MongoUserStore};
use crate::error::Error;
use crate::typedid::to_bson_array;

use super::{Role, User, UserId};

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": "users",
            "indexes": [
                { "key": { "email": 1 }, "name": "by_email", "unique": true },
                { "key": { "role": 1 }, "name": "by_role" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<(), Error>;

    async fn fetch_user_by_id(&self, user_id: UserId) -> Result<Option<User>, Error>;

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    async fn fetch_users(&self, role: Option<Role>) -> Result<Vec<User>, Error>;

    async fn fetch_users_by_ids(&self, user_ids: &[UserId]) -> Result<Vec<User>, Error>;

    async fn update_user(&self, user: User) -> Result<User, Error>;

    async fn count_users(&self) -> Result<u64, Error>;
}

#[async_trait]
impl UserStore for MongoUserStore {
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert_user(&self, user: &User) -> Result<(), Error> {
        match self.insert_one(user, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(Error::EmailAlreadyRegistered {
                email: user.email.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_user_by_id(&self, user_id: UserId) -> Result<Option<User>, Error> {
        let user = self.find_one(bson::doc! { "_id": user_id }, None).await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let user = self.find_one(bson::doc! { "email": email }, None).await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_users(&self, role: Option<Role>) -> Result<Vec<User>, Error> {
        let filter = match role {
            Some(role) => bson::doc! { "role": role.as_str() },
            None => bson::doc! {},
        };
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": -1 })
            .build();

        let users: Vec<User> = self.find(filter, options).await?.try_collect().await?;

        Ok(users)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_users_by_ids(&self, user_ids: &[UserId]) -> Result<Vec<User>, Error> {
        let users: Vec<User> = self
            .find(bson::doc! { "_id": { "$in": to_bson_array(user_ids) } }, None)
            .await?
            .try_collect()
            .await?;

        Ok(users)
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn update_user(&self, mut user: User) -> Result<User, Error> {
        let read_modified_at = user.modified_at;
        user.modified_at = next_modified_at(read_modified_at, Utc::now());

        replace_if_unmodified(self, user.id, read_modified_at, &user).await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    async fn count_users(&self) -> Result<u64, Error> {
        let count = self.count_documents(bson::doc! {}, None).await?;

        Ok(count)
    }
}
