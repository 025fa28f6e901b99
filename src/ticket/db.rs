use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::database::{next_modified_at, replace_if_unmodified, MongoTicketStore};
use crate::error::Error;
use crate::event::EventId;
use crate::user::UserId;

use super::{Ticket, TicketId, TicketSales, TicketStatus};

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": "tickets",
            "indexes": [
                { "key": { "code": 1 }, "name": "by_code", "unique": true },
                { "key": { "user": 1, "created_at": -1 }, "name": "by_user" },
                { "key": { "event": 1 }, "name": "by_event" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), Error>;

    async fn fetch_ticket_by_id(&self, ticket_id: TicketId) -> Result<Option<Ticket>, Error>;

    async fn fetch_tickets_by_user(&self, user_id: UserId) -> Result<Vec<Ticket>, Error>;

    async fn fetch_tickets_by_event(&self, event_id: EventId) -> Result<Vec<Ticket>, Error>;

    async fn update_ticket(&self, ticket: Ticket) -> Result<Ticket, Error>;

    async fn fetch_ticket_sales(&self) -> Result<TicketSales, Error>;
}

#[async_trait]
impl TicketStore for MongoTicketStore {
    #[tracing::instrument(skip(self, ticket), fields(ticket_id = %ticket.id))]
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), Error> {
        self.insert_one(ticket, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_ticket_by_id(&self, ticket_id: TicketId) -> Result<Option<Ticket>, Error> {
        let ticket = self.find_one(bson::doc! { "_id": ticket_id }, None).await?;

        Ok(ticket)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_tickets_by_user(&self, user_id: UserId) -> Result<Vec<Ticket>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": -1 })
            .build();

        let tickets: Vec<Ticket> = self
            .find(bson::doc! { "user": user_id }, options)
            .await?
            .try_collect()
            .await?;

        Ok(tickets)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_tickets_by_event(&self, event_id: EventId) -> Result<Vec<Ticket>, Error> {
        let tickets: Vec<Ticket> = self
            .find(bson::doc! { "event": event_id }, None)
            .await?
            .try_collect()
            .await?;

        Ok(tickets)
    }

    #[tracing::instrument(skip(self, ticket), fields(ticket_id = %ticket.id))]
    async fn update_ticket(&self, mut ticket: Ticket) -> Result<Ticket, Error> {
        let read_modified_at = ticket.modified_at;
        ticket.modified_at = next_modified_at(read_modified_at, Utc::now());

        replace_if_unmodified(self, ticket.id, read_modified_at, &ticket).await?;

        Ok(ticket)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_ticket_sales(&self) -> Result<TicketSales, Error> {
        let pipeline = vec![
            bson::doc! { "$match": { "status": { "$ne": TicketStatus::Cancelled.as_str() } } },
            bson::doc! {
                "$group": {
                    "_id": null,
                    "tickets_sold": { "$sum": "$quantity" },
                    "revenue": { "$sum": "$total_price" },
                }
            },
        ];

        let mut cursor = self.aggregate(pipeline, None).await?;
        let sales = match cursor.try_next().await? {
            Some(document) => bson::from_document(document)?,
            None => TicketSales::default(),
        };

        Ok(sales)
    }
}
