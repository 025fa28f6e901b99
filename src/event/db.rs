use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::database::{next_modified_at, replace_if_unmodified, MongoEventStore};
use crate::error::Error;
use crate::user::UserId;
use crate::utils::bson_now;
use crate::vendor::VendorId;

use super::{Event, EventFilter, EventId, EventStatus};

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": "events",
            "indexes": [
                { "key": { "status": 1, "start_date": 1 }, "name": "by_status_and_start" },
                { "key": { "organizer": 1 }, "name": "by_organizer" },
                { "key": { "vendors": 1 }, "name": "by_vendor" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_event(&self, event: &Event) -> Result<(), Error>;

    /// Published events matching the filter, soonest first.
    async fn fetch_published_events(
        &self,
        filter: &EventFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, Error>;

    async fn fetch_event_by_id(&self, event_id: EventId) -> Result<Option<Event>, Error>;

    async fn fetch_events_by_organizer(&self, organizer: UserId) -> Result<Vec<Event>, Error>;

    async fn fetch_events_by_vendor(&self, vendor_id: VendorId) -> Result<Vec<Event>, Error>;

    async fn update_event(&self, event: Event) -> Result<Event, Error>;

    async fn delete_event(&self, event_id: EventId) -> Result<(), Error>;

    async fn count_events(&self) -> Result<u64, Error>;
}

#[async_trait]
impl EventStore for MongoEventStore {
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id))]
    async fn insert_event(&self, event: &Event) -> Result<(), Error> {
        self.insert_one(event, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_published_events(
        &self,
        filter: &EventFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, Error> {
        let mut query = bson::doc! { "status": EventStatus::Published.as_str() };
        // case-insensitive exact match
        if let Some(city) = &filter.city {
            query.insert(
                "venue.city",
                bson::doc! { "$regex": format!("^{}$", escape_regex(city)), "$options": "i" },
            );
        }
        if let Some(category) = &filter.category {
            query.insert(
                "category",
                bson::doc! { "$regex": format!("^{}$", escape_regex(category)), "$options": "i" },
            );
        }
        if filter.upcoming {
            query.insert("end_date", bson::doc! { "$gte": bson_now(now) });
        }

        let options = FindOptions::builder()
            .sort(bson::doc! { "start_date": 1 })
            .build();

        let events: Vec<Event> = self.find(query, options).await?.try_collect().await?;

        Ok(events)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_event_by_id(&self, event_id: EventId) -> Result<Option<Event>, Error> {
        let event = self.find_one(bson::doc! { "_id": event_id }, None).await?;

        Ok(event)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_events_by_organizer(&self, organizer: UserId) -> Result<Vec<Event>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "start_date": -1 })
            .build();

        let events: Vec<Event> = self
            .find(bson::doc! { "organizer": organizer }, options)
            .await?
            .try_collect()
            .await?;

        Ok(events)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_events_by_vendor(&self, vendor_id: VendorId) -> Result<Vec<Event>, Error> {
        let events: Vec<Event> = self
            .find(bson::doc! { "vendors": vendor_id }, None)
            .await?
            .try_collect()
            .await?;

        Ok(events)
    }

    #[tracing::instrument(skip(self, event), fields(event_id = %event.id))]
    async fn update_event(&self, mut event: Event) -> Result<Event, Error> {
        let read_modified_at = event.modified_at;
        event.modified_at = next_modified_at(read_modified_at, Utc::now());

        replace_if_unmodified(self, event.id, read_modified_at, &event).await?;

        Ok(event)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_event(&self, event_id: EventId) -> Result<(), Error> {
        self.delete_one(bson::doc! { "_id": event_id }, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn count_events(&self) -> Result<u64, Error> {
        let count = self.count_documents(bson::doc! {}, None).await?;

        Ok(count)
    }
}

fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_regex;

    #[test]
    fn escapes_regex_metacharacters() {
        assert_eq!(escape_regex("St. Louis (MO)"), r"St\. Louis \(MO\)");
        assert_eq!(escape_regex("Berlin"), "Berlin");
    }
}
