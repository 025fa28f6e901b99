use chrono::{DateTime, Utc};

use crate::auth::AuthUser;
use crate::database::{Database, MAX_SAVE_ATTEMPTS};
use crate::error::{invalid_field, Error};
use crate::notification::manager as notifications;
use crate::notification::NotificationKind;
use crate::ticket::TicketStatus;
use crate::user::UserId;
use crate::vendor::{manager as vendors, VendorId, VendorStatus};

use super::{Event, EventFilter, EventId, EventStatus, Venue};

#[derive(Clone, Debug)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub category: String,
    pub venue: Venue,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: u32,
    pub price: f64,
    pub currency: String,
    pub image: Option<String>,
    pub status: EventStatus,
}

#[derive(Clone, Debug, Default)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub venue: Option<Venue>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub capacity: Option<u32>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub image: Option<String>,
    pub status: Option<EventStatus>,
}

fn check_dates(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Result<(), Error> {
    if end_date <= start_date {
        return Err(invalid_field("end_date", "end_date must be after start_date"));
    }
    Ok(())
}

#[tracing::instrument(skip(db))]
pub async fn create_event(
    db: &dyn Database,
    organizer: UserId,
    new_event: NewEvent,
) -> Result<Event, Error> {
    check_dates(new_event.start_date, new_event.end_date)?;

    let now = Utc::now();
    let event = Event {
        id: EventId::new(),
        title: new_event.title,
        description: new_event.description,
        category: new_event.category,
        venue: new_event.venue,
        start_date: new_event.start_date,
        end_date: new_event.end_date,
        capacity: new_event.capacity,
        tickets_sold: 0,
        price: new_event.price,
        currency: new_event.currency.to_uppercase(),
        organizer,
        vendors: vec![],
        status: new_event.status,
        image: new_event.image,
        created_at: now,
        modified_at: now,
    };

    db.events().insert_event(&event).await?;

    Ok(event)
}

#[tracing::instrument(skip(db))]
pub async fn get_published_events(
    db: &dyn Database,
    filter: &EventFilter,
    now: DateTime<Utc>,
) -> Result<Vec<Event>, Error> {
    db.events().fetch_published_events(filter, now).await
}

#[tracing::instrument(skip(db))]
pub async fn expect_event_by_id(db: &dyn Database, event_id: EventId) -> Result<Event, Error> {
    db.events()
        .fetch_event_by_id(event_id)
        .await?
        .ok_or(Error::EventNotFound { event_id })
}

/// Drafts are only visible to their organizer and admins.
#[tracing::instrument(skip(db))]
pub async fn get_visible_event(
    db: &dyn Database,
    auth: Option<&AuthUser>,
    event_id: EventId,
) -> Result<Event, Error> {
    let event = expect_event_by_id(db, event_id).await?;
    let can_see_draft = auth.map_or(false, |auth| {
        auth.require_owner_or_admin(event.organizer).is_ok()
    });

    if event.status == EventStatus::Draft && !can_see_draft {
        return Err(Error::EventNotFound { event_id });
    }

    Ok(event)
}

#[tracing::instrument(skip(db))]
pub async fn get_events_by_organizer(
    db: &dyn Database,
    organizer: UserId,
) -> Result<Vec<Event>, Error> {
    db.events().fetch_events_by_organizer(organizer).await
}

#[tracing::instrument(skip(db))]
pub async fn update_event(
    db: &dyn Database,
    auth: &AuthUser,
    event_id: EventId,
    changes: EventChanges,
) -> Result<Event, Error> {
    let mut event = expect_event_by_id(db, event_id).await?;
    auth.require_owner_or_admin(event.organizer)?;

    let was_cancelled = event.status == EventStatus::Cancelled;

    if let Some(title) = changes.title {
        event.title = title;
    }
    if let Some(description) = changes.description {
        event.description = description;
    }
    if let Some(category) = changes.category {
        event.category = category;
    }
    if let Some(venue) = changes.venue {
        event.venue = venue;
    }
    if let Some(start_date) = changes.start_date {
        event.start_date = start_date;
    }
    if let Some(end_date) = changes.end_date {
        event.end_date = end_date;
    }
    if let Some(capacity) = changes.capacity {
        if capacity < event.tickets_sold {
            return Err(Error::EventCapacityBelowTicketsSold {
                event_id,
                tickets_sold: event.tickets_sold,
            });
        }
        event.capacity = capacity;
    }
    if let Some(price) = changes.price {
        event.price = price;
    }
    if let Some(currency) = changes.currency {
        event.currency = currency.to_uppercase();
    }
    if let Some(image) = changes.image {
        event.image = Some(image);
    }
    if let Some(status) = changes.status {
        event.status = status;
    }

    check_dates(event.start_date, event.end_date)?;

    let event = db.events().update_event(event).await?;

    if !was_cancelled && event.status == EventStatus::Cancelled {
        notify_ticket_holders_of_cancellation(db, &event).await?;
    }

    Ok(event)
}

async fn notify_ticket_holders_of_cancellation(db: &dyn Database, event: &Event) -> Result<(), Error> {
    let tickets = db.tickets().fetch_tickets_by_event(event.id).await?;

    let mut recipients: Vec<UserId> = vec![];
    for ticket in tickets {
        if ticket.status == TicketStatus::Valid && !recipients.contains(&ticket.user) {
            recipients.push(ticket.user);
        }
    }

    notifications::notify_many(
        db,
        &recipients,
        NotificationKind::EventCancelled,
        "Event cancelled",
        &format!("{} has been cancelled", event.title),
        Some(event.id.to_string()),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(db))]
pub async fn delete_event(db: &dyn Database, auth: &AuthUser, event_id: EventId) -> Result<(), Error> {
    let event = expect_event_by_id(db, event_id).await?;
    auth.require_owner_or_admin(event.organizer)?;

    if event.tickets_sold > 0 {
        return Err(Error::EventHasTicketsSold {
            event_id,
            tickets_sold: event.tickets_sold,
        });
    }

    db.events().delete_event(event_id).await
}

#[tracing::instrument(skip(db))]
pub async fn attach_vendor(
    db: &dyn Database,
    auth: &AuthUser,
    event_id: EventId,
    vendor_id: VendorId,
) -> Result<Event, Error> {
    let event = expect_event_by_id(db, event_id).await?;
    auth.require_owner_or_admin(event.organizer)?;

    let vendor = vendors::expect_vendor_by_id(db, vendor_id).await?;
    if vendor.status != VendorStatus::Approved {
        return Err(Error::VendorNotApproved { vendor_id });
    }

    add_vendor_to_event(db, event_id, vendor_id).await
}

/// Idempotent; retried when the event is saved concurrently.
pub(crate) async fn add_vendor_to_event(
    db: &dyn Database,
    event_id: EventId,
    vendor_id: VendorId,
) -> Result<Event, Error> {
    for _ in 0..MAX_SAVE_ATTEMPTS {
        let mut event = expect_event_by_id(db, event_id).await?;
        if event.vendors.contains(&vendor_id) {
            return Ok(event);
        }
        event.vendors.push(vendor_id);

        match db.events().update_event(event).await {
            Err(Error::ConcurrentModificationDetected) => continue,
            result => return result,
        }
    }

    Err(Error::ConcurrentModificationDetected)
}

#[tracing::instrument(skip(db))]
pub async fn detach_vendor(
    db: &dyn Database,
    auth: &AuthUser,
    event_id: EventId,
    vendor_id: VendorId,
) -> Result<Event, Error> {
    let mut event = expect_event_by_id(db, event_id).await?;
    auth.require_owner_or_admin(event.organizer)?;

    event.vendors.retain(|id| *id != vendor_id);

    db.events().update_event(event).await
}

/// Takes `quantity` seats off the event, failing without side effects when
/// the event is not on sale or does not have enough seats left.
#[tracing::instrument(skip(db))]
pub async fn reserve_tickets(
    db: &dyn Database,
    event_id: EventId,
    quantity: u32,
    now: DateTime<Utc>,
) -> Result<Event, Error> {
    for _ in 0..MAX_SAVE_ATTEMPTS {
        let mut event = expect_event_by_id(db, event_id).await?;
        if !event.is_on_sale(now) {
            return Err(Error::EventNotOnSale { event_id });
        }
        if event.tickets_available() < quantity {
            return Err(Error::NotEnoughTickets {
                event_id,
                requested: quantity,
                available: event.tickets_available(),
            });
        }
        event.tickets_sold += quantity;

        match db.events().update_event(event).await {
            Err(Error::ConcurrentModificationDetected) => continue,
            result => return result,
        }
    }

    Err(Error::ConcurrentModificationDetected)
}

#[tracing::instrument(skip(db))]
pub async fn release_tickets(
    db: &dyn Database,
    event_id: EventId,
    quantity: u32,
) -> Result<Event, Error> {
    for _ in 0..MAX_SAVE_ATTEMPTS {
        let mut event = expect_event_by_id(db, event_id).await?;
        event.tickets_sold = event.tickets_sold.saturating_sub(quantity);

        match db.events().update_event(event).await {
            Err(Error::ConcurrentModificationDetected) => continue,
            result => return result,
        }
    }

    Err(Error::ConcurrentModificationDetected)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::Duration;

    use super::*;
    use crate::database::test::{sample_event, sample_ticket, MockDatabase};
    use crate::user::Role;

    fn organizer(user_id: UserId) -> AuthUser {
        AuthUser {
            user_id,
            role: Role::Organizer,
        }
    }

    #[tokio::test]
    async fn create_event_rejects_end_before_start() {
        let db = MockDatabase::new();
        let now = Utc::now();
        let event = sample_event(UserId::new());

        let new_event = NewEvent {
            title: event.title,
            description: event.description,
            category: event.category,
            venue: event.venue,
            start_date: now + Duration::days(2),
            end_date: now + Duration::days(1),
            capacity: 10,
            price: 5.0,
            currency: "usd".into(),
            image: None,
            status: EventStatus::Published,
        };

        let result = create_event(&db, UserId::new(), new_event).await;

        assert!(matches!(result, Err(Error::ValidationFailed { .. })));
    }

    #[tokio::test]
    async fn delete_event_with_tickets_sold_is_rejected() {
        let mut db = MockDatabase::new();
        let owner = UserId::new();
        let mut event = sample_event(owner);
        event.tickets_sold = 3;
        let event_id = event.id;
        db.events.on_fetch_event_by_id = Box::new(move |_| Ok(Some(event.clone())));

        let result = delete_event(&db, &organizer(owner), event_id).await;

        assert_eq!(
            result.unwrap_err(),
            Error::EventHasTicketsSold {
                event_id,
                tickets_sold: 3
            }
        );
    }

    #[tokio::test]
    async fn only_the_organizer_may_update() {
        let mut db = MockDatabase::new();
        let event = sample_event(UserId::new());
        let event_id = event.id;
        db.events.on_fetch_event_by_id = Box::new(move |_| Ok(Some(event.clone())));

        let result = update_event(
            &db,
            &organizer(UserId::new()),
            event_id,
            EventChanges::default(),
        )
        .await;

        assert_eq!(result.unwrap_err(), Error::NotResourceOwner);
    }

    #[tokio::test]
    async fn capacity_cannot_drop_below_tickets_sold() {
        let mut db = MockDatabase::new();
        let owner = UserId::new();
        let mut event = sample_event(owner);
        event.tickets_sold = 40;
        let event_id = event.id;
        db.events.on_fetch_event_by_id = Box::new(move |_| Ok(Some(event.clone())));

        let changes = EventChanges {
            capacity: Some(39),
            ..Default::default()
        };
        let result = update_event(&db, &organizer(owner), event_id, changes).await;

        assert_eq!(
            result.unwrap_err(),
            Error::EventCapacityBelowTicketsSold {
                event_id,
                tickets_sold: 40
            }
        );
    }

    #[tokio::test]
    async fn cancelling_notifies_each_valid_ticket_holder_once() {
        let mut db = MockDatabase::new();
        let owner = UserId::new();
        let event = sample_event(owner);
        let event_id = event.id;
        let holder = UserId::new();
        let mut used = sample_ticket(event_id, UserId::new());
        used.status = TicketStatus::Used;
        let tickets = vec![
            sample_ticket(event_id, holder),
            sample_ticket(event_id, holder),
            used,
        ];
        db.events.on_fetch_event_by_id = Box::new(move |_| Ok(Some(event.clone())));
        db.events.on_update_event = Box::new(Ok);
        db.tickets.on_fetch_tickets_by_event = Box::new(move |_| Ok(tickets.clone()));
        let notified = Arc::new(Mutex::new(vec![]));
        let notified_clone = Arc::clone(&notified);
        db.notifications.on_insert_notifications = Box::new(move |batch| {
            notified_clone
                .lock()
                .unwrap()
                .extend(batch.iter().map(|n| n.recipient));
            Ok(())
        });

        let changes = EventChanges {
            status: Some(EventStatus::Cancelled),
            ..Default::default()
        };
        let event = update_event(&db, &organizer(owner), event_id, changes)
            .await
            .unwrap();

        assert_eq!(event.status, EventStatus::Cancelled);
        assert_eq!(*notified.lock().unwrap(), vec![holder]);
    }

    #[tokio::test]
    async fn reserve_tickets_respects_capacity() {
        let mut db = MockDatabase::new();
        let mut event = sample_event(UserId::new());
        event.capacity = 10;
        event.tickets_sold = 8;
        let event_id = event.id;
        db.events.on_fetch_event_by_id = Box::new(move |_| Ok(Some(event.clone())));

        let result = reserve_tickets(&db, event_id, 3, Utc::now()).await;

        assert_eq!(
            result.unwrap_err(),
            Error::NotEnoughTickets {
                event_id,
                requested: 3,
                available: 2
            }
        );
    }

    #[tokio::test]
    async fn reserve_tickets_retries_on_concurrent_save() {
        let mut db = MockDatabase::new();
        let event = sample_event(UserId::new());
        let event_id = event.id;
        db.events.on_fetch_event_by_id = Box::new(move |_| Ok(Some(event.clone())));
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);
        db.events.on_update_event = Box::new(move |event| {
            if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::ConcurrentModificationDetected)
            } else {
                Ok(event)
            }
        });

        let event = reserve_tickets(&db, event_id, 2, Utc::now()).await.unwrap();

        assert_eq!(event.tickets_sold, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reserve_tickets_requires_published_event() {
        let mut db = MockDatabase::new();
        let mut event = sample_event(UserId::new());
        event.status = EventStatus::Draft;
        let event_id = event.id;
        db.events.on_fetch_event_by_id = Box::new(move |_| Ok(Some(event.clone())));

        let result = reserve_tickets(&db, event_id, 1, Utc::now()).await;

        assert_eq!(result.unwrap_err(), Error::EventNotOnSale { event_id });
    }
}
