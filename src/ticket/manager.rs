use chrono::Utc;
use tracing::warn;

use crate::auth::AuthUser;
use crate::database::Database;
use crate::error::Error;
use crate::event::manager as events;
use crate::event::EventId;
use crate::notification::manager as notifications;
use crate::notification::NotificationKind;
use crate::user::UserId;

use super::{generate_code, Ticket, TicketId, TicketStatus};

#[tracing::instrument(skip(db))]
pub async fn expect_ticket_by_id(db: &dyn Database, ticket_id: TicketId) -> Result<Ticket, Error> {
    db.tickets()
        .fetch_ticket_by_id(ticket_id)
        .await?
        .ok_or(Error::TicketNotFound { ticket_id })
}

/// Reserves seats on the event first, then issues the ticket. If the ticket
/// cannot be stored the seats are given back.
#[tracing::instrument(skip(db))]
pub async fn purchase_tickets(
    db: &dyn Database,
    buyer: UserId,
    event_id: EventId,
    quantity: u32,
) -> Result<Ticket, Error> {
    let now = Utc::now();
    let event = events::reserve_tickets(db, event_id, quantity, now).await?;

    let ticket = Ticket {
        id: TicketId::new(),
        event: event_id,
        user: buyer,
        quantity,
        unit_price: event.price,
        total_price: event.price * quantity as f64,
        currency: event.currency.clone(),
        code: generate_code(),
        status: TicketStatus::Valid,
        created_at: now,
        modified_at: now,
    };

    if let Err(err) = db.tickets().insert_ticket(&ticket).await {
        if let Err(release_err) = events::release_tickets(db, event_id, quantity).await {
            warn!(%event_id, quantity, error = %release_err, "could not release reserved seats");
        }
        return Err(err);
    }

    notifications::notify(
        db,
        buyer,
        NotificationKind::TicketPurchased,
        "Tickets confirmed",
        &format!("{} ticket(s) for {}, code {}", quantity, event.title, ticket.code),
        Some(ticket.id.to_string()),
    )
    .await?;

    Ok(ticket)
}

#[tracing::instrument(skip(db))]
pub async fn get_tickets_by_user(db: &dyn Database, user_id: UserId) -> Result<Vec<Ticket>, Error> {
    db.tickets().fetch_tickets_by_user(user_id).await
}

#[tracing::instrument(skip(db))]
pub async fn get_tickets_for_event(
    db: &dyn Database,
    auth: &AuthUser,
    event_id: EventId,
) -> Result<Vec<Ticket>, Error> {
    let event = events::expect_event_by_id(db, event_id).await?;
    auth.require_owner_or_admin(event.organizer)?;

    db.tickets().fetch_tickets_by_event(event_id).await
}

#[tracing::instrument(skip(db))]
pub async fn cancel_ticket(
    db: &dyn Database,
    auth: &AuthUser,
    ticket_id: TicketId,
) -> Result<Ticket, Error> {
    let mut ticket = expect_ticket_by_id(db, ticket_id).await?;
    auth.require_owner_or_admin(ticket.user)?;

    if ticket.status != TicketStatus::Valid {
        return Err(Error::TicketNotValid { ticket_id });
    }

    ticket.status = TicketStatus::Cancelled;
    let ticket = db.tickets().update_ticket(ticket).await?;

    events::release_tickets(db, ticket.event, ticket.quantity).await?;

    Ok(ticket)
}

/// Marks a valid ticket as used at the door. Only the organizer of the
/// event (or an admin) may do so.
#[tracing::instrument(skip(db))]
pub async fn check_in_ticket(
    db: &dyn Database,
    auth: &AuthUser,
    ticket_id: TicketId,
) -> Result<Ticket, Error> {
    let mut ticket = expect_ticket_by_id(db, ticket_id).await?;
    let event = events::expect_event_by_id(db, ticket.event).await?;
    auth.require_owner_or_admin(event.organizer)?;

    if ticket.status != TicketStatus::Valid {
        return Err(Error::TicketNotValid { ticket_id });
    }

    ticket.status = TicketStatus::Used;

    db.tickets().update_ticket(ticket).await
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::database::test::{sample_event, sample_ticket, MockDatabase};
    use crate::user::Role;

    #[tokio::test]
    async fn purchase_prices_the_ticket_and_takes_seats() {
        let mut db = MockDatabase::new();
        let mut event = sample_event(UserId::new());
        event.price = 12.5;
        event.capacity = 10;
        let event_id = event.id;
        let buyer = UserId::new();
        db.events.on_fetch_event_by_id = Box::new(move |_| Ok(Some(event.clone())));
        let seats = Arc::new(Mutex::new(0));
        let seats_clone = Arc::clone(&seats);
        db.events.on_update_event = Box::new(move |event| {
            *seats_clone.lock().unwrap() = event.tickets_sold;
            Ok(event)
        });
        db.tickets.on_insert_ticket = Box::new(|_| Ok(()));
        db.notifications.on_insert_notifications = Box::new(|_| Ok(()));

        let ticket = purchase_tickets(&db, buyer, event_id, 4).await.unwrap();

        assert_eq!(ticket.user, buyer);
        assert_eq!(ticket.quantity, 4);
        assert_eq!(ticket.total_price, 50.0);
        assert_eq!(ticket.status, TicketStatus::Valid);
        assert_eq!(*seats.lock().unwrap(), 4);
    }

    #[tokio::test]
    async fn purchase_beyond_capacity_issues_nothing() {
        let mut db = MockDatabase::new();
        let mut event = sample_event(UserId::new());
        event.capacity = 2;
        let event_id = event.id;
        db.events.on_fetch_event_by_id = Box::new(move |_| Ok(Some(event.clone())));

        let result = purchase_tickets(&db, UserId::new(), event_id, 3).await;

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
    async fn cancelling_returns_seats_to_the_event() {
        let mut db = MockDatabase::new();
        let owner = UserId::new();
        let mut event = sample_event(UserId::new());
        event.tickets_sold = 5;
        let mut ticket = sample_ticket(event.id, owner);
        ticket.quantity = 2;
        let ticket_id = ticket.id;
        db.tickets.on_fetch_ticket_by_id = Box::new(move |_| Ok(Some(ticket.clone())));
        db.tickets.on_update_ticket = Box::new(Ok);
        db.events.on_fetch_event_by_id = Box::new(move |_| Ok(Some(event.clone())));
        let seats = Arc::new(Mutex::new(0));
        let seats_clone = Arc::clone(&seats);
        db.events.on_update_event = Box::new(move |event| {
            *seats_clone.lock().unwrap() = event.tickets_sold;
            Ok(event)
        });

        let auth = AuthUser {
            user_id: owner,
            role: Role::User,
        };
        let ticket = cancel_ticket(&db, &auth, ticket_id).await.unwrap();

        assert_eq!(ticket.status, TicketStatus::Cancelled);
        assert_eq!(*seats.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn used_tickets_cannot_be_checked_in_twice() {
        let mut db = MockDatabase::new();
        let organizer = UserId::new();
        let event = sample_event(organizer);
        let mut ticket = sample_ticket(event.id, UserId::new());
        ticket.status = TicketStatus::Used;
        let ticket_id = ticket.id;
        db.tickets.on_fetch_ticket_by_id = Box::new(move |_| Ok(Some(ticket.clone())));
        db.events.on_fetch_event_by_id = Box::new(move |_| Ok(Some(event.clone())));

        let auth = AuthUser {
            user_id: organizer,
            role: Role::Organizer,
        };
        let result = check_in_ticket(&db, &auth, ticket_id).await;

        assert_eq!(result.unwrap_err(), Error::TicketNotValid { ticket_id });
    }

    #[tokio::test]
    async fn only_the_organizer_checks_tickets_in() {
        let mut db = MockDatabase::new();
        let event = sample_event(UserId::new());
        let ticket = sample_ticket(event.id, UserId::new());
        let ticket_id = ticket.id;
        db.tickets.on_fetch_ticket_by_id = Box::new(move |_| Ok(Some(ticket.clone())));
        db.events.on_fetch_event_by_id = Box::new(move |_| Ok(Some(event.clone())));

        let auth = AuthUser {
            user_id: UserId::new(),
            role: Role::Organizer,
        };
        let result = check_in_ticket(&db, &auth, ticket_id).await;

        assert_eq!(result.unwrap_err(), Error::NotResourceOwner);
    }
}
