use actix_web::web::{Data, Json, Path};
use actix_web::{get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::AuthUser;
use crate::cache::{self, keys, Cache};
use crate::database::Database;
use crate::error::Error;
use crate::event::EventId;
use crate::user::{Role, UserId};

use super::manager;
use super::{Ticket, TicketId, TicketStatus};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TicketBody {
    pub id: TicketId,
    pub event: EventId,
    pub user: UserId,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
    pub currency: String,
    pub code: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl TicketBody {
    pub fn render(ticket: Ticket) -> TicketBody {
        TicketBody {
            id: ticket.id,
            event: ticket.event,
            user: ticket.user,
            quantity: ticket.quantity,
            unit_price: ticket.unit_price,
            total_price: ticket.total_price,
            currency: ticket.currency,
            code: ticket.code,
            status: ticket.status,
            created_at: ticket.created_at,
            modified_at: ticket.modified_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PurchaseTicketsBody {
    #[validate(range(min = 1, max = 20))]
    pub quantity: u32,
}

#[post("/events/{event_id}/tickets")]
#[tracing::instrument(skip(db, cache))]
pub async fn purchase_tickets(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    auth: AuthUser,
    params: Path<EventId>,
    body: Json<PurchaseTicketsBody>,
) -> Result<Json<TicketBody>, Error> {
    let body = body.into_inner();
    body.validate()?;

    let ticket =
        manager::purchase_tickets(&***db, auth.user_id, params.into_inner(), body.quantity)
            .await?;

    // listings show the remaining seats
    cache::invalidate_prefix(&***cache, keys::EVENTS_PREFIX).await;

    Ok(Json(TicketBody::render(ticket)))
}

#[get("/events/{event_id}/tickets")]
#[tracing::instrument(skip(db))]
pub async fn get_tickets_for_event(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<EventId>,
) -> Result<Json<Vec<TicketBody>>, Error> {
    auth.require_role(&[Role::Organizer])?;

    let tickets = manager::get_tickets_for_event(&***db, &auth, params.into_inner()).await?;

    Ok(Json(tickets.into_iter().map(TicketBody::render).collect()))
}

#[get("/tickets/mine")]
#[tracing::instrument(skip(db))]
pub async fn get_my_tickets(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
) -> Result<Json<Vec<TicketBody>>, Error> {
    let tickets = manager::get_tickets_by_user(&***db, auth.user_id).await?;

    Ok(Json(tickets.into_iter().map(TicketBody::render).collect()))
}

#[post("/tickets/{ticket_id}/cancel")]
#[tracing::instrument(skip(db, cache))]
pub async fn cancel_ticket(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    auth: AuthUser,
    params: Path<TicketId>,
) -> Result<Json<TicketBody>, Error> {
    let ticket = manager::cancel_ticket(&***db, &auth, params.into_inner()).await?;

    cache::invalidate_prefix(&***cache, keys::EVENTS_PREFIX).await;

    Ok(Json(TicketBody::render(ticket)))
}

#[post("/tickets/{ticket_id}/check-in")]
#[tracing::instrument(skip(db))]
pub async fn check_in_ticket(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<TicketId>,
) -> Result<Json<TicketBody>, Error> {
    auth.require_role(&[Role::Organizer])?;

    let ticket = manager::check_in_ticket(&***db, &auth, params.into_inner()).await?;

    Ok(Json(TicketBody::render(ticket)))
}
