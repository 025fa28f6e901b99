use actix_web::web::{Data, Json, Path};
use actix_web::{get, patch, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::AuthUser;
use crate::database::Database;
use crate::error::Error;
use crate::event::EventId;
use crate::user::UserId;
use crate::vendor::{MenuItemId, VendorId};

use super::manager::{self, OrderLine};
use super::{Order, OrderId, OrderItem, OrderStatus};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderBody {
    pub id: OrderId,
    pub user: UserId,
    pub vendor: VendorId,
    pub event: Option<EventId>,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub currency: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl OrderBody {
    pub fn render(order: Order) -> OrderBody {
        OrderBody {
            id: order.id,
            user: order.user,
            vendor: order.vendor,
            event: order.event,
            items: order.items,
            total: order.total,
            currency: order.currency,
            status: order.status,
            created_at: order.created_at,
            modified_at: order.modified_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct OrderLineBody {
    pub menu_item: MenuItemId,
    #[validate(range(min = 1, max = 50))]
    pub quantity: u32,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PlaceOrderBody {
    pub event: Option<EventId>,
    #[validate(nested)]
    pub items: Vec<OrderLineBody>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateOrderStatusBody {
    pub status: OrderStatus,
}

#[post("/vendors/{vendor_id}/orders")]
#[tracing::instrument(skip(db))]
pub async fn place_order(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<VendorId>,
    body: Json<PlaceOrderBody>,
) -> Result<Json<OrderBody>, Error> {
    let body = body.into_inner();
    body.validate()?;

    let lines = body
        .items
        .into_iter()
        .map(|line| OrderLine {
            menu_item: line.menu_item,
            quantity: line.quantity,
        })
        .collect();
    let order =
        manager::place_order(&***db, auth.user_id, params.into_inner(), body.event, lines).await?;

    Ok(Json(OrderBody::render(order)))
}

#[get("/vendors/{vendor_id}/orders")]
#[tracing::instrument(skip(db))]
pub async fn get_orders_for_vendor(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<VendorId>,
) -> Result<Json<Vec<OrderBody>>, Error> {
    let orders = manager::get_orders_for_vendor(&***db, &auth, params.into_inner()).await?;

    Ok(Json(orders.into_iter().map(OrderBody::render).collect()))
}

#[get("/orders/mine")]
#[tracing::instrument(skip(db))]
pub async fn get_my_orders(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
) -> Result<Json<Vec<OrderBody>>, Error> {
    let orders = manager::get_orders_by_user(&***db, auth.user_id).await?;

    Ok(Json(orders.into_iter().map(OrderBody::render).collect()))
}

#[get("/orders/{order_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_order_by_id(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<OrderId>,
) -> Result<Json<OrderBody>, Error> {
    let order = manager::get_visible_order(&***db, &auth, params.into_inner()).await?;

    Ok(Json(OrderBody::render(order)))
}

#[patch("/orders/{order_id}/status")]
#[tracing::instrument(skip(db))]
pub async fn update_order_status(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<OrderId>,
    body: Json<UpdateOrderStatusBody>,
) -> Result<Json<OrderBody>, Error> {
    let order =
        manager::update_order_status(&***db, &auth, params.into_inner(), body.status).await?;

    Ok(Json(OrderBody::render(order)))
}

#[post("/orders/{order_id}/cancel")]
#[tracing::instrument(skip(db))]
pub async fn cancel_order(
    db: Data<Box<dyn Database>>,
    auth: AuthUser,
    params: Path<OrderId>,
) -> Result<Json<OrderBody>, Error> {
    let order = manager::cancel_order(&***db, &auth, params.into_inner()).await?;

    Ok(Json(OrderBody::render(order)))
}
