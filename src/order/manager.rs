use chrono::Utc;

use crate::auth::AuthUser;
use crate::database::Database;
use crate::error::Error;
use crate::event::manager as events;
use crate::event::EventId;
use crate::notification::manager as notifications;
use crate::notification::NotificationKind;
use crate::user::UserId;
use crate::vendor::manager as vendors;
use crate::vendor::{MenuItemId, VendorId, VendorStatus};

use super::{Order, OrderId, OrderItem, OrderStatus, DEFAULT_CURRENCY};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OrderLine {
    pub menu_item: MenuItemId,
    pub quantity: u32,
}

#[tracing::instrument(skip(db))]
pub async fn expect_order_by_id(db: &dyn Database, order_id: OrderId) -> Result<Order, Error> {
    db.orders()
        .fetch_order_by_id(order_id)
        .await?
        .ok_or(Error::OrderNotFound { order_id })
}

/// Prices the requested lines against the vendor's current menu and stores
/// the order as pending.
#[tracing::instrument(skip(db))]
pub async fn place_order(
    db: &dyn Database,
    buyer: UserId,
    vendor_id: VendorId,
    event_id: Option<EventId>,
    lines: Vec<OrderLine>,
) -> Result<Order, Error> {
    if lines.is_empty() {
        return Err(Error::EmptyOrder);
    }

    let vendor = vendors::expect_vendor_by_id(db, vendor_id).await?;
    if vendor.status != VendorStatus::Approved {
        return Err(Error::VendorNotApproved { vendor_id });
    }

    let currency = match event_id {
        Some(event_id) => events::expect_event_by_id(db, event_id).await?.currency,
        None => DEFAULT_CURRENCY.to_owned(),
    };

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let menu_item = vendor
            .menu_item(line.menu_item)
            .filter(|item| item.available)
            .ok_or(Error::MenuItemNotAvailable {
                vendor_id,
                menu_item_id: line.menu_item,
            })?;

        items.push(OrderItem {
            menu_item: menu_item.id,
            name: menu_item.name.clone(),
            unit_price: menu_item.price,
            quantity: line.quantity,
        });
    }

    let now = Utc::now();
    let order = Order {
        id: OrderId::new(),
        user: buyer,
        vendor: vendor_id,
        event: event_id,
        total: items.iter().map(OrderItem::subtotal).sum(),
        items,
        currency,
        status: OrderStatus::Pending,
        created_at: now,
        modified_at: now,
    };

    db.orders().insert_order(&order).await?;

    notifications::notify(
        db,
        vendor.owner,
        NotificationKind::OrderPlaced,
        "New order",
        &format!("A new order totalling {:.2} {} is waiting", order.total, order.currency),
        Some(order.id.to_string()),
    )
    .await?;

    Ok(order)
}

#[tracing::instrument(skip(db))]
pub async fn get_orders_by_user(db: &dyn Database, user_id: UserId) -> Result<Vec<Order>, Error> {
    db.orders().fetch_orders_by_user(user_id).await
}

#[tracing::instrument(skip(db))]
pub async fn get_orders_for_vendor(
    db: &dyn Database,
    auth: &AuthUser,
    vendor_id: VendorId,
) -> Result<Vec<Order>, Error> {
    let vendor = vendors::expect_vendor_by_id(db, vendor_id).await?;
    auth.require_owner_or_admin(vendor.owner)?;

    db.orders().fetch_orders_by_vendor(vendor_id).await
}

/// Orders are visible to the buyer, the vendor owner and admins.
#[tracing::instrument(skip(db))]
pub async fn get_visible_order(
    db: &dyn Database,
    auth: &AuthUser,
    order_id: OrderId,
) -> Result<Order, Error> {
    let order = expect_order_by_id(db, order_id).await?;
    if auth.require_owner_or_admin(order.user).is_ok() {
        return Ok(order);
    }

    let vendor = vendors::expect_vendor_by_id(db, order.vendor).await?;
    auth.require_owner_or_admin(vendor.owner)?;

    Ok(order)
}

/// Moves the order along its lifecycle on behalf of the vendor owner.
#[tracing::instrument(skip(db))]
pub async fn update_order_status(
    db: &dyn Database,
    auth: &AuthUser,
    order_id: OrderId,
    status: OrderStatus,
) -> Result<Order, Error> {
    let order = expect_order_by_id(db, order_id).await?;
    let vendor = vendors::expect_vendor_by_id(db, order.vendor).await?;
    auth.require_owner_or_admin(vendor.owner)?;

    transition(db, order, status).await
}

/// The buyer may cancel while the order is still pending. The vendor owner
/// may also cancel accepted orders.
#[tracing::instrument(skip(db))]
pub async fn cancel_order(
    db: &dyn Database,
    auth: &AuthUser,
    order_id: OrderId,
) -> Result<Order, Error> {
    let order = expect_order_by_id(db, order_id).await?;

    if !auth.is_admin() && auth.user_id == order.user {
        if order.status != OrderStatus::Pending {
            return Err(Error::InvalidOrderStatusTransition {
                order_id,
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }
    } else {
        let vendor = vendors::expect_vendor_by_id(db, order.vendor).await?;
        auth.require_owner_or_admin(vendor.owner)?;
    }

    transition(db, order, OrderStatus::Cancelled).await
}

async fn transition(db: &dyn Database, mut order: Order, status: OrderStatus) -> Result<Order, Error> {
    if !order.status.can_transition_to(status) {
        return Err(Error::InvalidOrderStatusTransition {
            order_id: order.id,
            from: order.status,
            to: status,
        });
    }

    order.status = status;
    let order = db.orders().update_order(order).await?;

    notifications::notify(
        db,
        order.user,
        NotificationKind::OrderStatusChanged,
        "Order updated",
        &format!("Your order is now {}", order.status.as_str()),
        Some(order.id.to_string()),
    )
    .await?;

    Ok(order)
}
