use chrono::{DateTime, Utc};

use crate::advertisement::AdvertisementStatus;
use crate::database::Database;
use crate::error::Error;

use super::DashboardStats;

#[tracing::instrument(skip(db))]
pub async fn get_dashboard_stats(
    db: &dyn Database,
    now: DateTime<Utc>,
) -> Result<DashboardStats, Error> {
    let users = db.users().count_users().await?;
    let events = db.events().count_events().await?;
    let vendors = db.vendors().count_vendors().await?;
    let orders = db.orders().count_orders().await?;
    let sales = db.tickets().fetch_ticket_sales().await?;
    let active_advertisements = db
        .advertisements()
        .count_advertisements(Some(AdvertisementStatus::Active))
        .await?;
    let live_stories = db.stories().count_live_stories(now).await?;

    Ok(DashboardStats {
        users,
        events,
        vendors,
        orders,
        tickets_sold: sales.tickets_sold,
        ticket_revenue: sales.revenue,
        active_advertisements,
        live_stories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test::MockDatabase;
    use crate::ticket::TicketSales;

    #[tokio::test]
    async fn dashboard_collects_every_counter() {
        let mut db = MockDatabase::new();
        db.users.on_count_users = Box::new(|| Ok(4));
        db.events.on_count_events = Box::new(|| Ok(3));
        db.vendors.on_count_vendors = Box::new(|| Ok(2));
        db.orders.on_count_orders = Box::new(|| Ok(7));
        db.tickets.on_fetch_ticket_sales = Box::new(|| {
            Ok(TicketSales {
                tickets_sold: 12,
                revenue: 240.0,
            })
        });
        db.advertisements.on_count_advertisements = Box::new(|status| {
            assert_eq!(status, Some(AdvertisementStatus::Active));
            Ok(1)
        });
        db.stories.on_count_live_stories = Box::new(|_| Ok(5));

        let stats = get_dashboard_stats(&db, Utc::now()).await.unwrap();

        assert_eq!(
            stats,
            DashboardStats {
                users: 4,
                events: 3,
                vendors: 2,
                orders: 7,
                tickets_sold: 12,
                ticket_revenue: 240.0,
                active_advertisements: 1,
                live_stories: 5,
            }
        );
    }
}
