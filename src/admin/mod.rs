use serde::{Deserialize, Serialize};

pub mod endpoints;
pub mod manager;
pub use endpoints::*;

/// Platform-wide counters shown on the admin dashboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub users: u64,
    pub events: u64,
    pub vendors: u64,
    pub orders: u64,
    pub tickets_sold: i64,
    pub ticket_revenue: f64,
    pub active_advertisements: u64,
    pub live_stories: u64,
}
