use chrono::{Duration, NaiveTime, Utc};
use tracing::info;

use crate::advertisement::{
    AdContent, Advertisement, AdvertisementId, AdvertisementStatus, Budget, CallToAction,
    MediaType, Metrics, Schedule, Targeting, TimeWindow,
};
use crate::auth::password::hash_password;
use crate::database::Database;
use crate::error::Error;
use crate::event::{Event, EventId, EventStatus, Venue};
use crate::user::{Role, User, UserId, UserStatus};
use crate::vendor::{MenuItem, MenuItemId, Vendor, VendorId, VendorStatus};

/// Every seeded account uses this password.
pub const SEED_PASSWORD: &str = "eventhub-demo";

fn seed_user(name: &str, email: &str, role: Role, password_hash: &str) -> User {
    let now = Utc::now();
    User {
        id: UserId::new(),
        name: name.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role,
        status: UserStatus::Active,
        avatar: None,
        bio: None,
        location: Some("Berlin".to_string()),
        interests: vec!["music".to_string(), "food".to_string()],
        friends: vec![],
        followers: vec![],
        following: vec![],
        created_at: now,
        modified_at: now,
    }
}

/// Fills an empty database with one account per role, an approved vendor,
/// a published event and a running ad.
pub async fn seed(db: &dyn Database) -> Result<(), Error> {
    let password_hash = hash_password(SEED_PASSWORD)?;

    let admin = seed_user("Ada Admin", "admin@eventhub.local", Role::Admin, &password_hash);
    let organizer = seed_user(
        "Otto Organizer",
        "organizer@eventhub.local",
        Role::Organizer,
        &password_hash,
    );
    let vendor_owner = seed_user("Vera Vendor", "vendor@eventhub.local", Role::Vendor, &password_hash);
    let user = seed_user("Uma User", "user@eventhub.local", Role::User, &password_hash);

    for account in [&admin, &organizer, &vendor_owner, &user] {
        db.users().insert_user(account).await?;
    }

    let now = Utc::now();
    let vendor = Vendor {
        id: VendorId::new(),
        owner: vendor_owner.id,
        name: "Vera's Tacos".to_string(),
        description: "Tacos al pastor and fresh horchata".to_string(),
        cuisine: "mexican".to_string(),
        location: "Berlin".to_string(),
        menu: vec![
            MenuItem {
                id: MenuItemId::new(),
                name: "Taco al pastor".to_string(),
                description: "Pork, pineapple, coriander".to_string(),
                price: 3.5,
                available: true,
            },
            MenuItem {
                id: MenuItemId::new(),
                name: "Horchata".to_string(),
                description: "Cinnamon rice drink".to_string(),
                price: 2.5,
                available: true,
            },
        ],
        status: VendorStatus::Approved,
        logo: None,
        created_at: now,
        modified_at: now,
    };
    db.vendors().insert_vendor(&vendor).await?;

    let event = Event {
        id: EventId::new(),
        title: "Night Market".to_string(),
        description: "Street food, live music and local makers".to_string(),
        category: "food".to_string(),
        venue: Venue {
            name: "Markthalle Neun".to_string(),
            address: "Eisenbahnstrasse 42".to_string(),
            city: "Berlin".to_string(),
        },
        start_date: now + Duration::days(14),
        end_date: now + Duration::days(14) + Duration::hours(6),
        capacity: 500,
        tickets_sold: 0,
        price: 8.0,
        currency: "EUR".to_string(),
        organizer: organizer.id,
        vendors: vec![vendor.id],
        status: EventStatus::Published,
        image: None,
        created_at: now,
        modified_at: now,
    };
    db.events().insert_event(&event).await?;

    let advertisement = Advertisement {
        id: AdvertisementId::new(),
        title: "Two tacos, one price".to_string(),
        description: "Show this ad at the stand".to_string(),
        content: AdContent {
            media_type: MediaType::Image,
            url: "https://cdn.eventhub.local/ads/tacos.jpg".to_string(),
            thumbnail: None,
            call_to_action: Some(CallToAction {
                label: "See the menu".to_string(),
                url: format!("https://eventhub.local/vendors/{}", vendor.id),
            }),
        },
        targeting: Targeting {
            locations: vec!["Berlin".to_string()],
            age_range: None,
            interests: vec!["food".to_string()],
            events: vec![event.id],
        },
        schedule: Schedule {
            start_date: now,
            end_date: now + Duration::days(30),
            time_windows: vec![TimeWindow {
                start: NaiveTime::MIN,
                end: NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN),
            }],
        },
        metrics: Metrics::default(),
        status: AdvertisementStatus::Active,
        advertiser: vendor_owner.id,
        budget: Budget {
            total: 50.0,
            spent: 0.0,
            currency: "EUR".to_string(),
            cost_per_click: 0.25,
        },
        created_at: now,
        modified_at: now,
    };
    db.advertisements()
        .insert_advertisement(&advertisement)
        .await?;

    info!(
        password = SEED_PASSWORD,
        "seeded admin@, organizer@, vendor@ and user@eventhub.local"
    );

    Ok(())
}
