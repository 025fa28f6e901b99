#[macro_use]
extern crate derivative;

use actix_web::web::{self, Data, FormConfig, Json, JsonConfig, PathConfig, QueryConfig, ServiceConfig};
use actix_web::{get, App, HttpResponse, HttpServer, ResponseError};
use mongodb::Client;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

pub mod admin;
pub mod advertisement;
pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod event;
pub mod notification;
pub mod order;
pub mod seed;
pub mod social;
pub mod story;
pub mod ticket;
pub mod typedid;
pub mod user;
pub mod utils;
pub mod vendor;

use crate::auth::jwt::JwtKeys;
use crate::config::Config;
use crate::database::{Database, MongoDatabase};
use crate::error::Error;
use crate::utils::SuccessBody;

/// Logs to stdout, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::NEW)
        .compact()
        .init();
}

#[get("/health")]
async fn health() -> Json<SuccessBody> {
    Json(SuccessBody::ok())
}

/// Registers the extractor error handlers and every route. Application data
/// (database, cache, keys and configs) is left to the caller.
pub fn configure(cfg: &mut ServiceConfig) {
    cfg.app_data(JsonConfig::default().error_handler(|err, _req| {
        // format json errors with custom format
        Error::InvalidJson(err).into()
    }))
    .app_data(PathConfig::default().error_handler(|err, _req| {
        // format path errors with custom format
        Error::InvalidPath(err).into()
    }))
    .app_data(FormConfig::default().error_handler(|err, _req| {
        // format form errors with custom format
        Error::InvalidForm(err).into()
    }))
    .app_data(QueryConfig::default().error_handler(|err, _req| {
        // format query errors with custom format
        Error::InvalidQuery(err).into()
    }))
    .service(health)
    .service(
        // literal segments go before their `{id}` siblings
        web::scope("/api/v1")
            .service(auth::register)
            .service(auth::login)
            .service(auth::me)
            .service(user::update_my_profile)
            .service(user::get_user_profile)
            .service(event::create_event)
            .service(event::get_events)
            .service(event::get_my_events)
            .service(event::get_event_by_id)
            .service(event::update_event)
            .service(event::delete_event)
            .service(event::attach_vendor)
            .service(event::detach_vendor)
            .service(ticket::purchase_tickets)
            .service(ticket::get_tickets_for_event)
            .service(vendor::get_vendor_requests_for_event)
            .service(vendor::create_vendor)
            .service(vendor::get_vendors)
            .service(vendor::get_my_vendors)
            .service(vendor::get_vendor_by_id)
            .service(vendor::update_vendor)
            .service(vendor::replace_menu)
            .service(vendor::delete_vendor)
            .service(vendor::request_to_join_event)
            .service(vendor::get_vendor_requests_for_vendor)
            .service(vendor::approve_vendor_request)
            .service(vendor::reject_vendor_request)
            .service(order::place_order)
            .service(order::get_orders_for_vendor)
            .service(ticket::get_my_tickets)
            .service(ticket::cancel_ticket)
            .service(ticket::check_in_ticket)
            .service(order::get_my_orders)
            .service(order::get_order_by_id)
            .service(order::update_order_status)
            .service(order::cancel_order)
            .service(advertisement::create_advertisement)
            .service(advertisement::get_public_ads)
            .service(advertisement::get_my_ads)
            .service(advertisement::get_advertisement_by_id)
            .service(advertisement::update_advertisement)
            .service(advertisement::delete_advertisement)
            .service(advertisement::record_view)
            .service(advertisement::record_click)
            .service(story::create_story)
            .service(story::get_feed)
            .service(story::get_stories_by_user)
            .service(story::get_story_by_id)
            .service(story::view_story)
            .service(story::delete_story)
            .service(social::send_friend_request)
            .service(social::get_friend_requests)
            .service(social::accept_friend_request)
            .service(social::reject_friend_request)
            .service(social::get_friends)
            .service(social::unfriend)
            .service(social::follow)
            .service(social::unfollow)
            .service(social::send_message)
            .service(social::get_conversation)
            .service(notification::get_notifications)
            .service(notification::get_unread_count)
            .service(notification::mark_all_read)
            .service(notification::mark_read)
            .service(notification::delete_notification)
            .service(admin::get_dashboard)
            .service(admin::get_users)
            .service(admin::set_user_status)
            .service(admin::set_user_role)
            .service(admin::delete_event)
            .service(admin::set_vendor_status)
            .service(admin::delete_story)
            .service(admin::get_advertisements)
            .service(admin::set_advertisement_status)
            .service(admin::broadcast),
    );
}

pub async fn not_found() -> HttpResponse {
    Error::PathNotFound.error_response()
}

pub async fn run(config: Config) -> Result<(), Error> {
    info!("connecting to db: {}", config.database.uri);
    let mongo = Client::with_uri_str(&config.database.uri)
        .await?
        .database(&config.database.name);

    if config.seed_database {
        warn!("dropping database {} before seeding", config.database.name);
        mongo.drop(None).await?;
    }

    let db = MongoDatabase::initialize(mongo).await?;
    if config.seed_database {
        seed::seed(&db).await?;
    }

    let cache = Data::new(cache::connect(&config.cache).await?);
    let db = Data::new(Box::new(db) as Box<dyn Database>);
    let keys = Data::new(JwtKeys::new(&config.auth));
    let cache_config = Data::new(config.cache.clone());
    let ad_config = Data::new(config.ads.clone());

    let address = (config.server.host.clone(), config.server.port);
    info!("listening on {}:{}", address.0, address.1);

    HttpServer::new(move || {
        App::new()
            .app_data(db.clone())
            .app_data(cache.clone())
            .app_data(keys.clone())
            .app_data(cache_config.clone())
            .app_data(ad_config.clone())
            .wrap(TracingLogger::default())
            .configure(configure)
            .default_service(web::to(not_found))
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use serde_json::Value;

    use super::*;
    use crate::advertisement::MetricsBody;
    use crate::admin::DashboardStats;
    use crate::cache::memory::MemoryCache;
    use crate::cache::Cache;
    use crate::config::AuthConfig;
    use crate::database::test::{sample_advertisement, MockDatabase};
    use crate::ticket::TicketSales;
    use crate::user::{Role, UserId};

    fn keys() -> JwtKeys {
        JwtKeys::new(&AuthConfig {
            jwt_secret: "endpoint-tests".into(),
            jwt_ttl_hours: 1,
        })
    }

    fn bearer(role: Role) -> (&'static str, String) {
        let (token, _) = keys().issue(UserId::new(), role).unwrap();
        ("Authorization", format!("Bearer {}", token))
    }

    macro_rules! app {
        ($db:expr) => {
            test::init_service(
                App::new()
                    .app_data(Data::new(Box::new($db) as Box<dyn Database>))
                    .app_data(Data::new(Box::new(MemoryCache::new(100)) as Box<dyn Cache>))
                    .app_data(Data::new(keys()))
                    .configure(configure)
                    .default_service(web::to(not_found)),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn health_reports_success() {
        let app = app!(MockDatabase::new());

        let body: SuccessBody =
            test::call_and_read_body_json(&app, TestRequest::get().uri("/health").to_request())
                .await;

        assert!(body.success);
    }

    #[actix_rt::test]
    async fn unknown_path_uses_error_envelope() {
        let app = app!(MockDatabase::new());

        let response =
            test::call_service(&app, TestRequest::get().uri("/api/v1/nowhere").to_request()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error_code"], "E4041000");
    }

    #[actix_rt::test]
    async fn missing_token_is_unauthorized() {
        let app = app!(MockDatabase::new());

        let response = test::call_service(
            &app,
            TestRequest::get().uri("/api/v1/notifications").to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["error_code"], "E4011000");
    }

    #[actix_rt::test]
    async fn dashboard_requires_admin() {
        let app = app!(MockDatabase::new());

        let response = test::call_service(
            &app,
            TestRequest::get()
                .uri("/api/v1/admin/dashboard")
                .insert_header(bearer(Role::Organizer))
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[actix_rt::test]
    async fn dashboard_renders_for_admin() {
        let mut db = MockDatabase::new();
        db.users.on_count_users = Box::new(|| Ok(2));
        db.events.on_count_events = Box::new(|| Ok(1));
        db.vendors.on_count_vendors = Box::new(|| Ok(0));
        db.orders.on_count_orders = Box::new(|| Ok(0));
        db.tickets.on_fetch_ticket_sales = Box::new(|| Ok(TicketSales::default()));
        db.advertisements.on_count_advertisements = Box::new(|_| Ok(0));
        db.stories.on_count_live_stories = Box::new(|_| Ok(0));
        let app = app!(db);

        let stats: DashboardStats = test::call_and_read_body_json(
            &app,
            TestRequest::get()
                .uri("/api/v1/admin/dashboard")
                .insert_header(bearer(Role::Admin))
                .to_request(),
        )
        .await;

        assert_eq!(stats.users, 2);
        assert_eq!(stats.events, 1);
    }

    #[actix_rt::test]
    async fn click_is_recorded_without_a_token() {
        let advertisement = sample_advertisement(UserId::new());
        let advertisement_id = advertisement.id;

        let mut db = MockDatabase::new();
        db.advertisements.on_fetch_advertisement_by_id =
            Box::new(move |_| Ok(Some(advertisement.clone())));
        db.advertisements.on_update_advertisement = Box::new(Ok);
        let app = app!(db);

        let metrics: MetricsBody = test::call_and_read_body_json(
            &app,
            TestRequest::post()
                .uri(&format!(
                    "/api/v1/advertisements/{}/metrics/click",
                    advertisement_id
                ))
                .to_request(),
        )
        .await;

        assert_eq!(metrics.metrics.clicks, 1);
        assert_eq!(metrics.spent, 0.5);
    }

    #[actix_rt::test]
    async fn malformed_path_id_is_bad_request() {
        let app = app!(MockDatabase::new());

        let response = test::call_service(
            &app,
            TestRequest::get()
                .uri("/api/v1/advertisements/not-an-id")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["error_code"], "E4001001");
    }
}
