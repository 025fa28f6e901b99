use awc::http::StatusCode;
use awc::Client;
use chrono::{Duration, Utc};
use eventhub::advertisement::{AdvertisementBody, AdvertisementStatus, MetricsBody};
use eventhub::auth::{RegisterBody, TokenBody};
use eventhub::config::Config;
use eventhub::user::Role;
use serde_json::json;

const BASE: &str = "http://127.0.0.1:8089/api/v1";

fn spawn_server() {
    let config = Config::from_lookup(|key| match key {
        "PORT" => Some("8089".into()),
        "MONGODB_DATABASE" => Some("eventhub_api_test".into()),
        "JWT_SECRET" => Some("api-test-secret".into()),
        "SEED_DATABASE" => Some("true".into()),
        _ => None,
    })
    .unwrap();

    let _ = std::thread::spawn(move || actix_web::rt::System::new().block_on(eventhub::run(config)));
    std::thread::sleep(std::time::Duration::from_secs(2));
}

// needs a mongodb at localhost:27017
#[actix_rt::test]
#[ignore]
async fn clicks_spend_the_budget_until_the_ad_completes() {
    spawn_server();
    let client = Client::default();

    let register = RegisterBody {
        name: "Vic Vendor".into(),
        email: "vic@example.com".into(),
        password: "correct horse battery".into(),
        role: Some(Role::Vendor),
    };
    let token: TokenBody = client
        .post(format!("{}/auth/register", BASE))
        .send_json(&register)
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let now = Utc::now();
    let advertisement: AdvertisementBody = client
        .post(format!("{}/advertisements", BASE))
        .bearer_auth(&token.token)
        .send_json(&json!({
            "title": "Churros at gate B",
            "content": { "media_type": "image", "url": "https://cdn.example.com/churros.jpg" },
            "schedule": {
                "start_date": now - Duration::hours(1),
                "end_date": now + Duration::days(1),
            },
            "budget": { "total": 1.0, "currency": "eur", "cost_per_click": 0.5 },
            "status": "active",
        }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(advertisement.status, AdvertisementStatus::Active);
    assert_eq!(advertisement.budget.currency, "EUR");

    let click_url = format!("{}/advertisements/{}/metrics/click", BASE, advertisement.id);
    let mut metrics = None;
    for _ in 0..2 {
        let body: MetricsBody = client
            .post(&click_url)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        metrics = Some(body);
    }

    let metrics = metrics.unwrap();
    assert_eq!(metrics.metrics.clicks, 2);
    assert_eq!(metrics.spent, 1.0);
    assert_eq!(metrics.status, AdvertisementStatus::Completed);

    let response = client.post(&click_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
