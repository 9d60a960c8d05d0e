//! Mini App REST API tests, driven through the router with `oneshot`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Local};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use tower::ServiceExt;

use chistobot::backend::INIT_DATA_HEADER;
use chistobot::booking::AvailabilityRules;
use chistobot::storage::db;
use chistobot::telegram::create_webapp_router;

const BOT_TOKEN: &str = "42:TEST_TOKEN";

fn signed_init_data(bot_token: &str, user_id: i64) -> String {
    type HmacSha256 = Hmac<Sha256>;

    let user = format!(r#"{{"id":{},"first_name":"Вася","username":"vasya"}}"#, user_id);
    let auth_date = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
        .to_string();

    let mut pairs = vec![format!("auth_date={}", auth_date), format!("user={}", user)];
    pairs.sort();
    let data_check_string = pairs.join("\n");

    let mut secret_key_mac = HmacSha256::new_from_slice(b"WebAppData").unwrap();
    secret_key_mac.update(bot_token.as_bytes());
    let secret_key = secret_key_mac.finalize().into_bytes();

    let mut mac = HmacSha256::new_from_slice(&secret_key).unwrap();
    mac.update(data_check_string.as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    format!(
        "user={}&auth_date={}&hash={}",
        urlencoding::encode(&user),
        auth_date,
        hash
    )
}

fn test_router() -> (tempfile::TempDir, axum::Router) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("api.sqlite");
    let pool = Arc::new(db::create_pool(path.to_str().unwrap()).unwrap());
    let router = create_webapp_router(
        pool,
        BOT_TOKEN.to_string(),
        AvailabilityRules {
            cutoff_hour: 20,
            horizon_days: Some(30),
        },
    );
    (dir, router)
}

fn get(uri: &str, init_data: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(data) = init_data {
        builder = builder.header(INIT_DATA_HEADER, data);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, init_data: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(INIT_DATA_HEADER, init_data)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn bookable_date(days_ahead: i64, hour: u32) -> String {
    (Local::now().date_naive() + Duration::days(days_ahead))
        .and_hms_opt(hour, 0, 0)
        .unwrap()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

#[tokio::test]
async fn missing_init_data_is_unauthorized() {
    let (_dir, router) = test_router();
    let response = router.oneshot(get("/api/cleanings", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tampered_init_data_is_unauthorized() {
    let (_dir, router) = test_router();
    let forged = signed_init_data("43:WRONG_TOKEN", 7);
    let response = router
        .oneshot(get("/api/cleanings", Some(&forged)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tariff_catalog_is_served() {
    let (_dir, router) = test_router();
    let auth = signed_init_data(BOT_TOKEN, 7);

    let response = router
        .clone()
        .oneshot(get("/api/tariffs", Some(&auth)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tariffs = body_json(response).await;
    assert_eq!(tariffs.as_array().unwrap().len(), 3);

    let response = router
        .clone()
        .oneshot(get("/api/tariffs/premium", Some(&auth)))
        .await
        .unwrap();
    let premium = body_json(response).await;
    assert_eq!(premium["monthlyPrice"], 9900);

    let response = router
        .oneshot(get("/api/tariffs/vip", Some(&auth)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn schedule_then_list_roundtrip() {
    let (_dir, router) = test_router();
    let auth = signed_init_data(BOT_TOKEN, 8);

    let response = router
        .clone()
        .oneshot(post(
            "/api/cleanings/schedule",
            &auth,
            json!({ "date": bookable_date(3, 10), "time": "10:00", "tariffId": "standard" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["cleaning"]["status"], "scheduled");

    let response = router
        .oneshot(get("/api/cleanings", Some(&auth)))
        .await
        .unwrap();
    let cleanings = body_json(response).await;
    assert_eq!(cleanings.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cleanings_are_scoped_to_the_caller() {
    let (_dir, router) = test_router();
    let first = signed_init_data(BOT_TOKEN, 10);
    let second = signed_init_data(BOT_TOKEN, 11);

    router
        .clone()
        .oneshot(post(
            "/api/cleanings/schedule",
            &first,
            json!({ "date": bookable_date(3, 10), "time": "10:00", "tariffId": "light" }),
        ))
        .await
        .unwrap();

    let response = router
        .oneshot(get("/api/cleanings", Some(&second)))
        .await
        .unwrap();
    let cleanings = body_json(response).await;
    assert!(cleanings.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unavailable_dates_are_rejected_server_side() {
    let (_dir, router) = test_router();
    let auth = signed_init_data(BOT_TOKEN, 9);

    // Today is always behind the minimum lead time
    let response = router
        .clone()
        .oneshot(post(
            "/api/cleanings/schedule",
            &auth,
            json!({ "date": bookable_date(0, 10), "time": "10:00", "tariffId": "standard" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());

    // Off-grid time slot
    let off_grid = (Local::now().date_naive() + Duration::days(3))
        .and_hms_opt(10, 30, 0)
        .unwrap()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();
    let response = router
        .clone()
        .oneshot(post(
            "/api/cleanings/schedule",
            &auth,
            json!({ "date": off_grid, "time": "10:30", "tariffId": "standard" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Double booking the same date
    router
        .clone()
        .oneshot(post(
            "/api/cleanings/schedule",
            &auth,
            json!({ "date": bookable_date(4, 10), "time": "10:00", "tariffId": "standard" }),
        ))
        .await
        .unwrap();
    let response = router
        .oneshot(post(
            "/api/cleanings/schedule",
            &auth,
            json!({ "date": bookable_date(4, 11), "time": "11:00", "tariffId": "standard" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancel_and_reschedule_lifecycle() {
    let (_dir, router) = test_router();
    let auth = signed_init_data(BOT_TOKEN, 12);

    let response = router
        .clone()
        .oneshot(post(
            "/api/cleanings/schedule",
            &auth,
            json!({ "date": bookable_date(3, 10), "time": "10:00", "tariffId": "premium" }),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["cleaning"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Move it
    let response = router
        .clone()
        .oneshot(post(
            &format!("/api/cleanings/{}/reschedule", id),
            &auth,
            json!({ "date": bookable_date(7, 14), "time": "14:00" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["cleaning"]["scheduledAt"]
        .as_str()
        .unwrap()
        .ends_with("T14:00:00"));

    // Cancel it
    let response = router
        .clone()
        .oneshot(post(&format!("/api/cleanings/{}/cancel", id), &auth, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A second cancel hits a non-scheduled record
    let response = router
        .oneshot(post(&format!("/api/cleanings/{}/cancel", id), &auth, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bot_minted_credentials_pass_authentication() {
    // The chat surface signs its own init data with the bot token when it
    // talks to a remote backend; the API must accept it like any Mini App
    // request.
    let (_dir, router) = test_router();
    let user = chistobot::telegram::webapp_auth::WebAppUser {
        id: 77,
        first_name: Some("Вася".to_string()),
        username: Some("vasya".to_string()),
    };
    let auth = chistobot::telegram::webapp_auth::sign_init_data(BOT_TOKEN, &user).unwrap();

    let response = router
        .clone()
        .oneshot(get("/api/cleanings", Some(&auth)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(get("/api/user/me", Some(&auth)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], 77);
}

#[tokio::test]
async fn user_me_reflects_init_data() {
    let (_dir, router) = test_router();
    let auth = signed_init_data(BOT_TOKEN, 123456789);

    let response = router
        .oneshot(get("/api/user/me", Some(&auth)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], 123456789);
    assert_eq!(body["firstName"], "Вася");
    assert_eq!(body["username"], "vasya");
}

#[tokio::test]
async fn health_needs_no_auth() {
    let (_dir, router) = test_router();
    let response = router.oneshot(get("/api/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
