//! Router behavior that is decided before any query runs.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{router_without_db, stripe_config, stripe_signature, test_config, ADMIN_TOKEN};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body was not JSON")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn unknown_api_route_returns_json_404() {
    let router = router_without_db(test_config());

    let response = router
        .oneshot(Request::get("/api/does-not-exist").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("/api/does-not-exist"));
}

#[tokio::test]
async fn malformed_lead_email_is_422_with_details() {
    let router = router_without_db(test_config());

    let response = router
        .oneshot(post_json(
            "/api/leads",
            &json!({ "firstName": "Ana", "email": "ana-at-example" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Validation error");
    assert!(body["details"]["email"].is_array());
}

#[tokio::test]
async fn booking_ending_before_it_starts_is_422() {
    let router = router_without_db(test_config());
    let mut booking = common::booking_body("maria@example.com");
    booking["endDate"] = json!("2030-03-01");

    let response = router
        .oneshot(post_json("/api/bookings", &booking))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(response).await;
    assert!(body["details"].to_string().contains("End date must not be before start date"));
}

#[tokio::test]
async fn malformed_booking_date_is_422_json() {
    let router = router_without_db(test_config());
    let mut booking = common::booking_body("maria@example.com");
    booking["startDate"] = json!("03/10/2030");

    let response = router
        .oneshot(post_json("/api/bookings", &booking))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("application/json"), "{content_type}");
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Validation error");
    assert!(body["details"]["body"][0]["message"]
        .as_str()
        .unwrap()
        .contains("startDate"));
}

#[tokio::test]
async fn whitespace_only_lead_name_is_422() {
    let router = router_without_db(test_config());
    let mut lead = common::lead_body("ana@example.com");
    lead["firstName"] = json!("   ");

    let response = router.oneshot(post_json("/api/leads", &lead)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(response).await;
    assert!(body["details"]["first_name"].is_array());
}

#[tokio::test]
async fn lead_without_json_content_type_is_400_json() {
    let router = router_without_db(test_config());

    let response = router
        .oneshot(
            Request::post("/api/leads")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from(common::lead_body("ana@example.com").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn admin_routes_require_the_bearer_token() {
    let router = router_without_db(test_config());

    let missing = router
        .clone()
        .oneshot(Request::get("/api/admin/leads").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = router
        .oneshot(
            Request::get("/api/admin/leads")
                .header(header::AUTHORIZATION, "Bearer not-the-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_routes_are_closed_without_a_configured_token() {
    let mut config = test_config();
    config.admin.api_token = None;
    let router = router_without_db(config);

    let response = router
        .oneshot(
            Request::post("/api/webhooks/setup")
                .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_TOKEN))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn stripe_webhook_without_signature_is_400() {
    let mut config = test_config();
    config.stripe = stripe_config("http://127.0.0.1:9");
    let router = router_without_db(config);

    let response = router
        .oneshot(post_json("/api/stripe-webhook", &json!({ "id": "evt_1" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stripe_webhook_with_forged_signature_is_400() {
    let mut config = test_config();
    config.stripe = stripe_config("http://127.0.0.1:9");
    let router = router_without_db(config);

    let signed = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{}}}"#;
    let signature = stripe_signature(signed);
    let tampered = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"amount":1}}}"#;

    let response = router
        .oneshot(
            Request::post("/api/stripe-webhook")
                .header("stripe-signature", signature)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(tampered.to_vec()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn payment_intent_is_503_when_stripe_is_not_configured() {
    let router = router_without_db(test_config());

    let response = router
        .oneshot(post_json("/api/create-payment-intent", &json!({ "amount": 5000 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn payment_intent_rejects_zero_amount() {
    let mut config = test_config();
    config.stripe = stripe_config("http://127.0.0.1:9");
    let router = router_without_db(config);

    let response = router
        .oneshot(post_json("/api/create-payment-intent", &json!({ "amount": 0 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn payment_intent_without_booking_returns_client_secret() {
    let stripe = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .and(body_string_contains("amount=12500"))
        .and(body_string_contains("Sunset+Sail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_123",
            "client_secret": "pi_123_secret_abc",
            "amount": 12500,
            "currency": "usd",
            "status": "requires_payment_method"
        })))
        .expect(1)
        .mount(&stripe)
        .await;

    let mut config = test_config();
    config.stripe = stripe_config(&stripe.uri());
    let router = router_without_db(config);

    let response = router
        .oneshot(post_json(
            "/api/create-payment-intent",
            &json!({ "amount": 12500, "description": "Sunset Sail" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["client_secret"], "pi_123_secret_abc");
    assert!(body["booking_id"].is_null());
}

#[tokio::test]
async fn payment_intent_provider_error_is_502() {
    let stripe = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": { "message": "Your card was declined." }
        })))
        .mount(&stripe)
        .await;

    let mut config = test_config();
    config.stripe = stripe_config(&stripe.uri());
    let router = router_without_db(config);

    let response = router
        .oneshot(post_json("/api/create-payment-intent", &json!({ "amount": 100 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn known_crawlers_cannot_submit_forms() {
    let router = router_without_db(test_config());

    let response = router
        .oneshot(
            Request::post("/api/leads")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::USER_AGENT, "Googlebot/2.1 (+http://www.google.com/bot.html)")
                .body(Body::from(common::lead_body("bot@example.com").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
