//! End-to-end flows against a real Postgres. Run with
//! `TEST_DATABASE_URL=... cargo test -- --ignored`.

mod common;

use common::{booking_body, lead_body, stripe_config, stripe_signature, test_config, TestApp};
use serde_json::{json, Value};
use serial_test::serial;
use tokio_test::assert_ok;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
#[ignore = "requires a Postgres instance at TEST_DATABASE_URL"]
#[serial]
async fn lead_is_stored_and_forwarded() {
    let app = TestApp::spawn().await;
    app.cleanup().await;

    let response = app.post_json("/api/leads", &lead_body("ana@example.com")).await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    let lead_id = body["lead"]["id"].as_str().unwrap().to_string();

    // Visitor confirmation plus admin alert.
    app.wait_for_emails(2).await;
    let recipients: Vec<String> = app.email.sent().into_iter().map(|m| m.to).collect();
    assert!(recipients.contains(&"ana@example.com".to_string()));
    assert!(recipients.contains(&"admin@example.com".to_string()));

    let listed: Value = app
        .admin_get("/api/admin/leads?interest_type=villa")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["leads"][0]["email"], "ana@example.com");
    assert_eq!(listed["leads"][0]["tags"], json!(["vip", "family"]));

    let single = app.admin_get(&format!("/api/admin/leads/{}", lead_id)).await;
    assert_eq!(single.status().as_u16(), 200);
}

#[tokio::test]
#[ignore = "requires a Postgres instance at TEST_DATABASE_URL"]
#[serial]
async fn booking_is_created_pending_and_readable() {
    let app = TestApp::spawn().await;
    app.cleanup().await;

    let mut request = booking_body("maria@example.com");
    request["paymentStatus"] = json!("confirmed");
    let response = app.post_json("/api/bookings", &request).await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["booking"]["status"], "pending");

    let id = body["booking"]["id"].as_str().unwrap();
    let fetched: Value = app
        .client
        .get(app.url(&format!("/api/bookings/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["booking"]["email"], "maria@example.com");
    assert_eq!(fetched["booking"]["listing_id"], "42");

    let missing = app
        .client
        .get(app.url(&format!("/api/bookings/{}", uuid::Uuid::new_v4())))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    let bad_filter = app.admin_get("/api/admin/bookings?status=maybe").await;
    assert_eq!(bad_filter.status().as_u16(), 400);
}

#[tokio::test]
#[ignore = "requires a Postgres instance at TEST_DATABASE_URL"]
#[serial]
async fn guide_submission_returns_download_link() {
    let app = TestApp::spawn().await;
    app.cleanup().await;

    let response = app
        .post_json(
            "/api/guide-submissions",
            &json!({
                "firstName": "Lee",
                "email": "lee@example.com",
                "interestAreas": ["fishing", "golf"]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert!(body["download_url"].as_str().unwrap().ends_with(".pdf"));
    assert!(body["submission_id"].as_str().is_some());

    let listed: Value = app
        .admin_get("/api/admin/guide-submissions")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed["count"], 1);
}

#[tokio::test]
#[ignore = "requires a Postgres instance at TEST_DATABASE_URL"]
#[serial]
async fn stripe_success_confirms_the_booking_once() {
    let stripe = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .and(header_exists("idempotency-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_e2e",
            "client_secret": "pi_e2e_secret",
            "amount": 250000,
            "currency": "usd",
            "status": "requires_payment_method"
        })))
        .expect(1)
        .mount(&stripe)
        .await;

    let mut config = test_config();
    config.stripe = stripe_config(&stripe.uri());
    let app = TestApp::spawn_with(config).await;
    app.cleanup().await;

    let response = app
        .post_json(
            "/api/create-payment-intent",
            &json!({ "amount": 250000, "bookingData": booking_body("pay@example.com") }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["client_secret"], "pi_e2e_secret");
    let booking_id = body["booking_id"].as_str().unwrap().to_string();

    let event = json!({
        "id": "evt_e2e_1",
        "type": "payment_intent.succeeded",
        "data": { "object": { "object": "payment_intent", "id": "pi_e2e", "amount": 250000 } }
    })
    .to_string();

    for _ in 0..2 {
        let response = app
            .client
            .post(app.url("/api/stripe-webhook"))
            .header("stripe-signature", stripe_signature(event.as_bytes()))
            .header("content-type", "application/json")
            .body(event.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let ack: Value = response.json().await.unwrap();
        assert_eq!(ack["received"], true);
    }

    let booking = assert_ok!(app.db.get_booking(booking_id.parse().unwrap()).await)
        .expect("booking should exist");
    assert_eq!(booking.status.as_str(), "confirmed");

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM payment_events WHERE stripe_event_id = 'evt_e2e_1'")
            .fetch_one(app.db.pool())
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore = "requires a Postgres instance at TEST_DATABASE_URL"]
#[serial]
async fn registered_webhook_receives_events_and_is_logged() {
    let target = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/make"))
        .and(header_exists("x-cabo-event"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Accepted"))
        .expect(1)
        .mount(&target)
        .await;

    let app = TestApp::spawn().await;
    app.cleanup().await;

    let setup = app
        .admin_post(
            "/api/webhooks/setup",
            &json!({
                "name": "Lead scenario",
                "url": format!("{}/make", target.uri()),
                "events": ["lead.created"]
            }),
        )
        .await;
    assert_eq!(setup.status().as_u16(), 200);
    let setup: Value = setup.json().await.unwrap();
    assert_eq!(setup["webhook"]["name"], "Lead scenario");

    let response = app.post_json("/api/leads", &lead_body("hook@example.com")).await;
    assert_eq!(response.status().as_u16(), 201);

    let mut deliveries = Value::Null;
    for _ in 0..50 {
        deliveries = app
            .admin_get("/api/admin/webhook-deliveries?event_type=lead.created")
            .await
            .json()
            .await
            .unwrap();
        if deliveries["count"] == 1 {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }
    assert_eq!(deliveries["count"], 1);
    assert_eq!(deliveries["deliveries"][0]["success"], true);
    assert_eq!(deliveries["deliveries"][0]["payload"]["event_type"], "lead.created");
    assert_eq!(deliveries["deliveries"][0]["payload"]["email"], "hook@example.com");
}

#[tokio::test]
#[ignore = "requires a Postgres instance at TEST_DATABASE_URL"]
#[serial]
async fn test_notifications_only_email_the_admin() {
    let app = TestApp::spawn().await;
    app.cleanup().await;

    let response = app.admin_post("/api/notifications/test-all", &json!({})).await;
    assert_eq!(response.status().as_u16(), 200);

    assert_eq!(app.email.send_count(), 4);
    assert!(app.email.sent().iter().all(|m| m.to == "admin@example.com"));

    let (leads,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leads")
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(leads, 0);
}
