mod common;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use advice_escrow::interfaces::http;
use common::Fixture;
use serde_json::{Value, json};

macro_rules! app {
    ($fx:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::from($fx.orchestrator.clone()))
                .configure(http::configure),
        )
        .await
    };
}

fn create_body() -> Value {
    json!({
        "bookingType": "SINGLE_TEXT_RESPONSE",
        "expertisePostId": "post_1",
        "expertId": "exp_1",
        "customerId": "cus_1",
        "status": "PENDING_RESPONSE",
        "customerSubmission": "How do I write a borrow checker?"
    })
}

#[actix_web::test]
async fn test_health() {
    let fx = Fixture::new();
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn test_quote_endpoint() {
    let fx = Fixture::new();
    let app = app!(fx);

    let req = test::TestRequest::get()
        .uri("/api/expertise-posts/post_3/quote")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["pricePerSubmission"], "19.99");
    assert_eq!(body["serviceFee"], "0.88");
    assert_eq!(body["total"], "20.87");
}

#[actix_web::test]
async fn test_create_then_fulfil_booking() {
    let fx = Fixture::new();
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .set_json(create_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["success"], true);
    assert_eq!(created["stripePaymentIntentId"], "ph_1");
    let id = created["bookingId"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{id}"))
        .set_json(json!({
            "_id": id,
            "bookingType": "SINGLE_TEXT_RESPONSE",
            "expert": { "_id": "exp_1", "name": "Ada" },
            "customer": "cus_1",
            "expertisePost": "post_1",
            "status": "COMPLETED",
            "singleTextResponse": { "expertResponse": "Start with lifetimes." },
            "stripePaymentIntentId": "ph_1",
            "chargePaymentIntent": true
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["booking"]["status"], "COMPLETED");
    assert_eq!(
        updated["booking"]["singleTextResponse"]["expertResponse"],
        "Start with lifetimes."
    );
    assert_eq!(updated["customerNotified"], true);
}

#[actix_web::test]
async fn test_failed_capture_maps_to_conflict() {
    let fx = Fixture::new();
    let app = app!(fx);
    let booking = fx.create("Q").await;
    fx.gateway.fail_next_captures(1).await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{}", booking.id))
        .set_json(json!({
            "singleTextResponse": { "expertResponse": "A" },
            "chargePaymentIntent": true
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "capture_failed");
    assert_eq!(body["retryable"], true);
}

#[actix_web::test]
async fn test_processor_outage_before_capture_maps_to_conflict() {
    let fx = Fixture::new();
    let app = app!(fx);
    let booking = fx.create("Q").await;
    fx.gateway.fail_next_retrievals(1).await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookings/{}", booking.id))
        .set_json(json!({
            "singleTextResponse": { "expertResponse": "A" },
            "chargePaymentIntent": true
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "capture_failed");
}

#[actix_web::test]
async fn test_malformed_body_is_bad_request() {
    let fx = Fixture::new();
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .set_json(json!({ "bookingType": "VIDEO_CALL" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["retryable"], false);
}

#[actix_web::test]
async fn test_oversized_submission_is_rejected() {
    let fx = Fixture::new();
    let app = app!(fx);

    let mut body = create_body();
    body["customerSubmission"] = json!("x".repeat(5001));
    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fx.gateway.authorize_calls().await, 0);
}

#[actix_web::test]
async fn test_unknown_booking_is_not_found() {
    let fx = Fixture::new();
    let app = app!(fx);

    let req = test::TestRequest::get()
        .uri(&format!("/api/bookings/{}", uuid::Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_payment_intent_rejects_tampered_total() {
    let fx = Fixture::new();
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/stripe/paymentIntent")
        .set_json(json!({
            "total": 0.5,
            "serviceFee": 1.75,
            "bookingType": "SINGLE_TEXT_RESPONSE",
            "expertisePostId": "post_1",
            "expertId": "exp_1",
            "customerId": "cus_1",
            "status": "PENDING_RESPONSE",
            "expertStripeId": "acct_ada"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fx.gateway.authorize_calls().await, 0);
}

#[actix_web::test]
async fn test_payment_intent_returns_client_secret() {
    let fx = Fixture::new();
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/stripe/paymentIntent")
        .set_json(json!({
            "total": "51.75",
            "serviceFee": "1.75",
            "bookingType": "SINGLE_TEXT_RESPONSE",
            "expertisePostId": "post_1",
            "expertId": "exp_1",
            "customerId": "cus_1"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["clientSecret"], "ph_1_secret");
    assert_eq!(body["total"], "51.75");
}

#[actix_web::test]
async fn test_list_bookings_reports_counts() {
    let fx = Fixture::new();
    let app = app!(fx);
    fx.create("Parsing").await;
    fx.create("Typing").await;

    let req = test::TestRequest::get()
        .uri("/api/bookings?keyword=pars&status=PENDING_RESPONSE&page=1")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["bookingsCount"], 2);
    assert_eq!(body["filteredBookingsCount"], 1);
    assert_eq!(body["resPerPage"], 20);
    assert_eq!(body["bookings"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_invalid_page_is_bad_request() {
    let fx = Fixture::new();
    let app = app!(fx);

    let req = test::TestRequest::get()
        .uri("/api/bookings?page=0")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
