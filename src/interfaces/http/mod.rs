//! actix-web surface over the booking orchestrator.

pub mod dto;
pub mod error;
pub mod handlers;

use crate::error::BookingError;
use actix_web::web;

/// Registers every route under `/api`. Malformed JSON, query strings and
/// path ids are reported as `ValidationFailed` like any other bad input.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        BookingError::ValidationFailed(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        BookingError::ValidationFailed(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        BookingError::ValidationFailed(err.to_string()).into()
    }))
    .service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/bookings")
                    .route("", web::get().to(handlers::list_bookings))
                    .route("", web::post().to(handlers::create_booking))
                    .route("/{id}", web::get().to(handlers::get_booking))
                    .route("/{id}", web::put().to(handlers::update_booking)),
            )
            .route(
                "/stripe/paymentIntent",
                web::post().to(handlers::create_payment_intent),
            )
            .route(
                "/expertise-posts/{id}/quote",
                web::get().to(handlers::quote),
            ),
    );
}
