//! Booking API handlers

use super::dto::{
    BookingResponse, CreateBookingRequest, CreateBookingResponse, ListBookingsQuery,
    ListBookingsResponse, PaymentIntentRequest, PaymentIntentResponse, UpdateBookingRequest,
};
use crate::application::orchestrator::BookingOrchestrator;
use crate::error::BookingError;
use actix_web::{HttpResponse, web};
use tracing::{debug, instrument};
use uuid::Uuid;

type Orchestrator = web::Data<BookingOrchestrator>;

/// GET /api/health
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/bookings
#[instrument(skip(orchestrator, query))]
pub async fn list_bookings(
    orchestrator: Orchestrator,
    query: web::Query<ListBookingsQuery>,
) -> Result<HttpResponse, BookingError> {
    let (filter, page) = query.into_inner().into_filter()?;
    debug!(page, "Listing bookings");

    let result = orchestrator.list_bookings(filter, page).await?;
    Ok(HttpResponse::Ok().json(ListBookingsResponse::new(
        result,
        orchestrator.res_per_page(),
    )))
}

/// POST /api/bookings
#[instrument(skip(orchestrator, body))]
pub async fn create_booking(
    orchestrator: Orchestrator,
    body: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse, BookingError> {
    let command = body.into_inner().into_command()?;
    let created = orchestrator.create_booking(command).await?;
    Ok(HttpResponse::Created().json(CreateBookingResponse::from(created)))
}

/// GET /api/bookings/{id}
#[instrument(skip(orchestrator))]
pub async fn get_booking(
    orchestrator: Orchestrator,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, BookingError> {
    let booking = orchestrator.get_booking(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(BookingResponse {
        booking,
        customer_notified: None,
    }))
}

/// PUT /api/bookings/{id}
#[instrument(skip(orchestrator, body))]
pub async fn update_booking(
    orchestrator: Orchestrator,
    path: web::Path<Uuid>,
    body: web::Json<UpdateBookingRequest>,
) -> Result<HttpResponse, BookingError> {
    let command = body.into_inner().into_command(path.into_inner())?;
    let updated = orchestrator.update_booking(command).await?;
    Ok(HttpResponse::Ok().json(BookingResponse {
        booking: updated.booking,
        customer_notified: updated.customer_notified,
    }))
}

/// POST /api/stripe/paymentIntent
#[instrument(skip(orchestrator, body))]
pub async fn create_payment_intent(
    orchestrator: Orchestrator,
    body: web::Json<PaymentIntentRequest>,
) -> Result<HttpResponse, BookingError> {
    let command = body.into_inner().into_command()?;
    let authorized = orchestrator.authorize_payment(command).await?;
    Ok(HttpResponse::Ok().json(PaymentIntentResponse::from(authorized)))
}

/// GET /api/expertise-posts/{id}/quote
#[instrument(skip(orchestrator))]
pub async fn quote(
    orchestrator: Orchestrator,
    path: web::Path<String>,
) -> Result<HttpResponse, BookingError> {
    let quote = orchestrator.quote(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(quote))
}
