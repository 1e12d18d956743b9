//! Booking handlers: reservation, re-initiation, listings, cancellation.
//!
//! ```text
//! POST /api/v1/bookings
//! POST /api/v1/bookings/{bookingId}/pay
//! POST /api/v1/bookings/cancel
//! GET  /api/v1/bookings
//! GET  /api/v1/bookings/all
//! ```

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::ports::{CancelRequester, ReservedSlot};
use crate::domain::{
    BookingOverview, Error, Money, ReservationOutcome, UserBookingsSummary,
};
use crate::inbound::http::identity::Identity;
use crate::inbound::http::slots::parse_date;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::ApiResult;

/// Request body for creating a booking.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingBody {
    /// Date being booked, ISO format.
    #[schema(example = "2025-10-12")]
    pub date: String,
    /// Requested start times.
    #[schema(example = json!(["09:00", "10:00"]))]
    pub start_times: Vec<String>,
}

/// One claimed slot in a reservation response.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservedSlotView {
    /// Persisted slot row.
    #[schema(format = "uuid")]
    pub slot_id: Uuid,
    /// Interval start.
    #[schema(example = "09:00")]
    pub start_time: String,
    /// Interval end.
    #[schema(example = "10:00")]
    pub end_time: String,
    /// Price at claim time, major units.
    #[schema(value_type = i64)]
    pub amount: Money,
}

impl From<ReservedSlot> for ReservedSlotView {
    fn from(slot: ReservedSlot) -> Self {
        Self {
            slot_id: slot.id,
            start_time: slot.start_time.to_string(),
            end_time: slot.end_time.to_string(),
            amount: slot.amount,
        }
    }
}

/// Response body for a created booking.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingResponse {
    /// Outcome summary.
    #[schema(example = "Booking created, payment pending")]
    pub message: String,
    /// Client-facing booking id.
    #[schema(format = "uuid")]
    pub booking_id: Uuid,
    /// Sum of claimed slot amounts, major units.
    #[schema(value_type = i64, example = 20000)]
    pub total_amount: Money,
    /// The claimed slots.
    pub slots: Vec<ReservedSlotView>,
    /// Gateway checkout URL, absent when initiation failed.
    pub payment_url: Option<String>,
    /// Gateway reference, absent when initiation failed.
    pub payment_ref: Option<String>,
}

impl From<ReservationOutcome> for CreateBookingResponse {
    fn from(outcome: ReservationOutcome) -> Self {
        Self {
            message: "Booking created, payment pending".to_owned(),
            booking_id: outcome.booking_id,
            total_amount: outcome.total_amount,
            slots: outcome.slots.into_iter().map(Into::into).collect(),
            payment_url: outcome.payment_url,
            payment_ref: outcome.payment_ref,
        }
    }
}

/// Response body for a payment re-initiation.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    /// Outcome summary.
    pub message: String,
    /// Gateway checkout URL.
    pub payment_url: String,
    /// Gateway reference.
    pub reference: String,
}

/// Request body for cancelling bookings.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingsBody {
    /// Bookings to cancel.
    #[schema(value_type = Vec<uuid::Uuid>)]
    pub booking_ids: Vec<String>,
}

/// Response body for a cancellation batch.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingsResponse {
    /// Bookings affected.
    pub affected: usize,
    /// Outcome summary.
    #[schema(example = "2 booking(s) cancelled successfully")]
    pub message: String,
}

fn parse_booking_ids(raw: &[String]) -> Result<Vec<Uuid>, Error> {
    raw.iter()
        .map(|value| {
            Uuid::parse_str(value)
                .map_err(|_| Error::invalid_request(format!("Invalid booking id {value:?}")))
        })
        .collect()
}

/// Create a booking and kick off payment.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    request_body = CreateBookingBody,
    responses(
        (status = 200, description = "Booking created, payment pending", body = CreateBookingResponse),
        (status = 400, description = "Invalid request", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 401, description = "Unauthorized", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 409, description = "Requested slots unavailable", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["bookings"],
    operation_id = "createBooking",
    security(("SessionCookie" = []))
)]
#[post("/bookings")]
pub async fn create_booking(
    state: web::Data<HttpState>,
    identity: Identity,
    body: web::Json<CreateBookingBody>,
) -> ApiResult<web::Json<CreateBookingResponse>> {
    let body = body.into_inner();
    let date = parse_date(&body.date)?;
    let outcome = state
        .reservations
        .reserve(identity.user_id, date, &body.start_times, &identity.email)
        .await?;
    Ok(web::Json(outcome.into()))
}

/// Re-initiate payment for an existing pending booking.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{bookingId}/pay",
    responses(
        (status = 200, description = "Payment initiated", body = InitiatePaymentResponse),
        (status = 400, description = "Booking already paid", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 404, description = "Unknown booking", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 502, description = "Gateway failure", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["bookings"],
    operation_id = "initiatePayment",
    security(("SessionCookie" = []))
)]
#[post("/bookings/{booking_id}/pay")]
pub async fn initiate_payment(
    state: web::Data<HttpState>,
    identity: Identity,
    path: web::Path<String>,
) -> ApiResult<web::Json<InitiatePaymentResponse>> {
    let booking_id = Uuid::parse_str(&path.into_inner())
        .map_err(|_| Error::invalid_request("Invalid booking id"))?;
    let authorization = state.payments.initiate(booking_id, &identity.email).await?;
    Ok(web::Json(InitiatePaymentResponse {
        message: "Payment initiated successfully".to_owned(),
        payment_url: authorization.authorization_url,
        reference: authorization.reference,
    }))
}

/// Cancel a batch of bookings.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/cancel",
    request_body = CancelBookingsBody,
    responses(
        (status = 200, description = "Batch cancelled", body = CancelBookingsResponse),
        (status = 400, description = "Batch rejected", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 403, description = "Foreign booking in batch", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["bookings"],
    operation_id = "cancelBookings",
    security(("SessionCookie" = []))
)]
#[post("/bookings/cancel")]
pub async fn cancel_bookings(
    state: web::Data<HttpState>,
    identity: Identity,
    body: web::Json<CancelBookingsBody>,
) -> ApiResult<web::Json<CancelBookingsResponse>> {
    let ids = parse_booking_ids(&body.booking_ids)?;
    let result = state
        .bookings
        .cancel(
            &ids,
            CancelRequester {
                user_id: identity.user_id,
                is_admin: identity.is_admin,
            },
        )
        .await?;
    let verb = if result.deleted { "deleted" } else { "cancelled" };
    Ok(web::Json(CancelBookingsResponse {
        affected: result.affected,
        message: format!("{} booking(s) {verb} successfully", result.affected),
    }))
}

/// The caller's booking history.
#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    responses(
        (status = 200, description = "Grouped booking history", body = Object),
        (status = 401, description = "Unauthorized", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["bookings"],
    operation_id = "getUserBookings",
    security(("SessionCookie" = []))
)]
#[get("/bookings")]
pub async fn get_user_bookings(
    state: web::Data<HttpState>,
    identity: Identity,
) -> ApiResult<web::Json<UserBookingsSummary>> {
    Ok(web::Json(
        state.bookings.user_bookings(identity.user_id).await?,
    ))
}

/// Every booking with payment and ticket state (admin).
#[utoipa::path(
    get,
    path = "/api/v1/bookings/all",
    responses(
        (status = 200, description = "All bookings, newest first", body = Object),
        (status = 403, description = "Admin role required", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["bookings"],
    operation_id = "getAllBookings",
    security(("SessionCookie" = []))
)]
#[get("/bookings/all")]
pub async fn get_all_bookings(
    state: web::Data<HttpState>,
    identity: Identity,
) -> ApiResult<web::Json<Vec<BookingOverview>>> {
    identity.require_admin()?;
    Ok(web::Json(state.bookings.all_bookings().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn booking_ids_parse_or_reject() {
        let valid = vec![Uuid::new_v4().to_string(), Uuid::new_v4().to_string()];
        assert_eq!(parse_booking_ids(&valid).expect("ids parse").len(), 2);
        assert!(parse_booking_ids(&["not-a-uuid".to_owned()]).is_err());
    }

    #[rstest]
    fn reservation_outcome_maps_to_response() {
        let outcome = ReservationOutcome {
            booking_id: Uuid::new_v4(),
            total_amount: Money::new(20000),
            slots: vec![],
            payment_url: None,
            payment_ref: None,
        };
        let response = CreateBookingResponse::from(outcome);
        assert!(response.payment_url.is_none());
        assert_eq!(response.total_amount, Money::new(20000));
    }
}
