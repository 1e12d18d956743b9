//! Payment verification handlers and the gateway webhook receiver.
//!
//! ```text
//! POST /api/v1/payments/verify
//! GET  /api/v1/payments/callback?reference=...
//! POST /api/v1/payments/webhook
//! ```

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{Money, VerifyOutcome};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::ApiResult;
use crate::outbound::paystack::dto::WebhookEventDto;
use crate::outbound::paystack::verify_signature;

const SIGNATURE_HEADER: &str = "x-paystack-signature";
const CHARGE_SUCCESS_EVENT: &str = "charge.success";

/// Request body for polled verification.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentBody {
    /// Gateway reference handed out at initiation.
    pub reference: String,
}

/// Query parameters for the gateway redirect callback.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct CallbackQuery {
    /// Gateway reference handed out at initiation.
    pub reference: String,
}

/// One confirmed slot in a verification response.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedSlotView {
    /// Calendar date.
    pub date: chrono::NaiveDate,
    /// Interval start.
    #[schema(example = "09:00")]
    pub start_time: String,
    /// Interval end.
    #[schema(example = "10:00")]
    pub end_time: String,
    /// Slot status after confirmation.
    #[schema(example = "booked")]
    pub status: String,
}

/// Response body for a verified payment.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    /// Outcome summary.
    #[schema(example = "Payment verified and booking confirmed successfully")]
    pub message: String,
    /// The confirmed booking.
    #[schema(format = "uuid")]
    pub booking_id: Uuid,
    /// Confirmation ticket.
    #[schema(example = "S1C2Z3456")]
    pub ticket_id: String,
    /// Amount paid, major units.
    #[schema(value_type = i64, example = 20000)]
    pub amount: Money,
    /// True when this reference had already been processed.
    pub already_processed: bool,
    /// The booked slots.
    pub slots: Vec<ConfirmedSlotView>,
}

impl From<VerifyOutcome> for VerifyPaymentResponse {
    fn from(outcome: VerifyOutcome) -> Self {
        let message = if outcome.already_processed {
            "Payment already processed".to_owned()
        } else {
            "Payment verified and booking confirmed successfully".to_owned()
        };
        Self {
            message,
            booking_id: outcome.booking_id,
            ticket_id: outcome.ticket_id.to_string(),
            amount: outcome.amount,
            already_processed: outcome.already_processed,
            slots: outcome
                .slots
                .into_iter()
                .map(|slot| ConfirmedSlotView {
                    date: slot.date,
                    start_time: slot.start_time.to_string(),
                    end_time: slot.end_time.to_string(),
                    status: slot.status.to_string(),
                })
                .collect(),
        }
    }
}

/// Verify a payment by reference (polled by the client).
#[utoipa::path(
    post,
    path = "/api/v1/payments/verify",
    request_body = VerifyPaymentBody,
    responses(
        (status = 200, description = "Payment verified (or already processed)", body = VerifyPaymentResponse),
        (status = 400, description = "Charge unsuccessful or amount mismatch", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 404, description = "Unknown reference", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 502, description = "Gateway failure; retry later", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["payments"],
    operation_id = "verifyPayment"
)]
#[post("/payments/verify")]
pub async fn verify_payment(
    state: web::Data<HttpState>,
    body: web::Json<VerifyPaymentBody>,
) -> ApiResult<web::Json<VerifyPaymentResponse>> {
    let outcome = state.payments.verify(&body.reference).await?;
    Ok(web::Json(outcome.into()))
}

/// Gateway redirect target after checkout; verifies like the polled path.
#[utoipa::path(
    get,
    path = "/api/v1/payments/callback",
    params(CallbackQuery),
    responses(
        (status = 200, description = "Payment verified", body = VerifyPaymentResponse),
        (status = 400, description = "Charge unsuccessful", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["payments"],
    operation_id = "paymentCallback"
)]
#[get("/payments/callback")]
pub async fn payment_callback(
    state: web::Data<HttpState>,
    query: web::Query<CallbackQuery>,
) -> ApiResult<web::Json<VerifyPaymentResponse>> {
    let outcome = state.payments.verify(&query.reference).await?;
    Ok(web::Json(outcome.into()))
}

/// Gateway webhook receiver.
///
/// The signature is validated over the raw payload before any field is
/// trusted; an invalid signature is rejected without processing. Handled
/// events that fail verification answer non-2xx so the gateway redelivers.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body(content = String, description = "Raw gateway event payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Event processed or ignored"),
        (status = 400, description = "Invalid signature or payload"),
        (status = 500, description = "Processing failed; gateway will retry")
    ),
    tags = ["payments"],
    operation_id = "paymentWebhook"
)]
#[post("/payments/webhook")]
pub async fn payment_webhook(
    state: web::Data<HttpState>,
    request: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let Some(signature) = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("webhook delivery without signature header");
        return HttpResponse::BadRequest().body("Missing signature");
    };

    if !verify_signature(&state.webhook_secret, &body, signature) {
        warn!("webhook delivery with invalid signature");
        return HttpResponse::BadRequest().body("Invalid signature");
    }

    let event: WebhookEventDto = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(error) => {
            warn!(%error, "webhook payload undecodable");
            return HttpResponse::BadRequest().body("Invalid payload");
        }
    };

    if event.event != CHARGE_SUCCESS_EVENT {
        info!(event = %event.event, "ignoring unhandled webhook event");
        return HttpResponse::Ok().body("Ignored");
    }

    match state.payments.verify(&event.data.reference).await {
        Ok(outcome) => {
            info!(
                booking_id = %outcome.booking_id,
                already_processed = outcome.already_processed,
                "webhook verification completed"
            );
            HttpResponse::Ok().body("Webhook received")
        }
        Err(error) => {
            error!(%error, reference = %event.data.reference, "webhook verification failed");
            // Non-2xx so the gateway retries the delivery.
            HttpResponse::InternalServerError().body("Verification failed")
        }
    }
}
