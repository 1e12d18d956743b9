//! Wire types for the Paystack transaction API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for `POST /transaction/initialize`.
#[derive(Debug, Clone, Serialize)]
pub struct InitializeRequestDto {
    pub email: String,
    /// Amount in the minor currency unit (kobo).
    pub amount: i64,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub metadata: Value,
}

/// Envelope every Paystack response uses.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeDto<T> {
    /// Whether the API call itself succeeded.
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// Payload of a successful initialize call.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationDto {
    pub authorization_url: String,
    pub reference: String,
}

/// Payload of a verify call.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationDto {
    /// Charge state: `success`, `failed`, `abandoned`, ...
    pub status: String,
    /// Paid amount in the minor currency unit.
    pub amount: i64,
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventDto {
    /// Event discriminator, e.g. `charge.success`.
    pub event: String,
    pub data: WebhookChargeDto,
}

/// Charge payload carried by webhook events.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChargeDto {
    pub reference: String,
}
