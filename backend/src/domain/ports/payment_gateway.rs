//! Port for the external payment gateway.
//!
//! The gateway is an opaque service reachable through two operations keyed
//! by a reference string. Calls have bounded timeouts; a timeout is an
//! unknown-outcome condition the caller resolves later via `verify`, never
//! a definite failure.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::macros::define_port_error;

define_port_error! {
    /// Errors raised by gateway adapters.
    pub enum PaymentGatewayError {
        /// The request timed out; the charge outcome is unknown.
        Timeout { message: String } => "gateway timeout: {message}",
        /// Transport-level failure reaching the gateway.
        Transport { message: String } => "gateway transport error: {message}",
        /// The gateway answered but rejected the operation.
        Rejected { message: String } => "gateway rejected request: {message}",
        /// The gateway response could not be decoded.
        Decode { message: String } => "gateway response invalid: {message}",
    }
}

/// Request to open a payment authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct InitializePayment {
    /// Payer email.
    pub email: String,
    /// Amount in the gateway's minor currency unit.
    pub amount_minor: i64,
    /// Unique reference correlating this charge to a booking.
    pub reference: String,
    /// Booking the charge pays for, carried as gateway metadata.
    pub booking_id: Uuid,
}

/// A successfully opened payment authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAuthorization {
    /// URL the payer completes the charge at.
    pub authorization_url: String,
    /// The reference the gateway will report back.
    pub reference: String,
}

/// Gateway-reported state of a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeStatus {
    /// The charge settled.
    Success,
    /// The charge failed.
    Failed,
    /// The payer abandoned the checkout.
    Abandoned,
    /// Any other state the gateway reports.
    Other(String),
}

impl ChargeStatus {
    /// Decode the gateway's status string.
    pub fn from_gateway(raw: &str) -> Self {
        match raw {
            "success" => Self::Success,
            "failed" => Self::Failed,
            "abandoned" => Self::Abandoned,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Result of verifying a charge with the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeVerification {
    /// Settled state of the charge.
    pub status: ChargeStatus,
    /// Paid amount in the gateway's minor currency unit.
    pub amount_minor: i64,
    /// Raw gateway payload, logged for dispute trails.
    pub raw: Value,
}

/// Port for the payment gateway's initialize and verify operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment authorization for a charge.
    async fn initialize(
        &self,
        request: InitializePayment,
    ) -> Result<PaymentAuthorization, PaymentGatewayError>;

    /// Look up the settled state of a charge by reference.
    async fn verify(&self, reference: &str)
        -> Result<ChargeVerification, PaymentGatewayError>;
}
