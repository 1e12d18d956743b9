//! Reqwest-backed Paystack gateway adapter.
//!
//! Owns transport details only: request serialisation, bearer auth, bounded
//! timeouts and HTTP error mapping into the gateway port's error shape.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::json;

use crate::domain::ports::{
    ChargeStatus, ChargeVerification, InitializePayment, PaymentAuthorization, PaymentGateway,
    PaymentGatewayError,
};

use super::dto::{AuthorizationDto, EnvelopeDto, InitializeRequestDto, VerificationDto};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Configuration for the Paystack HTTP gateway.
#[derive(Debug, Clone)]
pub struct PaystackConfig {
    /// API base, e.g. `https://api.paystack.co`.
    pub base_url: Url,
    /// Secret key used as a bearer token.
    pub secret_key: String,
    /// URL the payer returns to after checkout.
    pub callback_url: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl PaystackConfig {
    /// Build a configuration with the default timeout.
    pub fn new(base_url: Url, secret_key: impl Into<String>) -> Self {
        Self {
            base_url,
            secret_key: secret_key.into(),
            callback_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the post-checkout callback URL.
    pub fn with_callback_url(mut self, callback_url: impl Into<String>) -> Self {
        self.callback_url = Some(callback_url.into());
        self
    }
}

/// Paystack gateway adapter speaking the transaction API over HTTPS.
pub struct PaystackHttpGateway {
    client: Client,
    config: PaystackConfig,
}

impl PaystackHttpGateway {
    /// Build the adapter with a reqwest client honouring the configured
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(config: PaystackConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PaymentGatewayError> {
        self.config
            .base_url
            .join(path)
            .map_err(|err| PaymentGatewayError::decode(format!("invalid endpoint {path}: {err}")))
    }
}

fn map_transport_error(error: reqwest::Error) -> PaymentGatewayError {
    if error.is_timeout() {
        PaymentGatewayError::timeout(error.to_string())
    } else {
        PaymentGatewayError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> PaymentGatewayError {
    let preview = body_preview(body);
    let message = if preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {preview}", status.as_u16())
    };
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            PaymentGatewayError::timeout(message)
        }
        _ if status.is_client_error() => PaymentGatewayError::rejected(message),
        _ => PaymentGatewayError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

fn decode_envelope<T: serde::de::DeserializeOwned>(
    body: &[u8],
) -> Result<EnvelopeDto<T>, PaymentGatewayError> {
    serde_json::from_slice(body)
        .map_err(|err| PaymentGatewayError::decode(format!("invalid gateway JSON: {err}")))
}

fn require_data<T>(envelope: EnvelopeDto<T>) -> Result<T, PaymentGatewayError> {
    if !envelope.status {
        return Err(PaymentGatewayError::rejected(envelope.message));
    }
    envelope
        .data
        .ok_or_else(|| PaymentGatewayError::decode("gateway reported success without data"))
}

#[async_trait]
impl PaymentGateway for PaystackHttpGateway {
    async fn initialize(
        &self,
        request: InitializePayment,
    ) -> Result<PaymentAuthorization, PaymentGatewayError> {
        let endpoint = self.endpoint("transaction/initialize")?;
        let body = InitializeRequestDto {
            email: request.email,
            amount: request.amount_minor,
            reference: request.reference,
            callback_url: self.config.callback_url.clone(),
            metadata: json!({ "bookingId": request.booking_id }),
        };

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, bytes.as_ref()));
        }

        let data: AuthorizationDto = require_data(decode_envelope(bytes.as_ref())?)?;
        Ok(PaymentAuthorization {
            authorization_url: data.authorization_url,
            reference: data.reference,
        })
    }

    async fn verify(
        &self,
        reference: &str,
    ) -> Result<ChargeVerification, PaymentGatewayError> {
        let endpoint = self.endpoint(&format!("transaction/verify/{reference}"))?;

        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, bytes.as_ref()));
        }

        let raw: serde_json::Value = serde_json::from_slice(bytes.as_ref())
            .map_err(|err| PaymentGatewayError::decode(format!("invalid gateway JSON: {err}")))?;
        let data: VerificationDto = require_data(decode_envelope(bytes.as_ref())?)?;
        Ok(ChargeVerification {
            status: ChargeStatus::from_gateway(&data.status),
            amount_minor: data.amount,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::request_timeout(StatusCode::REQUEST_TIMEOUT, "Timeout")]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT, "Timeout")]
    #[case::unauthorized(StatusCode::UNAUTHORIZED, "Rejected")]
    #[case::unprocessable(StatusCode::UNPROCESSABLE_ENTITY, "Rejected")]
    #[case::server_error(StatusCode::INTERNAL_SERVER_ERROR, "Transport")]
    fn maps_http_statuses_to_port_errors(#[case] status: StatusCode, #[case] expected: &str) {
        let error = map_status_error(status, br#"{"status":false,"message":"nope"}"#);
        let matched = match expected {
            "Timeout" => matches!(error, PaymentGatewayError::Timeout { .. }),
            "Rejected" => matches!(error, PaymentGatewayError::Rejected { .. }),
            "Transport" => matches!(error, PaymentGatewayError::Transport { .. }),
            other => panic!("unsupported expectation: {other}"),
        };
        assert!(matched, "{status} should map to {expected}");
    }

    #[rstest]
    fn rejected_envelope_carries_gateway_message() {
        let envelope: EnvelopeDto<AuthorizationDto> =
            decode_envelope(br#"{ "status": false, "message": "Invalid key" }"#)
                .expect("envelope decodes");
        let error = require_data(envelope).expect_err("rejected envelope fails");
        assert!(matches!(
            error,
            PaymentGatewayError::Rejected { ref message } if message == "Invalid key"
        ));
    }

    #[rstest]
    fn success_envelope_without_data_is_a_decode_error() {
        let envelope: EnvelopeDto<AuthorizationDto> =
            decode_envelope(br#"{ "status": true, "message": "ok" }"#).expect("envelope decodes");
        let error = require_data(envelope).expect_err("missing data fails");
        assert!(matches!(error, PaymentGatewayError::Decode { .. }));
    }

    #[rstest]
    fn long_error_bodies_are_previewed() {
        let body = vec![b'x'; 500];
        let error = map_status_error(StatusCode::BAD_REQUEST, &body);
        let message = error.to_string();
        assert!(message.contains("..."), "long bodies are truncated");
        assert!(message.len() < 300);
    }
}
