//! OpenAPI document aggregation.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};
use crate::inbound::http::{bookings, payments, settings, slots};

/// Registers the session-cookie security scheme referenced by handlers.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "SessionCookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("session"))),
            );
        }
    }
}

/// Public OpenAPI surface used by Swagger UI and tooling.
#[derive(OpenApi)]
#[openapi(
    paths(
        slots::get_slots,
        slots::create_slot,
        slots::update_slot,
        slots::delete_slot,
        bookings::create_booking,
        bookings::initiate_payment,
        bookings::cancel_bookings,
        bookings::get_user_bookings,
        bookings::get_all_bookings,
        payments::verify_payment,
        payments::payment_callback,
        payments::payment_webhook,
        settings::get_settings,
        settings::update_settings,
        settings::update_amount,
        settings::toggle_time,
        settings::add_template_time,
        settings::remove_template_time,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        slots::SlotView,
        slots::SlotPatchBody,
        slots::CreateSlotBody,
        bookings::CreateBookingBody,
        bookings::ReservedSlotView,
        bookings::CreateBookingResponse,
        bookings::InitiatePaymentResponse,
        bookings::CancelBookingsBody,
        bookings::CancelBookingsResponse,
        payments::VerifyPaymentBody,
        payments::ConfirmedSlotView,
        payments::VerifyPaymentResponse,
        settings::SettingsPatchBody,
        settings::DateOverrideBody,
        settings::AmountUpdateBody,
        settings::ToggleTimeBody,
        settings::AddTimeBody,
        settings::SettingsView,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "slots", description = "Availability queries"),
        (name = "bookings", description = "Reservation lifecycle"),
        (name = "payments", description = "Payment verification and webhooks"),
        (name = "admin", description = "Slot and settings administration"),
    )
)]
pub struct ApiDoc;
