//! Shared HTTP adapter state.
//!
//! Handlers receive this bundle via `actix_web::web::Data`; every service in
//! it is port-driven, so the whole adapter is testable with in-memory
//! doubles behind the same state shape.

use std::sync::Arc;

use crate::domain::{
    AvailabilityService, BookingsService, PaymentService, ReservationService, SettingsService,
    SlotAdminService,
};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Availability queries.
    pub availability: Arc<AvailabilityService>,
    /// The reservation engine.
    pub reservations: Arc<ReservationService>,
    /// Payment initiation and verification.
    pub payments: Arc<PaymentService>,
    /// Booking listings and cancellation.
    pub bookings: Arc<BookingsService>,
    /// Settings reads and admin writes.
    pub settings: Arc<SettingsService>,
    /// Admin slot editing.
    pub slot_admin: Arc<SlotAdminService>,
    /// Shared secret validating gateway webhook signatures.
    pub webhook_secret: String,
}
