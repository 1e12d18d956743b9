//! Reservation engine: atomic slot claims with payment kickoff.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use mockable::Clock;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::domain::money::Money;
use crate::domain::payment::PaymentService;
use crate::domain::ports::{
    AvailabilityCache, BookingLedger, ReservationRequest, ReserveError, ReservedSlot, SlotClaim,
};
use crate::domain::settings_service::SettingsService;
use crate::domain::slots::{virtual_slot_for, SlotTime};
use crate::domain::Error;

/// How long a reservation hold lasts before the sweep reclaims it.
pub const DEFAULT_HOLD_TTL_MINUTES: i64 = 15;

/// Result of a successful reservation.
///
/// Payment fields are absent when initiation failed after the booking
/// committed; the booking stays pending and payable via re-initiation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationOutcome {
    /// Client-facing booking id.
    pub booking_id: Uuid,
    /// Sum of the claimed slots' amounts.
    pub total_amount: Money,
    /// The claimed slots, in request order.
    pub slots: Vec<ReservedSlot>,
    /// Gateway checkout URL, when initiation succeeded.
    pub payment_url: Option<String>,
    /// Gateway reference, when initiation succeeded.
    pub payment_ref: Option<String>,
}

/// The reservation engine.
///
/// Claiming is delegated to one atomic ledger operation; this service
/// prepares effective slot templates, shapes conflict errors and kicks off
/// payment after commit.
#[derive(Clone)]
pub struct ReservationService {
    settings: Arc<SettingsService>,
    ledger: Arc<dyn BookingLedger>,
    cache: Arc<dyn AvailabilityCache>,
    payments: Arc<PaymentService>,
    clock: Arc<dyn Clock>,
    hold_ttl: Duration,
}

impl ReservationService {
    /// Create the engine with the default hold TTL.
    pub fn new(
        settings: Arc<SettingsService>,
        ledger: Arc<dyn BookingLedger>,
        cache: Arc<dyn AvailabilityCache>,
        payments: Arc<PaymentService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_hold_ttl(
            settings,
            ledger,
            cache,
            payments,
            clock,
            Duration::minutes(DEFAULT_HOLD_TTL_MINUTES),
        )
    }

    /// Create the engine with an explicit hold TTL.
    pub fn with_hold_ttl(
        settings: Arc<SettingsService>,
        ledger: Arc<dyn BookingLedger>,
        cache: Arc<dyn AvailabilityCache>,
        payments: Arc<PaymentService>,
        clock: Arc<dyn Clock>,
        hold_ttl: Duration,
    ) -> Self {
        Self {
            settings,
            ledger,
            cache,
            payments,
            clock,
            hold_ttl,
        }
    }

    /// Reserve the requested start times on a date for a user.
    ///
    /// All-or-nothing: if any requested time is unavailable the whole
    /// attempt fails with a conflict naming the contested times and nothing
    /// is written. On success the booking is pending with its slots held,
    /// and payment initiation is attempted; an initiation failure does not
    /// roll the booking back.
    pub async fn reserve(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        start_times: &[String],
        user_email: &str,
    ) -> Result<ReservationOutcome, Error> {
        let times = parse_start_times(start_times)?;
        let settings = self.settings.effective().await?;

        let slots = times
            .iter()
            .map(|&time| {
                let template = virtual_slot_for(date, time, &settings);
                SlotClaim {
                    start_time: time,
                    end_time: time.end_time(),
                    amount: template.amount,
                }
            })
            .collect();

        let reserved = self
            .ledger
            .reserve(ReservationRequest {
                user_id,
                user_email: user_email.to_owned(),
                date,
                slots,
                hold_expires_at: self.clock.utc() + self.hold_ttl,
            })
            .await
            .map_err(|error| match error {
                ReserveError::Unavailable { times } => {
                    Error::conflict(format!(
                        "Slots not available: {}",
                        crate::domain::slots::join_times(&times)
                    ))
                    .with_details(json!({ "unavailable": times }))
                }
                ReserveError::Ledger(inner) => match inner {
                    crate::domain::ports::LedgerError::Connection { message } => {
                        Error::service_unavailable(format!("booking ledger unavailable: {message}"))
                    }
                    crate::domain::ports::LedgerError::Query { message } => {
                        Error::internal(format!("booking ledger error: {message}"))
                    }
                },
            })?;

        if let Err(error) = self.cache.invalidate_day(date).await {
            warn!(%date, %error, "cache invalidation after reservation failed");
        }
        if let Err(error) = self.cache.invalidate_bookings().await {
            warn!(%error, "bookings cache invalidation failed");
        }

        // Payment kickoff happens after commit; its failure leaves the
        // booking pending and payable through the re-initiate operation.
        let (payment_url, payment_ref) = match self
            .payments
            .initiate(reserved.booking_id, user_email)
            .await
        {
            Ok(authorization) => (
                Some(authorization.authorization_url),
                Some(authorization.reference),
            ),
            Err(error) => {
                warn!(booking_id = %reserved.booking_id, %error, "payment initiation failed after booking commit");
                (None, None)
            }
        };

        Ok(ReservationOutcome {
            booking_id: reserved.booking_id,
            total_amount: reserved.total_amount,
            slots: reserved.slots,
            payment_url,
            payment_ref,
        })
    }
}

/// Parse, validate and deduplicate requested start times.
fn parse_start_times(raw: &[String]) -> Result<Vec<SlotTime>, Error> {
    if raw.is_empty() {
        return Err(Error::invalid_request("Start times required"));
    }
    let mut times = Vec::with_capacity(raw.len());
    for value in raw {
        let time = SlotTime::parse(value).map_err(|_| {
            Error::invalid_request(format!("Invalid start time {value:?}; expected HH:MM"))
                .with_details(json!({ "field": "startTimes", "value": value }))
        })?;
        if !times.contains(&time) {
            times.push(time);
        }
    }
    Ok(times)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockable::DefaultClock;
    use rstest::rstest;

    use crate::domain::ports::{
        LedgerError, MockAvailabilityCache, MockBookingLedger, MockPaymentGateway,
        MockSettingsStore, MockSlotStore, MockTicketMailer, PaymentAuthorization, ReservedBooking,
    };
    use crate::domain::slots::SlotSettings;
    use crate::domain::ErrorCode;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 12).expect("valid date")
    }

    fn time(raw: &str) -> SlotTime {
        SlotTime::parse(raw).expect("valid time")
    }

    fn settings_service(settings: SlotSettings) -> Arc<SettingsService> {
        let mut store = MockSettingsStore::new();
        store
            .expect_load()
            .returning(move || Ok(Some(settings.clone())));
        let mut cache = MockAvailabilityCache::new();
        cache.expect_get_settings().returning(|| Ok(None));
        cache.expect_put_settings().returning(|_, _| Ok(()));
        Arc::new(SettingsService::new(
            Arc::new(store),
            Arc::new(MockSlotStore::new()),
            Arc::new(cache),
        ))
    }

    fn quiet_cache() -> MockAvailabilityCache {
        let mut cache = MockAvailabilityCache::new();
        cache.expect_invalidate_day().returning(|_| Ok(()));
        cache.expect_invalidate_bookings().returning(|| Ok(()));
        cache
    }

    fn payments(
        ledger: MockBookingLedger,
        gateway: MockPaymentGateway,
    ) -> Arc<PaymentService> {
        let mut mailer = MockTicketMailer::new();
        mailer.expect_send_ticket().returning(|_| Ok(()));
        Arc::new(PaymentService::new(
            Arc::new(ledger),
            Arc::new(gateway),
            Arc::new(mailer),
            Arc::new(quiet_cache()),
            Arc::new(DefaultClock),
        ))
    }

    fn reserved(request: &ReservationRequest) -> ReservedBooking {
        ReservedBooking {
            booking_id: Uuid::new_v4(),
            date: request.date,
            total_amount: request.slots.iter().map(|s| s.amount).sum(),
            slots: request
                .slots
                .iter()
                .map(|claim| ReservedSlot {
                    id: Uuid::new_v4(),
                    start_time: claim.start_time,
                    end_time: claim.end_time,
                    amount: claim.amount,
                })
                .collect(),
        }
    }

    fn engine(
        settings: SlotSettings,
        ledger: MockBookingLedger,
        payment_ledger: MockBookingLedger,
        gateway: MockPaymentGateway,
    ) -> ReservationService {
        ReservationService::new(
            settings_service(settings),
            Arc::new(ledger),
            Arc::new(quiet_cache()),
            payments(payment_ledger, gateway),
            Arc::new(DefaultClock),
        )
    }

    fn gateway_ok() -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_initialize().returning(|request| {
            Ok(PaymentAuthorization {
                authorization_url: "https://gateway.test/authorize".to_owned(),
                reference: request.reference,
            })
        });
        gateway
    }

    fn payment_ledger_for(booking: crate::domain::booking::Booking) -> MockBookingLedger {
        let mut ledger = MockBookingLedger::new();
        ledger
            .expect_find_booking()
            .returning(move |_| Ok(Some(booking.clone())));
        ledger.expect_record_payment_ref().returning(|_, _| Ok(()));
        ledger
    }

    fn pending_booking_row(total: Money) -> crate::domain::booking::Booking {
        crate::domain::booking::Booking {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_email: "team@example.test".to_owned(),
            slot_ids: vec![],
            total_amount: total,
            status: crate::domain::booking::BookingStatus::Pending,
            payment_ref: None,
            payment_verified: false,
            ticket_id: None,
            email_sent: false,
            created_at: chrono::Utc::now(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn reserve_prices_slots_from_effective_settings() {
        let mut settings = SlotSettings::default();
        settings.set_time_amount(time("09:00"), Money::new(15000));

        let mut ledger = MockBookingLedger::new();
        ledger
            .expect_reserve()
            .withf(|request| {
                request.slots.len() == 2
                    && request.slots[0].amount == Money::new(15000)
                    && request.slots[1].amount == Money::new(20000)
            })
            .returning(|request| Ok(reserved(&request)));

        let engine = engine(
            settings,
            ledger,
            payment_ledger_for(pending_booking_row(Money::new(35000))),
            gateway_ok(),
        );
        let outcome = engine
            .reserve(
                Uuid::new_v4(),
                date(),
                &["09:00".to_owned(), "10:00".to_owned()],
                "team@example.test",
            )
            .await
            .expect("reservation succeeds");
        assert_eq!(outcome.total_amount, Money::new(35000));
        assert!(outcome.payment_url.is_some());
        assert!(outcome.payment_ref.is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn reserve_rejects_empty_start_times() {
        let mut ledger = MockBookingLedger::new();
        ledger.expect_reserve().times(0);

        let engine = engine(
            SlotSettings::default(),
            ledger,
            MockBookingLedger::new(),
            MockPaymentGateway::new(),
        );
        let error = engine
            .reserve(Uuid::new_v4(), date(), &[], "team@example.test")
            .await
            .expect_err("empty request rejected");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[tokio::test]
    async fn reserve_rejects_malformed_times() {
        let engine = engine(
            SlotSettings::default(),
            MockBookingLedger::new(),
            MockBookingLedger::new(),
            MockPaymentGateway::new(),
        );
        let error = engine
            .reserve(
                Uuid::new_v4(),
                date(),
                &["9am".to_owned()],
                "team@example.test",
            )
            .await
            .expect_err("malformed time rejected");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[tokio::test]
    async fn reserve_deduplicates_repeated_times() {
        let mut ledger = MockBookingLedger::new();
        ledger
            .expect_reserve()
            .withf(|request| request.slots.len() == 1)
            .returning(|request| Ok(reserved(&request)));

        let engine = engine(
            SlotSettings::default(),
            ledger,
            payment_ledger_for(pending_booking_row(Money::new(20000))),
            gateway_ok(),
        );
        engine
            .reserve(
                Uuid::new_v4(),
                date(),
                &["09:00".to_owned(), "09:00".to_owned()],
                "team@example.test",
            )
            .await
            .expect("duplicates collapse");
    }

    #[rstest]
    #[tokio::test]
    async fn conflicts_name_the_contested_times() {
        let mut ledger = MockBookingLedger::new();
        ledger.expect_reserve().returning(|_| {
            Err(ReserveError::Unavailable {
                times: vec![time("09:00")],
            })
        });

        let engine = engine(
            SlotSettings::default(),
            ledger,
            MockBookingLedger::new(),
            MockPaymentGateway::new(),
        );
        let error = engine
            .reserve(
                Uuid::new_v4(),
                date(),
                &["09:00".to_owned()],
                "team@example.test",
            )
            .await
            .expect_err("conflict surfaces");
        assert_eq!(error.code(), ErrorCode::Conflict);
        assert!(error.message().contains("09:00"));
        let details = error.details().expect("conflict carries details");
        assert_eq!(details["unavailable"][0], "09:00");
    }

    #[rstest]
    #[tokio::test]
    async fn payment_failure_keeps_booking_with_no_payment_url() {
        let mut ledger = MockBookingLedger::new();
        ledger
            .expect_reserve()
            .returning(|request| Ok(reserved(&request)));

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_initialize().returning(|_| {
            Err(crate::domain::ports::PaymentGatewayError::transport(
                "connection refused",
            ))
        });

        let engine = engine(
            SlotSettings::default(),
            ledger,
            payment_ledger_for(pending_booking_row(Money::new(20000))),
            gateway,
        );
        let outcome = engine
            .reserve(
                Uuid::new_v4(),
                date(),
                &["09:00".to_owned()],
                "team@example.test",
            )
            .await
            .expect("booking survives payment failure");
        assert!(outcome.payment_url.is_none());
        assert!(outcome.payment_ref.is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn ledger_outage_maps_to_service_unavailable() {
        let mut ledger = MockBookingLedger::new();
        ledger
            .expect_reserve()
            .returning(|_| Err(ReserveError::Ledger(LedgerError::connection("refused"))));

        let engine = engine(
            SlotSettings::default(),
            ledger,
            MockBookingLedger::new(),
            MockPaymentGateway::new(),
        );
        let error = engine
            .reserve(
                Uuid::new_v4(),
                date(),
                &["09:00".to_owned()],
                "team@example.test",
            )
            .await
            .expect_err("outage surfaces");
        assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    }
}
