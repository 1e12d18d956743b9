//! PostgreSQL-backed `BookingLedger` implementation using Diesel.
//!
//! Every port operation is one database transaction. Slot claiming locks the
//! contested rows with `SELECT ... FOR UPDATE`, so two concurrent
//! reservations for the same `(date, start_time)` serialise and the loser
//! observes the winner's hold.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::ports::{
    BookingLedger, BookingWithSlots, CancelError, CancelOutcome, CancelRequester, ConfirmError,
    ConfirmOutcome, ConfirmedBooking, ConfirmedSlot, LedgerError, ReclaimOutcome,
    ReservationRequest, ReserveError, ReservedBooking, ReservedSlot,
};
use crate::domain::slots::{SlotStatus, SlotTime};
use crate::domain::ticket::TicketId;
use crate::domain::Money;

use super::diesel_slot_store::row_to_record;
use super::error_mapping::{map_diesel_error, map_pool_error};
use super::models::{BookingRow, NewBookingRow, NewSlotRow, SlotRow};
use super::pool::{DbPool, PoolError};
use super::schema::{bookings, slots};

/// Diesel-backed implementation of the booking ledger port.
#[derive(Clone)]
pub struct DieselBookingLedger {
    pool: DbPool,
}

impl DieselBookingLedger {
    /// Create a new ledger with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool(error: PoolError) -> LedgerError {
    map_pool_error(error, LedgerError::connection)
}

fn map_diesel(error: diesel::result::Error) -> LedgerError {
    map_diesel_error(error, LedgerError::query, LedgerError::connection)
}

fn decode_time(raw: &str, field: &str) -> Result<SlotTime, LedgerError> {
    raw.parse()
        .map_err(|err| LedgerError::query(format!("decode {field}: {err}")))
}

fn decode_booking_status(raw: &str) -> Result<BookingStatus, LedgerError> {
    raw.parse()
        .map_err(|err| LedgerError::query(format!("decode booking status: {err}")))
}

fn row_to_booking(row: BookingRow) -> Result<Booking, LedgerError> {
    let status = decode_booking_status(&row.status)?;
    Ok(Booking {
        id: row.id,
        user_id: row.user_id,
        user_email: row.user_email,
        slot_ids: row.slot_ids,
        total_amount: Money::new(row.total_amount),
        status,
        payment_ref: row.payment_ref,
        payment_verified: row.payment_verified,
        ticket_id: row.ticket_id.map(TicketId::from_stored),
        email_sent: row.email_sent,
        created_at: row.created_at,
    })
}

fn confirmed_slot(row: &SlotRow) -> Result<ConfirmedSlot, LedgerError> {
    Ok(ConfirmedSlot {
        date: row.date,
        start_time: decode_time(&row.start_time, "start_time")?,
        end_time: decode_time(&row.end_time, "end_time")?,
        status: row
            .status
            .parse()
            .map_err(|err| LedgerError::query(format!("decode slot status: {err}")))?,
    })
}

fn confirmed_booking(
    booking: &BookingRow,
    slot_rows: &[SlotRow],
    ticket_id: TicketId,
) -> Result<ConfirmedBooking, LedgerError> {
    Ok(ConfirmedBooking {
        booking_id: booking.id,
        user_id: booking.user_id,
        user_email: booking.user_email.clone(),
        ticket_id,
        amount: Money::new(booking.total_amount),
        slots: slot_rows
            .iter()
            .map(confirmed_slot)
            .collect::<Result<Vec<_>, _>>()?,
        email_sent: booking.email_sent,
    })
}

/// Internal error carrier for the reserve transaction.
enum ReserveTxError {
    Unavailable(Vec<SlotTime>),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for ReserveTxError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

/// Internal error carrier for the confirm transaction.
enum ConfirmTxError {
    NotFound,
    NotPayable(Uuid, BookingStatus),
    Decode(LedgerError),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for ConfirmTxError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

/// Internal error carrier for the cancel transaction.
enum CancelTxError {
    NotFound(Uuid),
    Forbidden(Uuid),
    NotCancellable(Uuid, BookingStatus),
    Decode(LedgerError),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for CancelTxError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

async fn lock_slot(
    conn: &mut AsyncPgConnection,
    date: NaiveDate,
    time: SlotTime,
) -> Result<Option<SlotRow>, diesel::result::Error> {
    slots::table
        .filter(slots::date.eq(date))
        .filter(slots::start_time.eq(time.to_string()))
        .select(SlotRow::as_select())
        .for_update()
        .first::<SlotRow>(conn)
        .await
        .optional()
}

#[async_trait]
impl BookingLedger for DieselBookingLedger {
    async fn reserve(&self, request: ReservationRequest) -> Result<ReservedBooking, ReserveError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ReserveError::Ledger(map_pool(e)))?;

        let result = conn
            .transaction::<ReservedBooking, ReserveTxError, _>(|conn| {
                async move {
                    let mut unavailable = Vec::new();
                    let mut claimed: Vec<ReservedSlot> = Vec::new();

                    for claim in &request.slots {
                        match lock_slot(conn, request.date, claim.start_time).await? {
                            None => {
                                let insert = NewSlotRow {
                                    id: Uuid::new_v4(),
                                    date: request.date,
                                    start_time: claim.start_time.to_string(),
                                    end_time: claim.end_time.to_string(),
                                    amount: claim.amount.major_units(),
                                    status: SlotStatus::Available.as_str().to_owned(),
                                    is_active: true,
                                    booking_id: None,
                                    booked_by: None,
                                    pending_expires_at: None,
                                };
                                diesel::insert_into(slots::table)
                                    .values(&insert)
                                    .execute(conn)
                                    .await?;
                                claimed.push(ReservedSlot {
                                    id: insert.id,
                                    start_time: claim.start_time,
                                    end_time: claim.end_time,
                                    amount: claim.amount,
                                });
                            }
                            Some(row) if row.status == SlotStatus::Available.as_str() => {
                                claimed.push(ReservedSlot {
                                    id: row.id,
                                    start_time: claim.start_time,
                                    end_time: claim.end_time,
                                    amount: Money::new(row.amount),
                                });
                            }
                            Some(_) => unavailable.push(claim.start_time),
                        }
                    }

                    if !unavailable.is_empty() {
                        return Err(ReserveTxError::Unavailable(unavailable));
                    }

                    let total: Money = claimed.iter().map(|slot| slot.amount).sum();
                    let booking_id = Uuid::new_v4();
                    let claimed_ids: Vec<Uuid> = claimed.iter().map(|slot| slot.id).collect();
                    let booking = NewBookingRow {
                        id: booking_id,
                        user_id: request.user_id,
                        user_email: request.user_email.clone(),
                        slot_ids: claimed_ids.clone(),
                        total_amount: total.major_units(),
                        status: BookingStatus::Pending.as_str().to_owned(),
                    };
                    diesel::insert_into(bookings::table)
                        .values(&booking)
                        .execute(conn)
                        .await?;

                    diesel::update(slots::table.filter(slots::id.eq_any(&claimed_ids)))
                        .set((
                            slots::status.eq(SlotStatus::Pending.as_str()),
                            slots::booking_id.eq(booking_id),
                            slots::booked_by.eq(request.user_id),
                            slots::pending_expires_at.eq(request.hold_expires_at),
                            slots::updated_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;

                    Ok(ReservedBooking {
                        booking_id,
                        date: request.date,
                        total_amount: total,
                        slots: claimed,
                    })
                }
                .scope_boxed()
            })
            .await;

        result.map_err(|error| match error {
            ReserveTxError::Unavailable(times) => ReserveError::Unavailable { times },
            ReserveTxError::Diesel(inner) => ReserveError::Ledger(map_diesel(inner)),
        })
    }

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let row = bookings::table
            .filter(bookings::id.eq(booking_id))
            .select(BookingRow::as_select())
            .first::<BookingRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel)?;
        row.map(row_to_booking).transpose()
    }

    async fn find_by_payment_ref(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let row = bookings::table
            .filter(bookings::payment_ref.eq(reference))
            .select(BookingRow::as_select())
            .first::<BookingRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel)?;
        row.map(row_to_booking).transpose()
    }

    async fn record_payment_ref(
        &self,
        booking_id: Uuid,
        reference: &str,
    ) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        diesel::update(bookings::table.filter(bookings::id.eq(booking_id)))
            .set((
                bookings::payment_ref.eq(reference),
                bookings::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel)
    }

    async fn confirm_payment(
        &self,
        reference: &str,
        ticket_id: &TicketId,
    ) -> Result<ConfirmOutcome, ConfirmError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ConfirmError::Ledger(map_pool(e)))?;
        let tx_reference = reference.to_owned();
        let ticket = ticket_id.clone();

        let result = conn
            .transaction::<ConfirmOutcome, ConfirmTxError, _>(|conn| {
                async move {
                    let booking: Option<BookingRow> = bookings::table
                        .filter(bookings::payment_ref.eq(&tx_reference))
                        .select(BookingRow::as_select())
                        .for_update()
                        .first::<BookingRow>(conn)
                        .await
                        .optional()?;
                    let booking = booking.ok_or(ConfirmTxError::NotFound)?;

                    let status = decode_booking_status(&booking.status)
                        .map_err(ConfirmTxError::Decode)?;

                    if booking.payment_verified || status.is_settled() {
                        let slot_rows: Vec<SlotRow> = slots::table
                            .filter(slots::id.eq_any(&booking.slot_ids))
                            .order(slots::start_time.asc())
                            .select(SlotRow::as_select())
                            .load(conn)
                            .await?;
                        // Repeat calls report the stored ticket when one exists.
                        let ticket = booking
                            .ticket_id
                            .clone()
                            .map(TicketId::from_stored)
                            .unwrap_or(ticket);
                        let details = confirmed_booking(&booking, &slot_rows, ticket)
                            .map_err(ConfirmTxError::Decode)?;
                        return Ok(ConfirmOutcome::AlreadyProcessed(details));
                    }

                    if !status.is_payable() {
                        return Err(ConfirmTxError::NotPayable(booking.id, status));
                    }

                    diesel::update(bookings::table.filter(bookings::id.eq(booking.id)))
                        .set((
                            bookings::status.eq(BookingStatus::Confirmed.as_str()),
                            bookings::payment_verified.eq(true),
                            bookings::ticket_id.eq(ticket.as_str()),
                            bookings::updated_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;

                    diesel::update(slots::table.filter(slots::id.eq_any(&booking.slot_ids)))
                        .set((
                            slots::status.eq(SlotStatus::Booked.as_str()),
                            slots::booking_id.eq(booking.id),
                            slots::booked_by.eq(booking.user_id),
                            slots::pending_expires_at.eq(None::<DateTime<Utc>>),
                            slots::updated_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;

                    let slot_rows: Vec<SlotRow> = slots::table
                        .filter(slots::id.eq_any(&booking.slot_ids))
                        .order(slots::start_time.asc())
                        .select(SlotRow::as_select())
                        .load(conn)
                        .await?;
                    let details = confirmed_booking(&booking, &slot_rows, ticket)
                        .map_err(ConfirmTxError::Decode)?;
                    Ok(ConfirmOutcome::Confirmed(details))
                }
                .scope_boxed()
            })
            .await;

        result.map_err(|error| match error {
            ConfirmTxError::NotFound => ConfirmError::NotFound {
                reference: reference.to_owned(),
            },
            ConfirmTxError::NotPayable(booking_id, status) => {
                ConfirmError::NotPayable { booking_id, status }
            }
            ConfirmTxError::Decode(inner) => ConfirmError::Ledger(inner),
            ConfirmTxError::Diesel(inner) => ConfirmError::Ledger(map_diesel(inner)),
        })
    }

    async fn mark_email_sent(&self, booking_id: Uuid) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        diesel::update(bookings::table.filter(bookings::id.eq(booking_id)))
            .set((
                bookings::email_sent.eq(true),
                bookings::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel)
    }

    async fn cancel(
        &self,
        booking_ids: &[Uuid],
        requester: CancelRequester,
    ) -> Result<CancelOutcome, CancelError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CancelError::Ledger(map_pool(e)))?;
        let booking_ids = booking_ids.to_vec();

        let result = conn
            .transaction::<CancelOutcome, CancelTxError, _>(|conn| {
                async move {
                    let mut affected = 0;
                    let mut dates: Vec<NaiveDate> = Vec::new();

                    for booking_id in &booking_ids {
                        let booking: Option<BookingRow> = bookings::table
                            .filter(bookings::id.eq(booking_id))
                            .select(BookingRow::as_select())
                            .for_update()
                            .first::<BookingRow>(conn)
                            .await
                            .optional()?;
                        let booking = booking.ok_or(CancelTxError::NotFound(*booking_id))?;

                        let status = decode_booking_status(&booking.status)
                            .map_err(CancelTxError::Decode)?;

                        if !requester.is_admin {
                            if booking.user_id != requester.user_id {
                                return Err(CancelTxError::Forbidden(booking.id));
                            }
                            if status != BookingStatus::Pending {
                                return Err(CancelTxError::NotCancellable(booking.id, status));
                            }
                        }

                        // Only release slots still owned by this booking; a
                        // reclaimed-and-rebooked slot belongs to someone else.
                        let released: Vec<NaiveDate> = diesel::update(
                            slots::table
                                .filter(slots::id.eq_any(&booking.slot_ids))
                                .filter(slots::booking_id.eq(booking.id)),
                        )
                        .set((
                            slots::status.eq(SlotStatus::Available.as_str()),
                            slots::booking_id.eq(None::<Uuid>),
                            slots::booked_by.eq(None::<Uuid>),
                            slots::pending_expires_at.eq(None::<DateTime<Utc>>),
                            slots::updated_at.eq(Utc::now()),
                        ))
                        .returning(slots::date)
                        .get_results(conn)
                        .await?;
                        dates.extend(released);

                        if requester.is_admin {
                            diesel::delete(bookings::table.filter(bookings::id.eq(booking.id)))
                                .execute(conn)
                                .await?;
                        } else {
                            diesel::update(bookings::table.filter(bookings::id.eq(booking.id)))
                                .set((
                                    bookings::status.eq(BookingStatus::Cancelled.as_str()),
                                    bookings::updated_at.eq(Utc::now()),
                                ))
                                .execute(conn)
                                .await?;
                        }
                        affected += 1;
                    }

                    dates.sort_unstable();
                    dates.dedup();
                    Ok(CancelOutcome {
                        affected,
                        deleted: requester.is_admin,
                        dates,
                    })
                }
                .scope_boxed()
            })
            .await;

        result.map_err(|error| match error {
            CancelTxError::NotFound(booking_id) => CancelError::NotFound { booking_id },
            CancelTxError::Forbidden(booking_id) => CancelError::Forbidden { booking_id },
            CancelTxError::NotCancellable(booking_id, status) => {
                CancelError::NotCancellable { booking_id, status }
            }
            CancelTxError::Decode(inner) => CancelError::Ledger(inner),
            CancelTxError::Diesel(inner) => CancelError::Ledger(map_diesel(inner)),
        })
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> Result<ReclaimOutcome, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        conn.transaction::<ReclaimOutcome, diesel::result::Error, _>(|conn| {
            async move {
                // Lock the lapsed holds first so their owning bookings are
                // known before the clearing update wipes the link.
                let lapsed: Vec<SlotRow> = slots::table
                    .filter(slots::status.eq(SlotStatus::Pending.as_str()))
                    .filter(slots::pending_expires_at.lt(now))
                    .select(SlotRow::as_select())
                    .for_update()
                    .load(conn)
                    .await?;

                if lapsed.is_empty() {
                    return Ok(ReclaimOutcome::default());
                }

                let slot_ids: Vec<Uuid> = lapsed.iter().map(|row| row.id).collect();
                diesel::update(slots::table.filter(slots::id.eq_any(&slot_ids)))
                    .set((
                        slots::status.eq(SlotStatus::Available.as_str()),
                        slots::booking_id.eq(None::<Uuid>),
                        slots::booked_by.eq(None::<Uuid>),
                        slots::pending_expires_at.eq(None::<DateTime<Utc>>),
                        slots::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)
                    .await?;

                let mut owner_ids: Vec<Uuid> =
                    lapsed.iter().filter_map(|row| row.booking_id).collect();
                owner_ids.sort_unstable();
                owner_ids.dedup();

                let expired_bookings = diesel::update(
                    bookings::table
                        .filter(bookings::id.eq_any(&owner_ids))
                        .filter(bookings::status.eq(BookingStatus::Pending.as_str())),
                )
                .set((
                    bookings::status.eq(BookingStatus::Failed.as_str()),
                    bookings::updated_at.eq(Utc::now()),
                ))
                .execute(conn)
                .await?;

                let mut dates: Vec<NaiveDate> = lapsed.iter().map(|row| row.date).collect();
                dates.sort_unstable();
                dates.dedup();
                Ok(ReclaimOutcome {
                    released_slots: slot_ids.len(),
                    expired_bookings,
                    dates,
                })
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel)
    }

    async fn list_bookings(&self) -> Result<Vec<BookingWithSlots>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let booking_rows: Vec<BookingRow> = bookings::table
            .order(bookings::created_at.desc())
            .select(BookingRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel)?;

        let all_slot_ids: Vec<Uuid> = booking_rows
            .iter()
            .flat_map(|row| row.slot_ids.iter().copied())
            .collect();
        let slot_rows: Vec<SlotRow> = slots::table
            .filter(slots::id.eq_any(&all_slot_ids))
            .select(SlotRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel)?;

        let mut by_id = std::collections::HashMap::new();
        for row in slot_rows {
            let record =
                row_to_record(row).map_err(|err| LedgerError::query(err.to_string()))?;
            by_id.insert(record.id, record);
        }

        booking_rows
            .into_iter()
            .map(|row| {
                let slot_records = row
                    .slot_ids
                    .iter()
                    .filter_map(|id| by_id.get(id).cloned())
                    .collect();
                Ok(BookingWithSlots {
                    booking: row_to_booking(row)?,
                    slots: slot_records,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn booking_row(status: &str) -> BookingRow {
        BookingRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_email: "team@example.test".to_owned(),
            slot_ids: vec![Uuid::new_v4()],
            total_amount: 20000,
            status: status.to_owned(),
            payment_ref: Some("ref-1".to_owned()),
            payment_verified: false,
            ticket_id: None,
            email_sent: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[rstest]
    fn booking_row_decodes_into_domain_booking() {
        let booking = row_to_booking(booking_row("pending")).expect("row decodes");
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_amount, Money::new(20000));
        assert!(booking.ticket_id.is_none());
    }

    #[rstest]
    fn unknown_booking_status_maps_to_query_error() {
        let error = row_to_booking(booking_row("refunded")).expect_err("decode fails");
        assert!(matches!(error, LedgerError::Query { .. }));
    }

    #[rstest]
    fn confirmed_booking_collects_slot_summaries() {
        let row = booking_row("confirmed");
        let slot = SlotRow {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 10, 12).expect("valid date"),
            start_time: "09:00".to_owned(),
            end_time: "10:00".to_owned(),
            amount: 20000,
            status: "booked".to_owned(),
            is_active: true,
            booking_id: Some(row.id),
            booked_by: Some(row.user_id),
            pending_expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let details = confirmed_booking(&row, &[slot], TicketId::from_stored("SCZ123456"))
            .expect("details build");
        assert_eq!(details.slots.len(), 1);
        assert_eq!(details.slots[0].status, SlotStatus::Booked);
    }
}
