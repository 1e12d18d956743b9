//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the migrations under `migrations/` exactly;
//! `diesel print-schema` can regenerate them from a live database.

diesel::table! {
    /// One row per reservation attempt.
    bookings (id) {
        /// Client-facing booking identifier.
        id -> Uuid,
        /// Owning user.
        user_id -> Uuid,
        /// Email payment and ticket go to.
        user_email -> Varchar,
        /// Claimed slot rows, in request order.
        slot_ids -> Array<Uuid>,
        /// Sum of claimed slot amounts at claim time.
        total_amount -> Int8,
        /// Lifecycle state.
        #[max_length = 16]
        status -> Varchar,
        /// Gateway-facing payment reference (unique when present).
        payment_ref -> Nullable<Varchar>,
        /// Whether a successful verification was recorded.
        payment_verified -> Bool,
        /// Confirmation ticket.
        #[max_length = 9]
        ticket_id -> Nullable<Varchar>,
        /// Whether the ticket email was dispatched.
        email_sent -> Bool,
        /// Row creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// The singleton slot configuration record.
    slot_settings (id) {
        /// Always 1; enforced by a check constraint.
        id -> Int2,
        /// Master availability switch.
        global_enabled -> Bool,
        /// Default slot price.
        default_amount -> Int8,
        /// Ordered day template of `HH:MM` strings.
        slots_per_day -> Jsonb,
        /// Per-time activity overrides.
        slot_toggles -> Jsonb,
        /// Per-time price overrides.
        slot_amounts -> Jsonb,
        /// Per-date overrides.
        date_overrides -> Jsonb,
        /// Row creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Lazily created slot rows, one per (date, start_time) touched.
    slots (id) {
        /// Stable row identifier.
        id -> Uuid,
        /// Calendar date.
        date -> Date,
        /// Interval start, `HH:MM`.
        #[max_length = 5]
        start_time -> Varchar,
        /// Interval end, `HH:MM`.
        #[max_length = 5]
        end_time -> Varchar,
        /// Price at this slot.
        amount -> Int8,
        /// Lifecycle state.
        #[max_length = 16]
        status -> Varchar,
        /// Whether the slot is offered.
        is_active -> Bool,
        /// Owning booking while pending or booked.
        booking_id -> Nullable<Uuid>,
        /// User holding or owning the slot.
        booked_by -> Nullable<Uuid>,
        /// When a pending hold lapses.
        pending_expires_at -> Nullable<Timestamptz>,
        /// Row creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(bookings, slot_settings, slots);
