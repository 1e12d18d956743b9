//! Pure assembly of a date's bookable slots.
//!
//! The day template in [`SlotSettings`] is expanded into virtual slots with
//! layered overrides applied, then persisted rows are merged over the
//! template keyed by start time. No store access happens here, so the output
//! for a given `(date, settings, persisted)` snapshot is deterministic and
//! cache state can never change a result.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::Money;
use crate::domain::slots::{SlotRecord, SlotSettings, SlotStatus, SlotTime};

/// A slot as presented to availability queries.
///
/// Virtual slots (no persisted row yet) carry `id: None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledSlot {
    /// Persisted row id, when the slot has been touched.
    pub id: Option<Uuid>,
    /// Calendar date.
    pub date: NaiveDate,
    /// Start of the interval.
    pub start_time: SlotTime,
    /// End of the interval.
    pub end_time: SlotTime,
    /// Effective price.
    pub amount: Money,
    /// Lifecycle state.
    pub status: SlotStatus,
    /// Effective activity flag.
    pub is_active: bool,
    /// Owning booking, when held or booked.
    pub booking_id: Option<Uuid>,
}

impl From<SlotRecord> for AssembledSlot {
    fn from(record: SlotRecord) -> Self {
        Self {
            id: Some(record.id),
            date: record.date,
            start_time: record.start_time,
            end_time: record.end_time,
            amount: record.amount,
            status: record.status,
            is_active: record.is_active,
            booking_id: record.booking_id,
        }
    }
}

/// Effective template values for one `(date, time)` pair.
///
/// Used both for assembly and for pricing lazily created rows during
/// reservation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualSlot {
    /// Effective price after date, per-time and default layers.
    pub amount: Money,
    /// Effective activity after date, per-time and global layers.
    pub is_active: bool,
}

/// Resolve the layered overrides for one time on one date.
///
/// Amount precedence: date override, then per-time override, then default.
/// Activity precedence: date override, then per-time toggle, then `true`;
/// the global switch masks everything.
pub fn virtual_slot_for(date: NaiveDate, time: SlotTime, settings: &SlotSettings) -> VirtualSlot {
    let date_override = settings.date_overrides.get(&date);
    let amount = date_override
        .and_then(|o| o.amount)
        .or_else(|| settings.slot_amounts.get(&time).copied())
        .unwrap_or(settings.default_amount);
    let is_active = date_override
        .and_then(|o| o.is_active)
        .or_else(|| settings.slot_toggles.get(&time).copied())
        .unwrap_or(true)
        && settings.global_enabled;
    VirtualSlot { amount, is_active }
}

/// Assemble the full slot sequence for a date.
///
/// When the global switch is off the result is empty for every date: the
/// switch hides slots rather than deactivating them. Persisted rows replace
/// their virtual counterparts wholesale, and rows for times outside the
/// current template are still included so manually created slots stay
/// visible. Output is sorted by start time.
pub fn assemble(
    date: NaiveDate,
    settings: &SlotSettings,
    persisted: &[SlotRecord],
) -> Vec<AssembledSlot> {
    if !settings.global_enabled {
        return Vec::new();
    }

    let mut by_time: BTreeMap<SlotTime, AssembledSlot> = settings
        .slots_per_day
        .iter()
        .map(|&time| {
            let virtual_slot = virtual_slot_for(date, time, settings);
            (
                time,
                AssembledSlot {
                    id: None,
                    date,
                    start_time: time,
                    end_time: time.end_time(),
                    amount: virtual_slot.amount,
                    status: SlotStatus::Available,
                    is_active: virtual_slot.is_active,
                    booking_id: None,
                },
            )
        })
        .collect();

    for record in persisted {
        by_time.insert(record.start_time, AssembledSlot::from(record.clone()));
    }

    by_time.into_values().collect()
}

/// Filter an assembled day down to slots a client may book right now.
pub fn bookable(slots: &[AssembledSlot]) -> Vec<AssembledSlot> {
    slots
        .iter()
        .filter(|s| s.status == SlotStatus::Available && s.is_active)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn time(raw: &str) -> SlotTime {
        SlotTime::parse(raw).expect("valid time")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 12).expect("valid date")
    }

    fn record(start: &str, status: SlotStatus, amount: i64) -> SlotRecord {
        SlotRecord {
            id: Uuid::new_v4(),
            date: date(),
            start_time: time(start),
            end_time: time(start).end_time(),
            amount: Money::new(amount),
            status,
            is_active: true,
            booking_id: None,
            booked_by: None,
            pending_expires_at: None,
        }
    }

    #[fixture]
    fn settings() -> SlotSettings {
        SlotSettings::default()
    }

    #[rstest]
    fn assembles_full_template_when_nothing_persisted(settings: SlotSettings) {
        let slots = assemble(date(), &settings, &[]);
        assert_eq!(slots.len(), settings.slots_per_day.len());
        assert!(slots.iter().all(|s| s.id.is_none()));
        assert!(slots.iter().all(|s| s.status == SlotStatus::Available));
        assert!(slots.iter().all(|s| s.amount == Money::new(20000)));
        // Sorted ascending by start time.
        let mut sorted = slots.clone();
        sorted.sort_by_key(|s| s.start_time);
        assert_eq!(slots, sorted);
    }

    #[rstest]
    fn global_disable_hides_every_slot(mut settings: SlotSettings) {
        settings.global_enabled = false;
        let persisted = vec![record("09:00", SlotStatus::Booked, 20000)];
        assert!(assemble(date(), &settings, &persisted).is_empty());
    }

    #[rstest]
    fn amount_layers_apply_in_precedence_order(mut settings: SlotSettings) {
        settings.set_time_amount(time("09:00"), Money::new(15000));
        settings.set_date_amount(date(), Money::new(30000));

        // Date override beats the per-time layer.
        let slot = virtual_slot_for(date(), time("09:00"), &settings);
        assert_eq!(slot.amount, Money::new(30000));

        // On another date the per-time layer applies.
        let other = NaiveDate::from_ymd_opt(2025, 10, 13).expect("valid date");
        let slot = virtual_slot_for(other, time("09:00"), &settings);
        assert_eq!(slot.amount, Money::new(15000));

        // And untouched times fall back to the default.
        let slot = virtual_slot_for(other, time("10:00"), &settings);
        assert_eq!(slot.amount, Money::new(20000));
    }

    #[rstest]
    fn activity_layers_apply_in_precedence_order(mut settings: SlotSettings) {
        settings.toggle_time(time("09:00"), false);
        let slot = virtual_slot_for(date(), time("09:00"), &settings);
        assert!(!slot.is_active);

        settings.date_overrides.insert(
            date(),
            crate::domain::slots::DateOverride {
                amount: None,
                is_active: Some(true),
            },
        );
        let slot = virtual_slot_for(date(), time("09:00"), &settings);
        assert!(slot.is_active, "date override beats per-time toggle");
    }

    #[rstest]
    fn persisted_rows_replace_virtual_slots(settings: SlotSettings) {
        let booked = record("09:00", SlotStatus::Booked, 25000);
        let slots = assemble(date(), &settings, &[booked.clone()]);
        let nine = slots
            .iter()
            .find(|s| s.start_time == time("09:00"))
            .expect("slot present");
        assert_eq!(nine.id, Some(booked.id));
        assert_eq!(nine.status, SlotStatus::Booked);
        assert_eq!(nine.amount, Money::new(25000));
        assert_eq!(slots.len(), settings.slots_per_day.len());
    }

    #[rstest]
    fn out_of_template_rows_remain_visible(settings: SlotSettings) {
        let late = record("22:00", SlotStatus::Available, 18000);
        let slots = assemble(date(), &settings, &[late]);
        assert_eq!(slots.len(), settings.slots_per_day.len() + 1);
        assert_eq!(
            slots.last().map(|s| s.start_time),
            Some(time("22:00")),
            "extra row sorts to its chronological position"
        );
    }

    #[rstest]
    fn assembly_is_deterministic(settings: SlotSettings) {
        let persisted = vec![
            record("09:00", SlotStatus::Pending, 20000),
            record("12:00", SlotStatus::Booked, 20000),
        ];
        let first = assemble(date(), &settings, &persisted);
        let second = assemble(date(), &settings, &persisted);
        assert_eq!(first, second);
    }

    #[rstest]
    fn bookable_filters_held_and_inactive_slots(mut settings: SlotSettings) {
        settings.toggle_time(time("08:00"), false);
        let persisted = vec![record("09:00", SlotStatus::Pending, 20000)];
        let slots = assemble(date(), &settings, &persisted);
        let open = bookable(&slots);
        assert!(open.iter().all(|s| s.status == SlotStatus::Available));
        assert!(!open.iter().any(|s| s.start_time == time("08:00")));
        assert!(!open.iter().any(|s| s.start_time == time("09:00")));
    }
}
