//! Slot schedule configuration.
//!
//! One active settings record drives slot assembly for every date: a master
//! list of day times plus layered overrides (per-time, per-date). Loaded
//! explicitly and passed by reference into the assembler; never read from
//! ambient process state.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::money::Money;
use crate::domain::slots::{SlotTime, SlotTimeParseError};

/// Per-date override applied on top of the day template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateOverride {
    /// Price override for every slot on the date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    /// Activity override for every slot on the date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// The singleton slot configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSettings {
    /// Master switch; when false every availability query returns empty.
    pub global_enabled: bool,
    /// Price used when no per-time or per-date override applies.
    pub default_amount: Money,
    /// Ordered, unique day template of slot start times.
    pub slots_per_day: Vec<SlotTime>,
    /// Per-time activity overrides.
    pub slot_toggles: BTreeMap<SlotTime, bool>,
    /// Per-time price overrides.
    pub slot_amounts: BTreeMap<SlotTime, Money>,
    /// Per-date overrides, strongest layer.
    pub date_overrides: BTreeMap<NaiveDate, DateOverride>,
}

impl Default for SlotSettings {
    fn default() -> Self {
        // Matches the seed schedule: hourly slots from 07:00 through 20:00.
        let slots_per_day = (7..=20)
            .filter_map(|hour| SlotTime::new(hour, 0).ok())
            .collect();
        Self {
            global_enabled: true,
            default_amount: Money::new(20000),
            slots_per_day,
            slot_toggles: BTreeMap::new(),
            slot_amounts: BTreeMap::new(),
            date_overrides: BTreeMap::new(),
        }
    }
}

/// Partial update applied to the settings record by admin operations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    /// New master switch value, if provided.
    pub global_enabled: Option<bool>,
    /// New default price, if provided.
    pub default_amount: Option<Money>,
    /// Replacement day template, if provided.
    pub slots_per_day: Option<Vec<SlotTime>>,
    /// Replacement per-time toggles, if provided.
    pub slot_toggles: Option<BTreeMap<SlotTime, bool>>,
    /// Replacement per-time amounts, if provided.
    pub slot_amounts: Option<BTreeMap<SlotTime, Money>>,
    /// Replacement per-date overrides, if provided.
    pub date_overrides: Option<BTreeMap<NaiveDate, DateOverride>>,
}

impl SettingsPatch {
    /// Whether applying this patch replaces the day template.
    pub fn changes_template(&self) -> bool {
        self.slots_per_day.is_some()
    }
}

impl SlotSettings {
    /// Merge a partial update into this record, field by field.
    ///
    /// The day template is deduplicated and sorted so assembly order is
    /// stable regardless of input order.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(enabled) = patch.global_enabled {
            self.global_enabled = enabled;
        }
        if let Some(amount) = patch.default_amount {
            self.default_amount = amount;
        }
        if let Some(times) = patch.slots_per_day {
            self.slots_per_day = normalise_template(times);
        }
        if let Some(toggles) = patch.slot_toggles {
            self.slot_toggles = toggles;
        }
        if let Some(amounts) = patch.slot_amounts {
            self.slot_amounts = amounts;
        }
        if let Some(overrides) = patch.date_overrides {
            self.date_overrides = overrides;
        }
    }

    /// Add a time to the day template, keeping it sorted and unique.
    pub fn add_template_time(&mut self, time: SlotTime) {
        if !self.slots_per_day.contains(&time) {
            self.slots_per_day.push(time);
            self.slots_per_day.sort();
        }
    }

    /// Remove a time from the day template.
    pub fn remove_template_time(&mut self, time: SlotTime) {
        self.slots_per_day.retain(|t| *t != time);
    }

    /// Record a per-time activity toggle.
    pub fn toggle_time(&mut self, time: SlotTime, is_active: bool) {
        self.slot_toggles.insert(time, is_active);
    }

    /// Record a per-time price override.
    pub fn set_time_amount(&mut self, time: SlotTime, amount: Money) {
        self.slot_amounts.insert(time, amount);
    }

    /// Record (or extend) a per-date price override.
    pub fn set_date_amount(&mut self, date: NaiveDate, amount: Money) {
        self.date_overrides.entry(date).or_default().amount = Some(amount);
    }
}

/// Parse and normalise a raw day template as received from clients.
pub fn parse_template(raw: &[String]) -> Result<Vec<SlotTime>, SlotTimeParseError> {
    let times = raw
        .iter()
        .map(|s| SlotTime::parse(s))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(normalise_template(times))
}

fn normalise_template(mut times: Vec<SlotTime>) -> Vec<SlotTime> {
    times.sort();
    times.dedup();
    times
}
