//! Admin slot-settings handlers.
//!
//! ```text
//! GET   /api/v1/admin/slot-settings
//! PATCH /api/v1/admin/slot-settings
//! PATCH /api/v1/admin/slot-settings/amount
//! PATCH /api/v1/admin/slot-settings/toggles
//! POST  /api/v1/admin/slot-settings/times
//! DELETE /api/v1/admin/slot-settings/times/{time}
//! ```

use std::collections::BTreeMap;

use actix_web::{delete, get, patch, post, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::slots::{parse_template, DateOverride, SettingsPatch, SlotSettings, SlotTime};
use crate::domain::{AmountScope, Error, Money};
use crate::inbound::http::identity::Identity;
use crate::inbound::http::slots::{parse_date, parse_time};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::ApiResult;

/// Partial settings update body.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatchBody {
    /// Master availability switch.
    pub global_enabled: Option<bool>,
    /// Default slot price, major units.
    #[schema(value_type = Option<i64>)]
    pub default_amount: Option<Money>,
    /// Replacement day template of `HH:MM` strings.
    #[schema(example = json!(["07:00", "08:00", "09:00"]))]
    pub slots_per_day: Option<Vec<String>>,
    /// Per-time activity overrides.
    pub slot_toggles: Option<BTreeMap<String, bool>>,
    /// Per-time price overrides, major units.
    #[schema(value_type = Option<Object>)]
    pub slot_amounts: Option<BTreeMap<String, Money>>,
    /// Per-date overrides keyed by ISO date.
    pub date_overrides: Option<BTreeMap<String, DateOverrideBody>>,
}

/// One per-date override in a settings patch.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DateOverrideBody {
    /// Price override, major units.
    #[schema(value_type = Option<i64>)]
    pub amount: Option<Money>,
    /// Activity override.
    pub is_active: Option<bool>,
}

/// Scoped amount update body.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AmountUpdateBody {
    /// Target layer: `global`, `time` or `date`.
    #[schema(example = "time")]
    pub scope: String,
    /// The time or date the scope targets; unused for `global`.
    #[schema(example = "09:00")]
    pub key: Option<String>,
    /// New amount, major units.
    #[schema(value_type = i64, example = 25000)]
    pub amount: Money,
}

/// Per-time toggle body.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToggleTimeBody {
    /// Template time to toggle.
    #[schema(example = "09:00")]
    pub time: String,
    /// New activity flag.
    pub is_active: bool,
}

/// Template time addition body.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddTimeBody {
    /// Time to add to the day template.
    #[schema(example = "21:00")]
    pub time: String,
}

/// Settings as returned to admins.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    /// Master availability switch.
    pub global_enabled: bool,
    /// Default slot price, major units.
    #[schema(value_type = i64)]
    pub default_amount: Money,
    /// Day template.
    #[schema(example = json!(["07:00", "08:00"]))]
    pub slots_per_day: Vec<String>,
    /// Per-time activity overrides.
    pub slot_toggles: BTreeMap<String, bool>,
    /// Per-time price overrides.
    #[schema(value_type = Object)]
    pub slot_amounts: BTreeMap<String, Money>,
    /// Per-date overrides.
    #[schema(value_type = Object)]
    pub date_overrides: BTreeMap<String, DateOverride>,
}

impl From<SlotSettings> for SettingsView {
    fn from(settings: SlotSettings) -> Self {
        Self {
            global_enabled: settings.global_enabled,
            default_amount: settings.default_amount,
            slots_per_day: settings
                .slots_per_day
                .iter()
                .map(ToString::to_string)
                .collect(),
            slot_toggles: settings
                .slot_toggles
                .into_iter()
                .map(|(time, flag)| (time.to_string(), flag))
                .collect(),
            slot_amounts: settings
                .slot_amounts
                .into_iter()
                .map(|(time, amount)| (time.to_string(), amount))
                .collect(),
            date_overrides: settings
                .date_overrides
                .into_iter()
                .map(|(date, value)| (date.to_string(), value))
                .collect(),
        }
    }
}

fn parse_time_map<V>(raw: BTreeMap<String, V>) -> Result<BTreeMap<SlotTime, V>, Error> {
    raw.into_iter()
        .map(|(key, value)| Ok((parse_time(&key)?, value)))
        .collect()
}

fn parse_patch(body: SettingsPatchBody) -> Result<SettingsPatch, Error> {
    let slots_per_day = body
        .slots_per_day
        .map(|raw| {
            parse_template(&raw)
                .map_err(|err| Error::invalid_request(format!("Invalid day template: {err}")))
        })
        .transpose()?;
    let date_overrides = body
        .date_overrides
        .map(|raw| {
            raw.into_iter()
                .map(|(key, value)| {
                    let date: NaiveDate = parse_date(&key)?;
                    Ok((
                        date,
                        DateOverride {
                            amount: value.amount,
                            is_active: value.is_active,
                        },
                    ))
                })
                .collect::<Result<BTreeMap<_, _>, Error>>()
        })
        .transpose()?;
    Ok(SettingsPatch {
        global_enabled: body.global_enabled,
        default_amount: body.default_amount,
        slots_per_day,
        slot_toggles: body.slot_toggles.map(parse_time_map).transpose()?,
        slot_amounts: body.slot_amounts.map(parse_time_map).transpose()?,
        date_overrides,
    })
}

fn parse_scope(scope: &str, key: Option<&str>) -> Result<AmountScope, Error> {
    match scope {
        "global" => Ok(AmountScope::Global),
        "time" => {
            let key = key.ok_or_else(|| Error::invalid_request("Time scope requires a key"))?;
            Ok(AmountScope::Time(parse_time(key)?))
        }
        "date" => {
            let key = key.ok_or_else(|| Error::invalid_request("Date scope requires a key"))?;
            Ok(AmountScope::Date(parse_date(key)?))
        }
        other => Err(Error::invalid_request(format!(
            "Unknown amount scope {other:?}; expected global, time or date"
        ))),
    }
}

/// Read the active settings (admin).
#[utoipa::path(
    get,
    path = "/api/v1/admin/slot-settings",
    responses(
        (status = 200, description = "Active settings", body = SettingsView),
        (status = 403, description = "Admin role required", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "getSettings",
    security(("SessionCookie" = []))
)]
#[get("/admin/slot-settings")]
pub async fn get_settings(
    state: web::Data<HttpState>,
    identity: Identity,
) -> ApiResult<web::Json<SettingsView>> {
    identity.require_admin()?;
    Ok(web::Json(state.settings.effective().await?.into()))
}

/// Merge a partial update into the settings (admin).
#[utoipa::path(
    patch,
    path = "/api/v1/admin/slot-settings",
    request_body = SettingsPatchBody,
    responses(
        (status = 200, description = "Merged settings", body = SettingsView),
        (status = 400, description = "Invalid patch", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 403, description = "Admin role required", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "updateSettings",
    security(("SessionCookie" = []))
)]
#[patch("/admin/slot-settings")]
pub async fn update_settings(
    state: web::Data<HttpState>,
    identity: Identity,
    body: web::Json<SettingsPatchBody>,
) -> ApiResult<web::Json<SettingsView>> {
    identity.require_admin()?;
    let patch = parse_patch(body.into_inner())?;
    Ok(web::Json(state.settings.update(patch).await?.into()))
}

/// Update an amount at one override layer (admin).
#[utoipa::path(
    patch,
    path = "/api/v1/admin/slot-settings/amount",
    request_body = AmountUpdateBody,
    responses(
        (status = 200, description = "Updated settings", body = SettingsView),
        (status = 400, description = "Unknown scope", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "updateAmount",
    security(("SessionCookie" = []))
)]
#[patch("/admin/slot-settings/amount")]
pub async fn update_amount(
    state: web::Data<HttpState>,
    identity: Identity,
    body: web::Json<AmountUpdateBody>,
) -> ApiResult<web::Json<SettingsView>> {
    identity.require_admin()?;
    let body = body.into_inner();
    let scope = parse_scope(&body.scope, body.key.as_deref())?;
    Ok(web::Json(
        state.settings.set_amount(scope, body.amount).await?.into(),
    ))
}

/// Toggle one template time (admin).
#[utoipa::path(
    patch,
    path = "/api/v1/admin/slot-settings/toggles",
    request_body = ToggleTimeBody,
    responses(
        (status = 200, description = "Updated settings", body = SettingsView)
    ),
    tags = ["admin"],
    operation_id = "toggleTime",
    security(("SessionCookie" = []))
)]
#[patch("/admin/slot-settings/toggles")]
pub async fn toggle_time(
    state: web::Data<HttpState>,
    identity: Identity,
    body: web::Json<ToggleTimeBody>,
) -> ApiResult<web::Json<SettingsView>> {
    identity.require_admin()?;
    let body = body.into_inner();
    let time = parse_time(&body.time)?;
    Ok(web::Json(
        state
            .settings
            .toggle_time(time, body.is_active)
            .await?
            .into(),
    ))
}

/// Add a time to the day template (admin).
#[utoipa::path(
    post,
    path = "/api/v1/admin/slot-settings/times",
    request_body = AddTimeBody,
    responses(
        (status = 200, description = "Updated settings", body = SettingsView)
    ),
    tags = ["admin"],
    operation_id = "addTemplateTime",
    security(("SessionCookie" = []))
)]
#[post("/admin/slot-settings/times")]
pub async fn add_template_time(
    state: web::Data<HttpState>,
    identity: Identity,
    body: web::Json<AddTimeBody>,
) -> ApiResult<web::Json<SettingsView>> {
    identity.require_admin()?;
    let time = parse_time(&body.time)?;
    Ok(web::Json(
        state.settings.add_template_time(time).await?.into(),
    ))
}

/// Remove a time from the day template (admin).
#[utoipa::path(
    delete,
    path = "/api/v1/admin/slot-settings/times/{time}",
    responses(
        (status = 200, description = "Updated settings", body = SettingsView)
    ),
    tags = ["admin"],
    operation_id = "removeTemplateTime",
    security(("SessionCookie" = []))
)]
#[delete("/admin/slot-settings/times/{time}")]
pub async fn remove_template_time(
    state: web::Data<HttpState>,
    identity: Identity,
    path: web::Path<String>,
) -> ApiResult<web::Json<SettingsView>> {
    identity.require_admin()?;
    let time = parse_time(&path.into_inner())?;
    Ok(web::Json(
        state.settings.remove_template_time(time).await?.into(),
    ))
}
