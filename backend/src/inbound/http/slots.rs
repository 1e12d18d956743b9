//! Slot availability and admin slot-editing handlers.
//!
//! ```text
//! GET    /api/v1/slots?date=2025-10-12[&available=true]
//! POST   /api/v1/admin/slots
//! PATCH  /api/v1/admin/slots/{date}/{time}
//! DELETE /api/v1/admin/slots/{date}/{time}
//! ```

use actix_web::{delete, get, patch, post, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::ports::SlotPatch;
use crate::domain::slots::{AssembledSlot, SlotRecord, SlotStatus, SlotTime};
use crate::domain::{Error, Money};
use crate::inbound::http::identity::Identity;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::ApiResult;

/// Query parameters for the availability endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    /// ISO date to assemble.
    pub date: String,
    /// When true, only bookable slots are returned.
    #[serde(default)]
    pub available: bool,
}

/// One slot in an availability response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    /// Persisted row id, absent for virtual slots.
    #[schema(format = "uuid")]
    pub slot_id: Option<Uuid>,
    /// Calendar date.
    pub date: NaiveDate,
    /// Interval start, `HH:MM`.
    #[schema(example = "09:00")]
    pub start_time: String,
    /// Interval end, `HH:MM`.
    #[schema(example = "10:00")]
    pub end_time: String,
    /// Effective price in major units.
    #[schema(value_type = i64, example = 20000)]
    pub amount: Money,
    /// Lifecycle state.
    #[schema(value_type = String, example = "available")]
    pub status: SlotStatus,
    /// Effective activity flag.
    pub is_active: bool,
    /// Owning booking, when held or booked.
    #[schema(format = "uuid")]
    pub booking_id: Option<Uuid>,
}

impl From<AssembledSlot> for SlotView {
    fn from(slot: AssembledSlot) -> Self {
        Self {
            slot_id: slot.id,
            date: slot.date,
            start_time: slot.start_time.to_string(),
            end_time: slot.end_time.to_string(),
            amount: slot.amount,
            status: slot.status,
            is_active: slot.is_active,
            booking_id: slot.booking_id,
        }
    }
}

impl From<SlotRecord> for SlotView {
    fn from(record: SlotRecord) -> Self {
        Self {
            slot_id: Some(record.id),
            date: record.date,
            start_time: record.start_time.to_string(),
            end_time: record.end_time.to_string(),
            amount: record.amount,
            status: record.status,
            is_active: record.is_active,
            booking_id: record.booking_id,
        }
    }
}

/// Admin patch body for a single slot.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotPatchBody {
    /// New price, major units.
    #[schema(value_type = Option<i64>)]
    pub amount: Option<Money>,
    /// New activity flag.
    pub is_active: Option<bool>,
    /// New status string.
    #[schema(example = "unavailable")]
    pub status: Option<String>,
}

/// Admin body for explicit slot creation.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlotBody {
    /// Calendar date.
    pub date: String,
    /// Interval start, `HH:MM`.
    #[schema(example = "09:00")]
    pub start_time: String,
    /// Price override, major units.
    #[schema(value_type = Option<i64>)]
    pub amount: Option<Money>,
    /// Activity override.
    pub is_active: Option<bool>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| Error::invalid_request(format!("Invalid date {raw:?}; expected YYYY-MM-DD")))
}

pub(crate) fn parse_time(raw: &str) -> Result<SlotTime, Error> {
    SlotTime::parse(raw)
        .map_err(|_| Error::invalid_request(format!("Invalid time {raw:?}; expected HH:MM")))
}

fn parse_patch(body: SlotPatchBody) -> Result<SlotPatch, Error> {
    let status = body
        .status
        .map(|raw| {
            raw.parse::<SlotStatus>()
                .map_err(|_| Error::invalid_request(format!("Unknown slot status {raw:?}")))
        })
        .transpose()?;
    Ok(SlotPatch {
        amount: body.amount,
        is_active: body.is_active,
        status,
    })
}

/// List a date's slots.
#[utoipa::path(
    get,
    path = "/api/v1/slots",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Ordered slot sequence", body = [SlotView]),
        (status = 400, description = "Invalid date", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["slots"],
    operation_id = "getSlots"
)]
#[get("/slots")]
pub async fn get_slots(
    state: web::Data<HttpState>,
    query: web::Query<AvailabilityQuery>,
) -> ApiResult<web::Json<Vec<SlotView>>> {
    let date = parse_date(&query.date)?;
    let slots = if query.available {
        state.availability.bookable_day(date).await?
    } else {
        state.availability.day(date).await?
    };
    Ok(web::Json(slots.into_iter().map(SlotView::from).collect()))
}

/// Create a slot row explicitly (admin).
#[utoipa::path(
    post,
    path = "/api/v1/admin/slots",
    request_body = CreateSlotBody,
    responses(
        (status = 200, description = "Created slot", body = SlotView),
        (status = 403, description = "Admin role required", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 409, description = "Slot already exists", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "createSlot",
    security(("SessionCookie" = []))
)]
#[post("/admin/slots")]
pub async fn create_slot(
    state: web::Data<HttpState>,
    identity: Identity,
    body: web::Json<CreateSlotBody>,
) -> ApiResult<web::Json<SlotView>> {
    identity.require_admin()?;
    let body = body.into_inner();
    let date = parse_date(&body.date)?;
    let time = parse_time(&body.start_time)?;
    let record = state
        .slot_admin
        .create_slot(
            date,
            time,
            SlotPatch {
                amount: body.amount,
                is_active: body.is_active,
                status: None,
            },
        )
        .await?;
    Ok(web::Json(record.into()))
}

/// Edit a slot row (admin), materialising it if needed.
#[utoipa::path(
    patch,
    path = "/api/v1/admin/slots/{date}/{time}",
    request_body = SlotPatchBody,
    responses(
        (status = 200, description = "Updated slot", body = SlotView),
        (status = 403, description = "Admin role required or slot booked", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "updateSlot",
    security(("SessionCookie" = []))
)]
#[patch("/admin/slots/{date}/{time}")]
pub async fn update_slot(
    state: web::Data<HttpState>,
    identity: Identity,
    path: web::Path<(String, String)>,
    body: web::Json<SlotPatchBody>,
) -> ApiResult<web::Json<SlotView>> {
    identity.require_admin()?;
    let (raw_date, raw_time) = path.into_inner();
    let date = parse_date(&raw_date)?;
    let time = parse_time(&raw_time)?;
    let patch = parse_patch(body.into_inner())?;
    let record = state.slot_admin.update_slot(date, time, patch).await?;
    Ok(web::Json(record.into()))
}

/// Delete a slot row (admin).
#[utoipa::path(
    delete,
    path = "/api/v1/admin/slots/{date}/{time}",
    responses(
        (status = 204, description = "Slot deleted"),
        (status = 403, description = "Admin role required or slot booked", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 404, description = "No such slot", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "deleteSlot",
    security(("SessionCookie" = []))
)]
#[delete("/admin/slots/{date}/{time}")]
pub async fn delete_slot(
    state: web::Data<HttpState>,
    identity: Identity,
    path: web::Path<(String, String)>,
) -> ApiResult<actix_web::HttpResponse> {
    identity.require_admin()?;
    let (raw_date, raw_time) = path.into_inner();
    let date = parse_date(&raw_date)?;
    let time = parse_time(&raw_time)?;
    state.slot_admin.delete_slot(date, time).await?;
    Ok(actix_web::HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn parses_iso_dates() {
        assert!(parse_date("2025-10-12").is_ok());
        assert!(parse_date("12/10/2025").is_err());
        assert!(parse_date("").is_err());
    }

    #[rstest]
    fn patch_rejects_unknown_status_strings() {
        let body = SlotPatchBody {
            amount: None,
            is_active: None,
            status: Some("paid".to_owned()),
        };
        assert!(parse_patch(body).is_err());
    }

    #[rstest]
    fn patch_decodes_known_status_strings() {
        let body = SlotPatchBody {
            amount: Some(Money::new(25000)),
            is_active: Some(false),
            status: Some("unavailable".to_owned()),
        };
        let patch = parse_patch(body).expect("patch decodes");
        assert_eq!(patch.status, Some(SlotStatus::Unavailable));
        assert_eq!(patch.amount, Some(Money::new(25000)));
    }
}
