use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use agenda_core::identity::IdentityHeaders;
use agenda_domain::id::ServiceId;

use crate::domain::types::Availability;
use crate::error::BookingServiceError;
use crate::handlers::caller::require_admin;
use crate::state::AppState;
use crate::usecase::availability::{AvailabilityQuery, SyncAvailabilityUseCase};
use crate::usecase::slots::preview_slots;

// ── GET /availability ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AvailabilityParams {
    pub date: String,
    pub timezone: Option<String>,
    pub service_id: Option<i32>,
}

pub async fn get_availability(
    State(state): State<AppState>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Availability>, BookingServiceError> {
    let date = NaiveDate::parse_from_str(params.date.trim(), "%Y-%m-%d")
        .map_err(|_| BookingServiceError::InvalidDate)?;

    let usecase = SyncAvailabilityUseCase {
        hours: state.hours_repo(),
        services: state.service_repo(),
        bookings: state.booking_repo(),
        calendar: state.calendar.clone(),
        cache: state.availability_cache(),
        default_tz: state.policy.default_tz,
    };
    let availability = usecase
        .execute(AvailabilityQuery {
            date,
            timezone: params.timezone,
            service_id: params.service_id.map(ServiceId),
        })
        .await;
    Ok(Json(availability))
}

// ── GET /slots/preview ───────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PreviewParams {
    pub open: String,
    pub close: String,
    pub slot_minutes: Option<i64>,
}

#[derive(Serialize)]
pub struct PreviewResponse {
    pub slots: Vec<String>,
}

fn parse_time(raw: &str) -> Result<NaiveTime, BookingServiceError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| BookingServiceError::MissingData)
}

pub async fn preview(
    identity: IdentityHeaders,
    Query(params): Query<PreviewParams>,
) -> Result<Json<PreviewResponse>, BookingServiceError> {
    require_admin(&identity)?;
    let open = parse_time(&params.open)?;
    let close = parse_time(&params.close)?;
    let slots = preview_slots(open, close, params.slot_minutes.unwrap_or(30));
    Ok(Json(PreviewResponse { slots }))
}
