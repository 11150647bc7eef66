use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agenda_core::identity::IdentityHeaders;
use agenda_core::serde::to_rfc3339_ms;
use agenda_domain::booking::{BookingStatus, TokenAction};
use agenda_domain::id::ServiceId;
use agenda_domain::time::{parse_local_datetime, resolve_timezone};

use crate::domain::types::{Booking, SideEffect};
use crate::error::BookingServiceError;
use crate::handlers::caller::require_admin;
use crate::state::AppState;
use crate::usecase::action_token::{IssueTokenInput, IssueTokenUseCase};
use crate::usecase::booking::{
    CancelBookingUseCase, Caller, CreateBookingInput, CreateBookingUseCase, Credential,
    GetBookingUseCase, RescheduleBookingUseCase, RescheduleInput, SetStatusUseCase,
    normalize_code,
};
use crate::usecase::dispatch::{ScheduleMessageInput, ScheduleMessageUseCase};
use crate::usecase::notify::ManageLinks;
use crate::usecase::rate_limit::RateClass;

#[derive(Serialize)]
pub struct BookingView {
    pub id: Uuid,
    pub code: String,
    pub service_id: i32,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub start_at: DateTime<Utc>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub end_at: DateTime<Utc>,
    pub timezone: String,
    pub status: BookingStatus,
    pub calendar_event_id: Option<String>,
    pub meeting_id: Option<String>,
    pub meeting_join_url: Option<String>,
    pub notes: String,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingView {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id.0,
            code: b.code.0,
            service_id: b.service_id.0,
            client_name: b.client_name,
            client_email: b.client_email,
            client_phone: b.client_phone,
            start_at: b.start_at,
            end_at: b.end_at,
            timezone: b.timezone,
            status: b.status,
            calendar_event_id: b.refs.calendar_event_id,
            meeting_id: b.refs.meeting_id,
            meeting_join_url: b.refs.meeting_join_url,
            notes: b.notes,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

// ── POST /bookings ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub service_id: i32,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    #[serde(alias = "start_instant")]
    pub start: String,
    pub timezone: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Serialize)]
pub struct CreateBookingResponse {
    pub success: bool,
    pub booking: BookingView,
    pub cancel_token: Option<String>,
    pub reschedule_token: Option<String>,
    pub links: Option<ManageLinks>,
    pub side_effects: Vec<SideEffect>,
}

pub async fn create_booking(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, BookingServiceError> {
    let is_admin = matches!(caller.credential, Credential::Admin);
    if !is_admin {
        state
            .limiter()
            .check(RateClass::PublicAction, &caller.ip)
            .await?;
    }

    let usecase = CreateBookingUseCase {
        services: state.service_repo(),
        bookings: state.booking_repo(),
        tokens: state.token_repo(),
        queue: state.message_repo(),
        calendar: state.calendar.clone(),
        meeting: state.meeting.clone(),
        notifier: state.notifier(),
        public_base_url: state.policy.public_base_url.clone(),
        auto_confirm: state.policy.auto_confirm,
        default_tz: state.policy.default_tz,
    };
    let output = usecase
        .execute(
            CreateBookingInput {
                service_id: ServiceId(body.service_id),
                client_name: body.client_name,
                client_email: body.client_email,
                client_phone: body.client_phone,
                start: body.start,
                timezone: body.timezone,
                notes: body.notes,
                confirm: is_admin && body.confirm,
                ip_address: Some(caller.ip),
            },
            state.clock.now(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            success: true,
            booking: output.booking.into(),
            cancel_token: output.cancel_token,
            reschedule_token: output.reschedule_token,
            links: output.links,
            side_effects: output.side_effects,
        }),
    ))
}

// ── GET /bookings/{code} ─────────────────────────────────────────────────────

pub async fn get_booking(
    State(state): State<AppState>,
    identity: IdentityHeaders,
    Path(code): Path<String>,
) -> Result<Json<BookingView>, BookingServiceError> {
    require_admin(&identity)?;
    let usecase = GetBookingUseCase {
        bookings: state.booking_repo(),
    };
    let booking = usecase.execute(&normalize_code(&code)).await?;
    Ok(Json(booking.into()))
}

// ── PATCH /bookings/{code}/status ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

pub async fn set_status(
    State(state): State<AppState>,
    identity: IdentityHeaders,
    Path(code): Path<String>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<BookingView>, BookingServiceError> {
    require_admin(&identity)?;
    let status: BookingStatus = body
        .status
        .trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| BookingServiceError::WrongState)?;
    let usecase = SetStatusUseCase {
        bookings: state.booking_repo(),
    };
    let booking = usecase
        .execute(&normalize_code(&code), status, state.clock.now())
        .await?;
    Ok(Json(booking.into()))
}

// ── POST /bookings/{code}/tokens ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct IssueTokenRequest {
    pub action: String,
    pub ttl_hours: Option<i64>,
}

#[derive(Serialize)]
pub struct IssueTokenResponse {
    pub token: String,
    pub action: TokenAction,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub expires_at: DateTime<Utc>,
}

pub async fn issue_token(
    State(state): State<AppState>,
    identity: IdentityHeaders,
    caller: Caller,
    Path(code): Path<String>,
    Json(body): Json<IssueTokenRequest>,
) -> Result<impl IntoResponse, BookingServiceError> {
    require_admin(&identity)?;
    let action: TokenAction = body
        .action
        .trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| BookingServiceError::InvalidAction)?;

    let booking = GetBookingUseCase {
        bookings: state.booking_repo(),
    }
    .execute(&normalize_code(&code))
    .await?;

    let usecase = IssueTokenUseCase {
        bookings: state.booking_repo(),
        tokens: state.token_repo(),
    };
    let token = usecase
        .execute(
            IssueTokenInput {
                booking_id: booking.id,
                action,
                ttl_hours: body.ttl_hours,
                ip_address: Some(caller.ip),
            },
            state.clock.now(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IssueTokenResponse {
            token: token.token,
            action: token.action,
            expires_at: token.expires_at,
        }),
    ))
}

// ── POST /bookings/{code}/messages ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct ScheduleMessageRequest {
    pub message_type: Option<String>,
    /// Defaults to the client's phone number.
    pub recipient: Option<String>,
    pub body: String,
    pub media_url: Option<String>,
    /// Local date-time in `timezone` (or the booking's zone), or RFC 3339.
    pub send_at: String,
    pub timezone: Option<String>,
}

#[derive(Serialize)]
pub struct ScheduleMessageResponse {
    pub id: Uuid,
    pub message_type: String,
    pub recipient: String,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub send_at: DateTime<Utc>,
    pub status: &'static str,
}

pub async fn schedule_message(
    State(state): State<AppState>,
    identity: IdentityHeaders,
    Path(code): Path<String>,
    Json(body): Json<ScheduleMessageRequest>,
) -> Result<impl IntoResponse, BookingServiceError> {
    require_admin(&identity)?;
    let booking = GetBookingUseCase {
        bookings: state.booking_repo(),
    }
    .execute(&normalize_code(&code))
    .await?;

    let booking_tz = booking.tz(state.policy.default_tz);
    let tz = body
        .timezone
        .as_deref()
        .map_or(booking_tz, |name| resolve_timezone(name, booking_tz));
    let send_at = parse_local_datetime(&body.send_at, tz).ok_or(BookingServiceError::InvalidDate)?;
    if send_at <= state.clock.now() {
        return Err(BookingServiceError::PastDate);
    }
    let recipient = body
        .recipient
        .or_else(|| booking.client_phone.clone())
        .ok_or(BookingServiceError::MissingData)?;

    let usecase = ScheduleMessageUseCase {
        queue: state.message_repo(),
    };
    let message = usecase
        .execute(ScheduleMessageInput {
            booking_id: booking.id,
            message_type: body.message_type.unwrap_or_else(|| "custom".to_owned()),
            recipient,
            body: body.body,
            media_url: body.media_url,
            send_at,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ScheduleMessageResponse {
            id: message.id,
            message_type: message.message_type,
            recipient: message.recipient,
            send_at: message.send_at,
            status: message.status.as_str(),
        }),
    ))
}

// ── POST /bookings/{code}/cancel ─────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct MutationResponse {
    pub success: bool,
    pub message: &'static str,
    pub code: String,
    pub status: BookingStatus,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub start_at: DateTime<Utc>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub end_at: DateTime<Utc>,
    pub side_effects: Vec<SideEffect>,
}

impl MutationResponse {
    fn new(message: &'static str, booking: Booking, side_effects: Vec<SideEffect>) -> Self {
        Self {
            success: true,
            message,
            code: booking.code.0,
            status: booking.status,
            start_at: booking.start_at,
            end_at: booking.end_at,
            side_effects,
        }
    }
}

/// The body is optional; an empty one means no reason.
fn cancel_request(body: &Bytes) -> Result<CancelRequest, BookingServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CancelRequest::default());
    }
    serde_json::from_slice(body).map_err(|_| BookingServiceError::MissingData)
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(code): Path<String>,
    body: Bytes,
) -> Result<Json<MutationResponse>, BookingServiceError> {
    let request = cancel_request(&body)?;
    let now = state.clock.now();
    let booking = state
        .authorizer()
        .execute(&caller, &normalize_code(&code), TokenAction::Cancel, now)
        .await?;

    let usecase = CancelBookingUseCase {
        bookings: state.booking_repo(),
        calendar: state.calendar.clone(),
        meeting: state.meeting.clone(),
        notifier: state.notifier(),
    };
    let output = usecase.execute(booking, request.reason, now).await?;
    Ok(Json(MutationResponse::new(
        "Booking cancelled.",
        output.booking,
        output.side_effects,
    )))
}

// ── POST /bookings/{code}/reschedule ─────────────────────────────────────────

#[derive(Deserialize)]
pub struct RescheduleRequest {
    #[serde(alias = "new_start_instant")]
    pub new_start: String,
    pub timezone: Option<String>,
}

pub async fn reschedule_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(code): Path<String>,
    Json(body): Json<RescheduleRequest>,
) -> Result<Json<MutationResponse>, BookingServiceError> {
    let now = state.clock.now();
    let booking = state
        .authorizer()
        .execute(&caller, &normalize_code(&code), TokenAction::Reschedule, now)
        .await?;

    let usecase = RescheduleBookingUseCase {
        bookings: state.booking_repo(),
        services: state.service_repo(),
        calendar: state.calendar.clone(),
        meeting: state.meeting.clone(),
        notifier: state.notifier(),
        default_tz: state.policy.default_tz,
    };
    let output = usecase
        .execute(
            booking,
            RescheduleInput {
                new_start: body.new_start,
                timezone: body.timezone,
            },
            now,
        )
        .await?;
    Ok(Json(MutationResponse::new(
        "Booking rescheduled.",
        output.booking,
        output.side_effects,
    )))
}
