use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rand::RngExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use agenda_domain::booking::{BookingStatus, TokenAction};
use agenda_domain::id::{BookingCode, BookingId, ServiceId};
use agenda_domain::time::{parse_local_datetime, resolve_timezone};

use crate::domain::repository::{
    ActionTokenRepository, BookingRepository, CalendarPort, CounterStore, MailPort, MeetingPort,
    MessagingPort, ScheduledMessageRepository, ServiceRepository,
};
use crate::domain::types::{
    Booking, CODE_ALPHABET, CODE_LEN, EventDraft, ExternalRefs, MAX_CODE_ATTEMPTS, MeetingDraft,
    REMINDER_OFFSET_HOURS, SideEffect, SideEffectTarget, TOKEN_TTL_HOURS,
};
use crate::error::BookingServiceError;
use crate::usecase::action_token::{ValidateTokenUseCase, new_token};
use crate::usecase::availability::{conflicts, remote_busy_or_empty};
use crate::usecase::dispatch::{ScheduleMessageInput, pending_message};
use crate::usecase::notify::{ManageLinks, Notifier, manage_links, reminder_message};
use crate::usecase::rate_limit::{RateClass, RateLimiter};

pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Codes are case-insensitive on input.
pub fn normalize_code(raw: &str) -> BookingCode {
    BookingCode(raw.trim().to_ascii_uppercase())
}

async fn unique_code<B: BookingRepository>(
    bookings: &B,
) -> Result<BookingCode, BookingServiceError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_code();
        if !bookings.code_exists(&code).await? {
            return Ok(BookingCode(code));
        }
    }
    Err(anyhow::anyhow!("no free booking code after {MAX_CODE_ATTEMPTS} attempts").into())
}

fn event_draft(booking: &Booking, service_name: &str, tz: Tz) -> EventDraft {
    EventDraft {
        summary: format!("{service_name} - {}", booking.client_name),
        description: format!(
            "Booking {}\nClient: {} <{}>\nPhone: {}",
            booking.code,
            booking.client_name,
            booking.client_email,
            booking.client_phone.as_deref().unwrap_or("-"),
        ),
        start: booking.start_at,
        end: booking.end_at,
        timezone: tz,
        attendee_email: Some(booking.client_email.clone()),
    }
}

/// Output shared by cancel and reschedule.
#[derive(Debug)]
pub struct MutationOutput {
    pub booking: Booking,
    pub side_effects: Vec<SideEffect>,
}

// ── AuthorizeMutation ────────────────────────────────────────────────────────

/// How the caller of a public mutation proved its right to act.
#[derive(Debug, Clone)]
pub enum Credential {
    Admin,
    Token(String),
    Anonymous,
}

#[derive(Debug, Clone)]
pub struct Caller {
    pub credential: Credential,
    pub ip: String,
}

pub struct AuthorizeMutationUseCase<B, T, K, M>
where
    B: BookingRepository,
    T: ActionTokenRepository,
    K: CounterStore,
    M: MailPort,
{
    pub bookings: B,
    pub limiter: RateLimiter<K>,
    pub validator: ValidateTokenUseCase<T, K, M>,
}

impl<B, T, K, M> AuthorizeMutationUseCase<B, T, K, M>
where
    B: BookingRepository,
    T: ActionTokenRepository,
    K: CounterStore,
    M: MailPort,
{
    /// Resolve the booking `code` refers to, checking that `caller` may
    /// perform `action` on it. A token is consumed here, before any state
    /// check on the booking.
    pub async fn execute(
        &self,
        caller: &Caller,
        code: &BookingCode,
        action: TokenAction,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingServiceError> {
        let token = match &caller.credential {
            Credential::Admin => {
                return self
                    .bookings
                    .find_by_code(code)
                    .await?
                    .ok_or(BookingServiceError::BookingNotFound);
            }
            Credential::Anonymous => return Err(BookingServiceError::MissingToken),
            Credential::Token(token) => token,
        };

        self.limiter.check(RateClass::PublicAction, &caller.ip).await?;
        let bound = self.validator.execute(token, action, &caller.ip, now).await?;

        let booking = self
            .bookings
            .find_by_code(code)
            .await?
            .ok_or(BookingServiceError::BookingNotFound)?;
        if booking.id != bound {
            warn!(
                code = %code,
                booking_id = %booking.id,
                token_booking_id = %bound,
                ip = %caller.ip,
                "action token bound to a different booking"
            );
            return Err(BookingServiceError::TokenMismatch);
        }
        Ok(booking)
    }
}

// ── CreateBooking ────────────────────────────────────────────────────────────

pub struct CreateBookingInput {
    pub service_id: ServiceId,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    /// Local date-time in `timezone`, or RFC 3339.
    pub start: String,
    pub timezone: Option<String>,
    pub notes: Option<String>,
    /// Admin request to skip the pending state.
    pub confirm: bool,
    pub ip_address: Option<String>,
}

#[derive(Debug)]
pub struct CreateBookingOutput {
    pub booking: Booking,
    pub cancel_token: Option<String>,
    pub reschedule_token: Option<String>,
    pub links: Option<ManageLinks>,
    pub side_effects: Vec<SideEffect>,
}

pub struct CreateBookingUseCase<S, B, T, Q, C, V, W, E>
where
    S: ServiceRepository,
    B: BookingRepository,
    T: ActionTokenRepository,
    Q: ScheduledMessageRepository,
    C: CalendarPort,
    V: MeetingPort,
    W: MessagingPort,
    E: MailPort,
{
    pub services: S,
    pub bookings: B,
    pub tokens: T,
    pub queue: Q,
    pub calendar: C,
    pub meeting: V,
    pub notifier: Notifier<W, E>,
    pub public_base_url: Option<String>,
    pub auto_confirm: bool,
    pub default_tz: Tz,
}

impl<S, B, T, Q, C, V, W, E> CreateBookingUseCase<S, B, T, Q, C, V, W, E>
where
    S: ServiceRepository,
    B: BookingRepository,
    T: ActionTokenRepository,
    Q: ScheduledMessageRepository,
    C: CalendarPort,
    V: MeetingPort,
    W: MessagingPort,
    E: MailPort,
{
    pub async fn execute(
        &self,
        input: CreateBookingInput,
        now: DateTime<Utc>,
    ) -> Result<CreateBookingOutput, BookingServiceError> {
        // 1. Required fields
        let client_name = input.client_name.trim().to_owned();
        let client_email = input.client_email.trim().to_owned();
        if client_name.is_empty() || !client_email.contains('@') || input.start.trim().is_empty() {
            return Err(BookingServiceError::MissingData);
        }
        let client_phone = input
            .client_phone
            .map(|p| p.trim().to_owned())
            .filter(|p| !p.is_empty());

        // 2. Service
        let service = self
            .services
            .find_by_id(input.service_id)
            .await?
            .filter(|s| s.active)
            .ok_or(BookingServiceError::ServiceNotFound)?;

        // 3. Time
        let tz = input
            .timezone
            .as_deref()
            .map_or(self.default_tz, |name| resolve_timezone(name, self.default_tz));
        let start_at =
            parse_local_datetime(&input.start, tz).ok_or(BookingServiceError::InvalidDate)?;
        if start_at <= now {
            return Err(BookingServiceError::PastDate);
        }
        let end_at = start_at + service.duration();

        // 4. Conflicts, with this service's buffers around existing commitments
        let window_start = start_at - Duration::days(1);
        let window_end = end_at + Duration::days(1);
        let local = self.bookings.list_busy(window_start, window_end).await?;
        let remote = remote_busy_or_empty(&self.calendar, window_start, window_end, tz).await;
        let buffers = service.buffers();
        if conflicts(start_at, end_at, &remote, buffers)
            || conflicts(start_at, end_at, &local, buffers)
        {
            return Err(BookingServiceError::SlotUnavailable);
        }

        // 5-6. Persist
        let code = unique_code(&self.bookings).await?;
        let status = if input.confirm || self.auto_confirm {
            BookingStatus::Confirmed
        } else {
            BookingStatus::Pending
        };
        let mut booking = Booking {
            id: BookingId(Uuid::now_v7()),
            code,
            service_id: service.id,
            client_name,
            client_email,
            client_phone,
            start_at,
            end_at,
            timezone: tz.name().to_owned(),
            status,
            refs: ExternalRefs::default(),
            notes: input.notes.unwrap_or_default().trim().to_owned(),
            created_at: now,
            updated_at: now,
        };
        self.bookings.create(&booking).await?;
        info!(
            booking_id = %booking.id,
            code = %booking.code,
            status = %booking.status,
            "booking created"
        );

        // 7. Tokens. A failure leaves the booking without self-service links.
        let mut side_effects = Vec::new();
        let cancel_token = self
            .issue(booking.id, TokenAction::Cancel, input.ip_address.clone(), now)
            .await;
        let reschedule_token = self
            .issue(booking.id, TokenAction::Reschedule, input.ip_address, now)
            .await;
        side_effects.push(if cancel_token.is_some() && reschedule_token.is_some() {
            SideEffect::applied(SideEffectTarget::ActionTokens)
        } else {
            SideEffect::failed(SideEffectTarget::ActionTokens)
        });

        // 8. Best-effort side effects
        side_effects.push(self.create_meeting(&mut booking, &service.name, tz).await);
        side_effects.push(self.create_event(&mut booking, &service.name, tz).await);
        if booking.refs != ExternalRefs::default() {
            if let Err(e) = self
                .bookings
                .set_external_refs(booking.id, &booking.refs, now)
                .await
            {
                error!(booking_id = %booking.id, error = %e, "failed to store external references");
            }
        }

        let links = match (&self.public_base_url, &cancel_token, &reschedule_token) {
            (Some(base), Some(ct), Some(rt)) => {
                Some(manage_links(base, booking.code.as_str(), ct, rt))
            }
            _ => None,
        };
        side_effects.extend(
            self.notifier
                .booking_created(&booking, &service.name, links.as_ref())
                .await,
        );
        side_effects.push(self.schedule_reminder(&booking, &service.name, now).await);

        Ok(CreateBookingOutput {
            booking,
            cancel_token,
            reschedule_token,
            links,
            side_effects,
        })
    }

    async fn issue(
        &self,
        booking_id: BookingId,
        action: TokenAction,
        ip_address: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let token = new_token(booking_id, action, TOKEN_TTL_HOURS, ip_address, now);
        match self.tokens.create(&token).await {
            Ok(()) => Some(token.token),
            Err(e) => {
                error!(
                    booking_id = %booking_id,
                    action = %action,
                    error = %e,
                    "failed to issue action token"
                );
                None
            }
        }
    }

    async fn create_meeting(
        &self,
        booking: &mut Booking,
        service_name: &str,
        tz: Tz,
    ) -> SideEffect {
        if !self.meeting.is_configured() {
            return SideEffect::skipped(SideEffectTarget::Meeting);
        }
        let draft = MeetingDraft {
            topic: format!("{service_name} - {}", booking.client_name),
            start: booking.start_at,
            duration_minutes: booking.duration().num_minutes(),
            timezone: tz,
        };
        match self.meeting.create_meeting(&draft).await {
            Ok(info) => {
                booking.refs.meeting_id = Some(info.id);
                booking.refs.meeting_join_url = Some(info.join_url);
                SideEffect::applied(SideEffectTarget::Meeting)
            }
            Err(e) => {
                warn!(booking_id = %booking.id, error = %e, "meeting creation failed");
                SideEffect::failed(SideEffectTarget::Meeting)
            }
        }
    }

    async fn create_event(&self, booking: &mut Booking, service_name: &str, tz: Tz) -> SideEffect {
        if !self.calendar.is_configured() {
            return SideEffect::skipped(SideEffectTarget::Calendar);
        }
        let mut draft = event_draft(booking, service_name, tz);
        if let Some(url) = booking.refs.meeting_join_url.as_deref() {
            draft.description.push_str(&format!("\nVideo call: {url}"));
        }
        match self.calendar.create_event(&draft).await {
            Ok(event_id) => {
                booking.refs.calendar_event_id = Some(event_id);
                SideEffect::applied(SideEffectTarget::Calendar)
            }
            Err(e) => {
                warn!(booking_id = %booking.id, error = %e, "calendar event creation failed");
                SideEffect::failed(SideEffectTarget::Calendar)
            }
        }
    }

    async fn schedule_reminder(
        &self,
        booking: &Booking,
        service_name: &str,
        now: DateTime<Utc>,
    ) -> SideEffect {
        let send_at = booking.start_at - Duration::hours(REMINDER_OFFSET_HOURS);
        let Some(phone) = booking.client_phone.clone() else {
            return SideEffect::skipped(SideEffectTarget::Reminder);
        };
        if send_at <= now {
            return SideEffect::skipped(SideEffectTarget::Reminder);
        }
        let message = reminder_message(booking, service_name, self.default_tz);
        let scheduled = pending_message(ScheduleMessageInput {
            booking_id: booking.id,
            message_type: "reminder_24h".to_owned(),
            recipient: phone,
            body: message.body,
            media_url: None,
            send_at,
        });
        match self.queue.create(&scheduled).await {
            Ok(()) => SideEffect::applied(SideEffectTarget::Reminder),
            Err(e) => {
                warn!(booking_id = %booking.id, error = %e, "failed to schedule reminder");
                SideEffect::failed(SideEffectTarget::Reminder)
            }
        }
    }
}

// ── CancelBooking ────────────────────────────────────────────────────────────

pub struct CancelBookingUseCase<B, C, V, W, E>
where
    B: BookingRepository,
    C: CalendarPort,
    V: MeetingPort,
    W: MessagingPort,
    E: MailPort,
{
    pub bookings: B,
    pub calendar: C,
    pub meeting: V,
    pub notifier: Notifier<W, E>,
}

impl<B, C, V, W, E> CancelBookingUseCase<B, C, V, W, E>
where
    B: BookingRepository,
    C: CalendarPort,
    V: MeetingPort,
    W: MessagingPort,
    E: MailPort,
{
    /// The status change is stored before any side effect runs and stands
    /// even when every side effect fails.
    pub async fn execute(
        &self,
        mut booking: Booking,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<MutationOutput, BookingServiceError> {
        if booking.status == BookingStatus::Cancelled {
            return Err(BookingServiceError::AlreadyCancelled);
        }
        if booking.start_at <= now {
            return Err(BookingServiceError::PastBooking);
        }

        let reason = reason
            .map(|r| r.trim().to_owned())
            .filter(|r| !r.is_empty());
        let notes = match &reason {
            Some(reason) => format!("{}\n[Cancelled] Reason: {reason}", booking.notes),
            None => format!("{}\n[Cancelled]", booking.notes),
        };
        let notes = notes.trim_start().to_owned();

        self.bookings
            .update_status(booking.id, BookingStatus::Cancelled, Some(&notes), now)
            .await?;
        booking.status = BookingStatus::Cancelled;
        booking.notes = notes;
        booking.updated_at = now;
        info!(booking_id = %booking.id, code = %booking.code, "booking cancelled");

        let mut side_effects = vec![
            self.delete_event(&booking).await,
            self.delete_meeting(&booking).await,
        ];
        side_effects.extend(
            self.notifier
                .booking_cancelled(&booking, reason.as_deref())
                .await,
        );

        Ok(MutationOutput {
            booking,
            side_effects,
        })
    }

    async fn delete_event(&self, booking: &Booking) -> SideEffect {
        let Some(event_id) = booking.refs.calendar_event_id.as_deref() else {
            return SideEffect::skipped(SideEffectTarget::Calendar);
        };
        if !self.calendar.is_configured() {
            return SideEffect::skipped(SideEffectTarget::Calendar);
        }
        match self.calendar.delete_event(event_id).await {
            Ok(()) => SideEffect::applied(SideEffectTarget::Calendar),
            Err(e) => {
                warn!(
                    booking_id = %booking.id,
                    event_id,
                    error = %e,
                    "calendar event deletion failed"
                );
                SideEffect::failed(SideEffectTarget::Calendar)
            }
        }
    }

    async fn delete_meeting(&self, booking: &Booking) -> SideEffect {
        let Some(meeting_id) = booking.refs.meeting_id.as_deref() else {
            return SideEffect::skipped(SideEffectTarget::Meeting);
        };
        if !self.meeting.is_configured() {
            return SideEffect::skipped(SideEffectTarget::Meeting);
        }
        match self.meeting.delete_meeting(meeting_id).await {
            Ok(()) => SideEffect::applied(SideEffectTarget::Meeting),
            Err(e) => {
                warn!(booking_id = %booking.id, meeting_id, error = %e, "meeting deletion failed");
                SideEffect::failed(SideEffectTarget::Meeting)
            }
        }
    }
}

// ── RescheduleBooking ────────────────────────────────────────────────────────

pub struct RescheduleInput {
    /// Local date-time in `timezone` (or the booking's zone), or RFC 3339.
    pub new_start: String,
    pub timezone: Option<String>,
}

pub struct RescheduleBookingUseCase<B, S, C, V, W, E>
where
    B: BookingRepository,
    S: ServiceRepository,
    C: CalendarPort,
    V: MeetingPort,
    W: MessagingPort,
    E: MailPort,
{
    pub bookings: B,
    pub services: S,
    pub calendar: C,
    pub meeting: V,
    pub notifier: Notifier<W, E>,
    pub default_tz: Tz,
}

impl<B, S, C, V, W, E> RescheduleBookingUseCase<B, S, C, V, W, E>
where
    B: BookingRepository,
    S: ServiceRepository,
    C: CalendarPort,
    V: MeetingPort,
    W: MessagingPort,
    E: MailPort,
{
    pub async fn execute(
        &self,
        mut booking: Booking,
        input: RescheduleInput,
        now: DateTime<Utc>,
    ) -> Result<MutationOutput, BookingServiceError> {
        if input.new_start.trim().is_empty() {
            return Err(BookingServiceError::InvalidDate);
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(BookingServiceError::WrongState);
        }

        let tz = match input.timezone.as_deref() {
            Some(name) => resolve_timezone(name, booking.tz(self.default_tz)),
            None => booking.tz(self.default_tz),
        };
        let start_at =
            parse_local_datetime(&input.new_start, tz).ok_or(BookingServiceError::InvalidDate)?;
        if start_at <= now {
            return Err(BookingServiceError::PastDate);
        }

        let service = self.services.find_by_id(booking.service_id).await?;
        let duration = service
            .as_ref()
            .map_or_else(|| booking.duration(), |s| s.duration());
        let end_at = start_at + duration;

        self.bookings
            .reschedule(booking.id, start_at, end_at, tz.name(), now)
            .await?;
        let previous = booking.start_at;
        booking.start_at = start_at;
        booking.end_at = end_at;
        booking.timezone = tz.name().to_owned();
        booking.updated_at = now;
        info!(
            booking_id = %booking.id,
            from = %previous,
            to = %start_at,
            "booking rescheduled"
        );

        let service_name = service.map_or_else(|| "Booking".to_owned(), |s| s.name);
        let mut side_effects = vec![
            self.update_meeting(&booking, tz).await,
            self.update_event(&booking, &service_name, tz).await,
        ];
        side_effects.extend(self.notifier.booking_rescheduled(&booking).await);

        Ok(MutationOutput {
            booking,
            side_effects,
        })
    }

    async fn update_meeting(&self, booking: &Booking, tz: Tz) -> SideEffect {
        let Some(meeting_id) = booking.refs.meeting_id.as_deref() else {
            return SideEffect::skipped(SideEffectTarget::Meeting);
        };
        if !self.meeting.is_configured() {
            return SideEffect::skipped(SideEffectTarget::Meeting);
        }
        match self
            .meeting
            .update_meeting(meeting_id, booking.start_at, tz)
            .await
        {
            Ok(()) => SideEffect::applied(SideEffectTarget::Meeting),
            Err(e) => {
                warn!(booking_id = %booking.id, meeting_id, error = %e, "meeting update failed");
                SideEffect::failed(SideEffectTarget::Meeting)
            }
        }
    }

    async fn update_event(&self, booking: &Booking, service_name: &str, tz: Tz) -> SideEffect {
        let Some(event_id) = booking.refs.calendar_event_id.as_deref() else {
            return SideEffect::skipped(SideEffectTarget::Calendar);
        };
        if !self.calendar.is_configured() {
            return SideEffect::skipped(SideEffectTarget::Calendar);
        }
        let draft = event_draft(booking, service_name, tz);
        match self.calendar.update_event(event_id, &draft).await {
            Ok(()) => SideEffect::applied(SideEffectTarget::Calendar),
            Err(e) => {
                warn!(
                    booking_id = %booking.id,
                    event_id,
                    error = %e,
                    "calendar event update failed"
                );
                SideEffect::failed(SideEffectTarget::Calendar)
            }
        }
    }
}

// ── SetStatus ────────────────────────────────────────────────────────────────

pub struct SetStatusUseCase<B: BookingRepository> {
    pub bookings: B,
}

impl<B: BookingRepository> SetStatusUseCase<B> {
    pub async fn execute(
        &self,
        code: &BookingCode,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingServiceError> {
        let mut booking = self
            .bookings
            .find_by_code(code)
            .await?
            .ok_or(BookingServiceError::BookingNotFound)?;
        if !booking.status.can_transition_to(status) {
            return Err(BookingServiceError::WrongState);
        }
        self.bookings
            .update_status(booking.id, status, None, now)
            .await?;
        info!(
            booking_id = %booking.id,
            from = %booking.status,
            to = %status,
            "booking status changed"
        );
        booking.status = status;
        booking.updated_at = now;
        Ok(booking)
    }
}

// ── GetBooking ───────────────────────────────────────────────────────────────

pub struct GetBookingUseCase<B: BookingRepository> {
    pub bookings: B,
}

impl<B: BookingRepository> GetBookingUseCase<B> {
    pub async fn execute(&self, code: &BookingCode) -> Result<Booking, BookingServiceError> {
        self.bookings
            .find_by_code(code)
            .await?
            .ok_or(BookingServiceError::BookingNotFound)
    }
}
