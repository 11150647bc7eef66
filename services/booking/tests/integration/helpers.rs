#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use agenda_booking::domain::repository::{
    ActionTokenRepository, AvailabilityCache, BookingRepository, BusinessHoursRepository,
    CalendarPort, CounterStore, MailPort, MeetingPort, MessagingPort, ScheduledMessageRepository,
    ServiceRepository,
};
use agenda_booking::domain::types::{
    ActionToken, Availability, Booking, BusinessHours, BusyInterval, BusySource, EventDraft,
    ExternalRefs, MeetingDraft, MeetingInfo, MessageStatus, ScheduledMessage, Service,
};
use agenda_booking::error::BookingServiceError;
use agenda_booking::usecase::notify::Notifier;
use agenda_domain::booking::{BookingStatus, TokenAction};
use agenda_domain::id::{BookingCode, BookingId, ServiceId};

fn provider_down() -> BookingServiceError {
    BookingServiceError::Provider("connection refused".to_owned())
}

// ── MockServiceRepo ──────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockServiceRepo {
    pub services: Vec<Service>,
}

impl MockServiceRepo {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }
}

impl ServiceRepository for MockServiceRepo {
    async fn find_by_id(&self, id: ServiceId) -> Result<Option<Service>, BookingServiceError> {
        Ok(self.services.iter().find(|s| s.id == id).cloned())
    }
}

// ── MockHoursRepo ────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockHoursRepo {
    pub hours: Vec<BusinessHours>,
    pub fail: bool,
}

impl MockHoursRepo {
    pub fn new(hours: Vec<BusinessHours>) -> Self {
        Self { hours, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            hours: vec![],
            fail: true,
        }
    }
}

impl BusinessHoursRepository for MockHoursRepo {
    async fn find_by_weekday(
        &self,
        weekday: u8,
    ) -> Result<Option<BusinessHours>, BookingServiceError> {
        if self.fail {
            return Err(anyhow::anyhow!("database unavailable").into());
        }
        Ok(self.hours.iter().find(|h| h.weekday == weekday).cloned())
    }
}

// ── MockBookingRepo ──────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockBookingRepo {
    pub bookings: Arc<Mutex<Vec<Booking>>>,
    /// Number of upcoming `code_exists` calls that report a collision.
    pub code_collisions: Arc<Mutex<usize>>,
    pub code_checks: Arc<Mutex<usize>>,
}

impl MockBookingRepo {
    pub fn new(bookings: Vec<Booking>) -> Self {
        Self {
            bookings: Arc::new(Mutex::new(bookings)),
            code_collisions: Arc::new(Mutex::new(0)),
            code_checks: Arc::new(Mutex::new(0)),
        }
    }

    /// Every generated code is reported taken `collisions` times first.
    pub fn with_code_collisions(collisions: usize) -> Self {
        let repo = Self::empty();
        *repo.code_collisions.lock().unwrap() = collisions;
        repo
    }

    pub fn code_checks_handle(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.code_checks)
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    /// Returns a shared handle to the internal booking list for post-execution inspection.
    pub fn bookings_handle(&self) -> Arc<Mutex<Vec<Booking>>> {
        Arc::clone(&self.bookings)
    }

    fn with<F: FnOnce(&mut Booking)>(
        &self,
        id: BookingId,
        f: F,
    ) -> Result<(), BookingServiceError> {
        let mut bookings = self.bookings.lock().unwrap();
        let booking = bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| anyhow::anyhow!("record not updated"))?;
        f(booking);
        Ok(())
    }
}

impl BookingRepository for MockBookingRepo {
    async fn find_by_code(
        &self,
        code: &BookingCode,
    ) -> Result<Option<Booking>, BookingServiceError> {
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .find(|b| &b.code == code)
            .cloned())
    }

    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, BookingServiceError> {
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == id)
            .cloned())
    }

    async fn code_exists(&self, code: &str) -> Result<bool, BookingServiceError> {
        *self.code_checks.lock().unwrap() += 1;
        let mut collisions = self.code_collisions.lock().unwrap();
        if *collisions > 0 {
            *collisions -= 1;
            return Ok(true);
        }
        drop(collisions);
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .any(|b| b.code.as_str() == code))
    }

    async fn create(&self, booking: &Booking) -> Result<(), BookingServiceError> {
        self.bookings.lock().unwrap().push(booking.clone());
        Ok(())
    }

    async fn list_busy(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, BookingServiceError> {
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.status.is_blocking() && b.start_at >= start && b.end_at <= end)
            .map(Booking::busy_interval)
            .collect())
    }

    async fn update_status(
        &self,
        id: BookingId,
        status: BookingStatus,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), BookingServiceError> {
        self.with(id, |b| {
            b.status = status;
            if let Some(notes) = notes {
                b.notes = notes.to_owned();
            }
            b.updated_at = now;
        })
    }

    async fn reschedule(
        &self,
        id: BookingId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BookingServiceError> {
        self.with(id, |b| {
            b.start_at = start;
            b.end_at = end;
            b.timezone = timezone.to_owned();
            b.updated_at = now;
        })
    }

    async fn set_external_refs(
        &self,
        id: BookingId,
        refs: &ExternalRefs,
        now: DateTime<Utc>,
    ) -> Result<(), BookingServiceError> {
        self.with(id, |b| {
            b.refs = refs.clone();
            b.updated_at = now;
        })
    }
}

// ── MockTokenRepo ────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockTokenRepo {
    pub tokens: Arc<Mutex<Vec<ActionToken>>>,
    pub fail_create: bool,
}

impl MockTokenRepo {
    pub fn new(tokens: Vec<ActionToken>) -> Self {
        Self {
            tokens: Arc::new(Mutex::new(tokens)),
            fail_create: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::empty()
        }
    }

    pub fn tokens_handle(&self) -> Arc<Mutex<Vec<ActionToken>>> {
        Arc::clone(&self.tokens)
    }
}

impl ActionTokenRepository for MockTokenRepo {
    async fn create(&self, token: &ActionToken) -> Result<(), BookingServiceError> {
        if self.fail_create {
            return Err(anyhow::anyhow!("insert action token").into());
        }
        self.tokens.lock().unwrap().push(token.clone());
        Ok(())
    }

    async fn consume(
        &self,
        token: &str,
        action: TokenAction,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingId>, BookingServiceError> {
        // The lock stands in for the conditional UPDATE.
        let mut tokens = self.tokens.lock().unwrap();
        let found = tokens.iter_mut().find(|t| {
            t.token == token && t.action == action && !t.used && t.expires_at > now
        });
        Ok(found.map(|t| {
            t.used = true;
            t.used_at = Some(now);
            t.booking_id
        }))
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ActionToken>, BookingServiceError> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, BookingServiceError> {
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|t| t.expires_at >= now);
        Ok((before - tokens.len()) as u64)
    }
}

// ── MockMessageRepo ──────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockMessageRepo {
    pub messages: Arc<Mutex<Vec<ScheduledMessage>>>,
}

impl MockMessageRepo {
    pub fn new(messages: Vec<ScheduledMessage>) -> Self {
        Self {
            messages: Arc::new(Mutex::new(messages)),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    pub fn messages_handle(&self) -> Arc<Mutex<Vec<ScheduledMessage>>> {
        Arc::clone(&self.messages)
    }

    fn with<F: FnOnce(&mut ScheduledMessage)>(&self, id: Uuid, f: F) {
        if let Some(m) = self.messages.lock().unwrap().iter_mut().find(|m| m.id == id) {
            f(m);
        }
    }
}

impl ScheduledMessageRepository for MockMessageRepo {
    async fn create(&self, message: &ScheduledMessage) -> Result<(), BookingServiceError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<ScheduledMessage>, BookingServiceError> {
        let mut messages = self.messages.lock().unwrap();
        let mut claimed = Vec::new();
        for m in messages
            .iter_mut()
            .filter(|m| m.is_claimable(now))
            .take(limit as usize)
        {
            m.claimed_until = Some(lease_until);
            claimed.push(m.clone());
        }
        Ok(claimed)
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        provider_message_id: &str,
        _now: DateTime<Utc>,
    ) -> Result<(), BookingServiceError> {
        self.with(id, |m| {
            m.status = MessageStatus::Sent;
            m.provider_message_id = Some(provider_message_id.to_owned());
            m.claimed_until = None;
        });
        Ok(())
    }

    async fn mark_retry(
        &self,
        id: Uuid,
        attempts: u32,
        next_send_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), BookingServiceError> {
        self.with(id, |m| {
            m.attempts = attempts;
            m.send_at = next_send_at;
            m.claimed_until = None;
            m.last_error = Some(error.to_owned());
        });
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        attempts: u32,
        error: &str,
    ) -> Result<(), BookingServiceError> {
        self.with(id, |m| {
            m.status = MessageStatus::Failed;
            m.claimed_until = None;
            m.attempts = attempts;
            m.last_error = Some(error.to_owned());
        });
        Ok(())
    }
}

// ── MockCache ────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockCache {
    pub entries: Arc<Mutex<HashMap<String, Availability>>>,
    pub fail: bool,
}

impl MockCache {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn entries_handle(&self) -> Arc<Mutex<HashMap<String, Availability>>> {
        Arc::clone(&self.entries)
    }
}

impl AvailabilityCache for MockCache {
    async fn get(&self, key: &str) -> Result<Option<Availability>, BookingServiceError> {
        if self.fail {
            return Err(anyhow::anyhow!("redis unavailable").into());
        }
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(
        &self,
        key: &str,
        value: &Availability,
        _ttl_secs: u64,
    ) -> Result<(), BookingServiceError> {
        if self.fail {
            return Err(anyhow::anyhow!("redis unavailable").into());
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.clone());
        Ok(())
    }
}

// ── MockCounters ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockCounters {
    pub counts: Arc<Mutex<HashMap<String, u64>>>,
    pub fail: bool,
}

impl MockCounters {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn counts_handle(&self) -> Arc<Mutex<HashMap<String, u64>>> {
        Arc::clone(&self.counts)
    }
}

impl CounterStore for MockCounters {
    async fn hit(&self, key: &str, _window_secs: u64) -> Result<u64, BookingServiceError> {
        if self.fail {
            return Err(anyhow::anyhow!("redis unavailable").into());
        }
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(key.to_owned()).or_default();
        *count += 1;
        Ok(*count)
    }
}

// ── MockCalendar ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockCalendar {
    pub configured: bool,
    pub fail: bool,
    pub busy: Vec<BusyInterval>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockCalendar {
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn with_busy(busy: Vec<BusyInterval>) -> Self {
        Self {
            configured: true,
            busy,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            configured: true,
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: String) -> Result<(), BookingServiceError> {
        self.calls.lock().unwrap().push(call);
        if self.fail { Err(provider_down()) } else { Ok(()) }
    }
}

impl CalendarPort for MockCalendar {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn free_busy(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _tz: Tz,
    ) -> Result<Vec<BusyInterval>, BookingServiceError> {
        self.record("free_busy".to_owned())?;
        Ok(self
            .busy
            .iter()
            .filter(|b| b.start < end && b.end > start)
            .copied()
            .collect())
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<String, BookingServiceError> {
        self.record(format!("create_event:{}", draft.summary))?;
        Ok("evt-1".to_owned())
    }

    async fn update_event(
        &self,
        event_id: &str,
        _draft: &EventDraft,
    ) -> Result<(), BookingServiceError> {
        self.record(format!("update_event:{event_id}"))
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), BookingServiceError> {
        self.record(format!("delete_event:{event_id}"))
    }
}

// ── MockMeeting ──────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockMeeting {
    pub configured: bool,
    pub fail: bool,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockMeeting {
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn working() -> Self {
        Self {
            configured: true,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            configured: true,
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: String) -> Result<(), BookingServiceError> {
        self.calls.lock().unwrap().push(call);
        if self.fail { Err(provider_down()) } else { Ok(()) }
    }
}

impl MeetingPort for MockMeeting {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn create_meeting(
        &self,
        draft: &MeetingDraft,
    ) -> Result<MeetingInfo, BookingServiceError> {
        self.record(format!("create_meeting:{}", draft.duration_minutes))?;
        Ok(MeetingInfo {
            id: "mtg-1".to_owned(),
            join_url: "https://meet.example.com/j/1".to_owned(),
        })
    }

    async fn update_meeting(
        &self,
        meeting_id: &str,
        _start: DateTime<Utc>,
        _tz: Tz,
    ) -> Result<(), BookingServiceError> {
        self.record(format!("update_meeting:{meeting_id}"))
    }

    async fn delete_meeting(&self, meeting_id: &str) -> Result<(), BookingServiceError> {
        self.record(format!("delete_meeting:{meeting_id}"))
    }
}

// ── MockMessaging ────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockMessaging {
    pub configured: bool,
    pub fail: bool,
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockMessaging {
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn working() -> Self {
        Self {
            configured: true,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            configured: true,
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent_handle(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        Arc::clone(&self.sent)
    }
}

impl MessagingPort for MockMessaging {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send(
        &self,
        to: &str,
        body: &str,
        _media_url: Option<&str>,
    ) -> Result<String, BookingServiceError> {
        if self.fail {
            return Err(provider_down());
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_owned(), body.to_owned()));
        Ok(format!("SM{}", sent.len()))
    }
}

// ── MockMail ─────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockMail {
    pub configured: bool,
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockMail {
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn working() -> Self {
        Self {
            configured: true,
            ..Self::default()
        }
    }

    /// (recipient, subject) pairs.
    pub fn sent_handle(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        Arc::clone(&self.sent)
    }
}

impl MailPort for MockMail {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), BookingServiceError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_owned(), subject.to_owned()));
        Ok(())
    }
}

// ── Test fixture helpers ─────────────────────────────────────────────────────

/// Sunday 2026-03-01 08:00 UTC.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn sunday_hours(open: NaiveTime, close: NaiveTime, slot_minutes: i64) -> BusinessHours {
    BusinessHours {
        weekday: 0,
        open,
        close,
        slot_minutes,
        active: true,
    }
}

pub fn test_service(id: i32, duration_minutes: i64, before: i64, after: i64) -> Service {
    Service {
        id: ServiceId(id),
        name: "Therapy session".to_owned(),
        duration_minutes,
        price_cents: 5_000,
        color: "#3366ff".to_owned(),
        buffer_before_minutes: before,
        buffer_after_minutes: after,
        active: true,
    }
}

pub fn remote_busy(start: DateTime<Utc>, end: DateTime<Utc>) -> BusyInterval {
    BusyInterval {
        start,
        end,
        source: BusySource::RemoteCalendar,
    }
}

pub fn test_booking(code: &str, start: DateTime<Utc>, status: BookingStatus) -> Booking {
    Booking {
        id: BookingId(Uuid::new_v4()),
        code: BookingCode::from(code),
        service_id: ServiceId(1),
        client_name: "Ana Pérez".to_owned(),
        client_email: "ana@example.com".to_owned(),
        client_phone: Some("+15550001".to_owned()),
        start_at: start,
        end_at: start + Duration::hours(1),
        timezone: "UTC".to_owned(),
        status,
        refs: ExternalRefs::default(),
        notes: String::new(),
        created_at: test_now() - Duration::days(2),
        updated_at: test_now() - Duration::days(2),
    }
}

pub fn test_token(
    booking_id: BookingId,
    action: TokenAction,
    value: &str,
    expires_at: DateTime<Utc>,
) -> ActionToken {
    ActionToken {
        id: Uuid::new_v4(),
        booking_id,
        action,
        token: value.to_owned(),
        expires_at,
        used: false,
        used_at: None,
        ip_address: None,
        created_at: test_now() - Duration::hours(1),
    }
}

pub fn notifier(messaging: MockMessaging, mail: MockMail) -> Notifier<MockMessaging, MockMail> {
    Notifier {
        messaging,
        mail,
        default_tz: Tz::UTC,
    }
}

pub const TEST_IP: &str = "203.0.113.10";
