#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use agenda_domain::booking::{BookingStatus, TokenAction};
use agenda_domain::id::{BookingCode, BookingId, ServiceId};

use crate::domain::types::{
    ActionToken, Availability, Booking, BusinessHours, BusyInterval, EventDraft, ExternalRefs,
    MeetingDraft, MeetingInfo, ScheduledMessage, Service,
};
use crate::error::BookingServiceError;

// ── Storage ──────────────────────────────────────────────────────────────────

pub trait ServiceRepository: Send + Sync {
    async fn find_by_id(&self, id: ServiceId) -> Result<Option<Service>, BookingServiceError>;
}

pub trait BusinessHoursRepository: Send + Sync {
    /// Hours for a weekday, 0 = Sunday.
    async fn find_by_weekday(
        &self,
        weekday: u8,
    ) -> Result<Option<BusinessHours>, BookingServiceError>;
}

pub trait BookingRepository: Send + Sync {
    async fn find_by_code(&self, code: &BookingCode)
    -> Result<Option<Booking>, BookingServiceError>;

    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, BookingServiceError>;

    async fn code_exists(&self, code: &str) -> Result<bool, BookingServiceError>;

    async fn create(&self, booking: &Booking) -> Result<(), BookingServiceError>;

    /// Pending and confirmed bookings lying inside `[start, end]`.
    async fn list_busy(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, BookingServiceError>;

    /// Change status, optionally replacing the notes.
    async fn update_status(
        &self,
        id: BookingId,
        status: BookingStatus,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), BookingServiceError>;

    async fn reschedule(
        &self,
        id: BookingId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BookingServiceError>;

    async fn set_external_refs(
        &self,
        id: BookingId,
        refs: &ExternalRefs,
        now: DateTime<Utc>,
    ) -> Result<(), BookingServiceError>;
}

pub trait ActionTokenRepository: Send + Sync {
    async fn create(&self, token: &ActionToken) -> Result<(), BookingServiceError>;

    /// Atomically mark a matching, unused, unexpired token as used.
    /// Returns the bound booking only for the single caller that wins.
    async fn consume(
        &self,
        token: &str,
        action: TokenAction,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingId>, BookingServiceError>;

    /// Lookup by value regardless of state. Used to diagnose rejections.
    async fn find_by_token(&self, token: &str) -> Result<Option<ActionToken>, BookingServiceError>;

    /// Delete tokens whose expiry is before `now`. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, BookingServiceError>;
}

pub trait ScheduledMessageRepository: Send + Sync {
    async fn create(&self, message: &ScheduledMessage) -> Result<(), BookingServiceError>;

    /// Select up to `limit` pending, unleased messages due at `now` and set
    /// `claimed_until` to `lease_until` in the same unit of work, so a
    /// concurrent claimer cannot pick them up. `send_at` is left as scheduled.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<ScheduledMessage>, BookingServiceError>;

    async fn mark_sent(
        &self,
        id: Uuid,
        provider_message_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BookingServiceError>;

    async fn mark_retry(
        &self,
        id: Uuid,
        attempts: u32,
        next_send_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), BookingServiceError>;

    async fn mark_failed(
        &self,
        id: Uuid,
        attempts: u32,
        error: &str,
    ) -> Result<(), BookingServiceError>;
}

// ── Short-lived state (Redis) ────────────────────────────────────────────────

pub trait AvailabilityCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Availability>, BookingServiceError>;

    async fn set(
        &self,
        key: &str,
        value: &Availability,
        ttl_secs: u64,
    ) -> Result<(), BookingServiceError>;
}

/// Fixed-window counters that expire with their window.
pub trait CounterStore: Send + Sync {
    /// Increment `key` and return the count within the current window.
    async fn hit(&self, key: &str, window_secs: u64) -> Result<u64, BookingServiceError>;
}

// ── Third-party providers ────────────────────────────────────────────────────

/// Remote calendar holding the business owner's other commitments.
pub trait CalendarPort: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn free_busy(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tz: Tz,
    ) -> Result<Vec<BusyInterval>, BookingServiceError>;

    /// Returns the remote event id.
    async fn create_event(&self, draft: &EventDraft) -> Result<String, BookingServiceError>;

    async fn update_event(
        &self,
        event_id: &str,
        draft: &EventDraft,
    ) -> Result<(), BookingServiceError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), BookingServiceError>;
}

/// Video-conferencing provider.
pub trait MeetingPort: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn create_meeting(&self, draft: &MeetingDraft)
    -> Result<MeetingInfo, BookingServiceError>;

    async fn update_meeting(
        &self,
        meeting_id: &str,
        start: DateTime<Utc>,
        tz: Tz,
    ) -> Result<(), BookingServiceError>;

    async fn delete_meeting(&self, meeting_id: &str) -> Result<(), BookingServiceError>;
}

/// Chat messaging provider (WhatsApp).
pub trait MessagingPort: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Returns the provider message id.
    async fn send(
        &self,
        to: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<String, BookingServiceError>;
}

pub trait MailPort: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), BookingServiceError>;
}
