use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agenda_domain::booking::{BookingStatus, TokenAction};
use agenda_domain::id::{BookingCode, BookingId, ServiceId};
use agenda_domain::time::resolve_timezone;

// ── Services & hours ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub color: String,
    pub buffer_before_minutes: i64,
    pub buffer_after_minutes: i64,
    pub active: bool,
}

impl Service {
    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes.max(1))
    }

    pub fn buffers(&self) -> Buffers {
        Buffers {
            before_minutes: self.buffer_before_minutes.max(0),
            after_minutes: self.buffer_after_minutes.max(0),
        }
    }
}

/// Padding applied around existing busy intervals, never around the
/// candidate slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buffers {
    pub before_minutes: i64,
    pub after_minutes: i64,
}

impl Buffers {
    pub fn expand(&self, busy: &BusyInterval) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            busy.start - Duration::minutes(self.before_minutes),
            busy.end + Duration::minutes(self.after_minutes),
        )
    }
}

/// Opening hours for one weekday (0 = Sunday).
#[derive(Debug, Clone)]
pub struct BusinessHours {
    pub weekday: u8,
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub slot_minutes: i64,
    pub active: bool,
}

impl BusinessHours {
    pub fn is_open(&self) -> bool {
        self.active && self.open < self.close
    }

    /// Slot width in minutes; misconfigured values fall back to the default.
    pub fn granularity(&self) -> i64 {
        if self.slot_minutes < MIN_SLOT_MINUTES {
            DEFAULT_SLOT_MINUTES
        } else {
            self.slot_minutes
        }
    }
}

// ── Availability ─────────────────────────────────────────────────────────────

/// Candidate bookable interval. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl Slot {
    /// Half-open overlap test against `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start.with_timezone(&Utc) < end && self.end.with_timezone(&Utc) > start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusySource {
    RemoteCalendar,
    LocalBooking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source: BusySource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    pub time: String,
    pub end_time: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub date: NaiveDate,
    pub timezone: String,
    pub slots: Vec<SlotView>,
}

impl Availability {
    pub fn empty(date: NaiveDate, tz: Tz) -> Self {
        Self {
            date,
            timezone: tz.name().to_owned(),
            slots: Vec::new(),
        }
    }
}

// ── Bookings ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Booking {
    pub id: BookingId,
    pub code: BookingCode,
    pub service_id: ServiceId,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub timezone: String,
    pub status: BookingStatus,
    pub refs: ExternalRefs,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn tz(&self, fallback: Tz) -> Tz {
        resolve_timezone(&self.timezone, fallback)
    }

    pub fn duration(&self) -> Duration {
        self.end_at - self.start_at
    }

    pub fn busy_interval(&self) -> BusyInterval {
        BusyInterval {
            start: self.start_at,
            end: self.end_at,
            source: BusySource::LocalBooking,
        }
    }
}

/// Identifiers of the copies a booking has in third-party systems.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalRefs {
    pub calendar_event_id: Option<String>,
    pub meeting_id: Option<String>,
    pub meeting_join_url: Option<String>,
}

// ── Action tokens ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ActionToken {
    pub id: Uuid,
    pub booking_id: BookingId,
    pub action: TokenAction,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Valid,
    Used,
    Expired,
}

impl ActionToken {
    /// Exactly one state holds; a used token stays used after it expires.
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        if self.used {
            TokenState::Used
        } else if now >= self.expires_at {
            TokenState::Expired
        } else {
            TokenState::Valid
        }
    }
}

/// Why a token was refused. Logged, never returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    AlreadyUsed,
    Expired,
    WrongAction,
    Unknown,
}

// ── Scheduled messages ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduledMessage {
    pub id: Uuid,
    pub booking_id: BookingId,
    pub message_type: String,
    pub recipient: String,
    pub body: String,
    pub media_url: Option<String>,
    pub send_at: DateTime<Utc>,
    pub status: MessageStatus,
    pub attempts: u32,
    pub provider_message_id: Option<String>,
    pub last_error: Option<String>,
    /// Dispatch lease. Set while a worker holds the message.
    pub claimed_until: Option<DateTime<Utc>>,
}

impl ScheduledMessage {
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == MessageStatus::Pending
            && self.send_at <= now
            && self.claimed_until.is_none_or(|lease| lease <= now)
    }
}

// ── Provider payloads ────────────────────────────────────────────────────────

/// Event written to the remote calendar for a booking.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: Tz,
    pub attendee_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MeetingDraft {
    pub topic: String,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub timezone: Tz,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingInfo {
    pub id: String,
    pub join_url: String,
}

// ── Side effects ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectTarget {
    ActionTokens,
    Meeting,
    Calendar,
    Email,
    Whatsapp,
    Reminder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectOutcome {
    Applied,
    Skipped,
    Failed,
}

/// Result of one best-effort call made after the authoritative state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SideEffect {
    pub target: SideEffectTarget,
    pub outcome: SideEffectOutcome,
}

impl SideEffect {
    pub fn applied(target: SideEffectTarget) -> Self {
        Self {
            target,
            outcome: SideEffectOutcome::Applied,
        }
    }

    pub fn skipped(target: SideEffectTarget) -> Self {
        Self {
            target,
            outcome: SideEffectOutcome::Skipped,
        }
    }

    pub fn failed(target: SideEffectTarget) -> Self {
        Self {
            target,
            outcome: SideEffectOutcome::Failed,
        }
    }
}

// ── Constants ────────────────────────────────────────────────────────────────

/// Slot widths below this are treated as misconfiguration.
pub const MIN_SLOT_MINUTES: i64 = 5;
pub const DEFAULT_SLOT_MINUTES: i64 = 30;

/// Availability cache time-to-live in seconds.
pub const AVAILABILITY_TTL_SECS: u64 = 300;

/// Booking code length and alphabet (no 0/O/1/I).
pub const CODE_LEN: usize = 12;
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const MAX_CODE_ATTEMPTS: usize = 10;

/// Default action-token lifetime in hours.
pub const TOKEN_TTL_HOURS: i64 = 72;
/// Random bytes per action token (hex-encoded to 64 chars).
pub const TOKEN_BYTES: usize = 32;

/// Failed token validations per origin before the administrator is alerted.
pub const FAILURE_ALERT_THRESHOLD: u64 = 5;
pub const FAILURE_WINDOW_SECS: u64 = 3600;

/// Queue dispatch tuning.
pub const DISPATCH_BATCH: u64 = 10;
pub const MAX_ATTEMPTS: u32 = 3;
pub const BACKOFF_MINUTES: i64 = 5;
pub const CLAIM_LEASE_MINUTES: i64 = 5;

/// Reminder lead time before the booking starts.
pub const REMINDER_OFFSET_HOURS: i64 = 24;

/// Accepted clock skew for signed webhooks.
pub const REPLAY_WINDOW_SECS: i64 = 300;
