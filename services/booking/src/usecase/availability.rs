use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, warn};

use agenda_domain::id::ServiceId;
use agenda_domain::time::{day_bounds, resolve_timezone};

use crate::domain::repository::{
    AvailabilityCache, BookingRepository, BusinessHoursRepository, CalendarPort,
    ServiceRepository,
};
use crate::domain::types::{
    AVAILABILITY_TTL_SECS, Availability, Buffers, BusyInterval, Slot, SlotView,
};
use crate::error::BookingServiceError;
use crate::usecase::slots::{generate_slots, label};

pub const REASON_BOOKED: &str = "booked";

pub fn cache_key(date: NaiveDate, tz: Tz, service_id: Option<ServiceId>) -> String {
    let service = service_id.map_or_else(|| "all".to_owned(), |id| id.to_string());
    format!("availability:{date}:{}:{service}", tz.name())
}

/// Whether `[start, end)` collides with any busy interval once padded.
pub fn conflicts(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    busy: &[BusyInterval],
    buffers: Buffers,
) -> bool {
    busy.iter().any(|b| {
        let (b_start, b_end) = buffers.expand(b);
        start < b_end && end > b_start
    })
}

/// Mark each slot against remote intervals first, then local ones.
pub fn mark_slots(
    slots: &[Slot],
    remote: &[BusyInterval],
    local: &[BusyInterval],
    buffers: Buffers,
) -> Vec<SlotView> {
    slots
        .iter()
        .map(|slot| {
            let taken = remote.iter().chain(local).any(|busy| {
                let (start, end) = buffers.expand(busy);
                slot.overlaps(start, end)
            });
            SlotView {
                time: label(&slot.start),
                end_time: label(&slot.end),
                available: !taken,
                reason: taken.then(|| REASON_BOOKED.to_owned()),
            }
        })
        .collect()
}

/// Busy intervals from the remote calendar, or none when it is unconfigured
/// or failing. Remote outages must not block bookings.
pub async fn remote_busy_or_empty<C: CalendarPort>(
    calendar: &C,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tz: Tz,
) -> Vec<BusyInterval> {
    if !calendar.is_configured() {
        debug!("remote calendar not configured, skipping free/busy");
        return Vec::new();
    }
    match calendar.free_busy(start, end, tz).await {
        Ok(busy) => busy,
        Err(e) => {
            warn!(error = %e, "remote calendar free/busy failed, assuming no remote conflicts");
            Vec::new()
        }
    }
}

// ── SyncAvailability ─────────────────────────────────────────────────────────

pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub timezone: Option<String>,
    pub service_id: Option<ServiceId>,
}

pub struct SyncAvailabilityUseCase<H, S, B, C, A>
where
    H: BusinessHoursRepository,
    S: ServiceRepository,
    B: BookingRepository,
    C: CalendarPort,
    A: AvailabilityCache,
{
    pub hours: H,
    pub services: S,
    pub bookings: B,
    pub calendar: C,
    pub cache: A,
    pub default_tz: Tz,
}

impl<H, S, B, C, A> SyncAvailabilityUseCase<H, S, B, C, A>
where
    H: BusinessHoursRepository,
    S: ServiceRepository,
    B: BookingRepository,
    C: CalendarPort,
    A: AvailabilityCache,
{
    /// Never fails. An empty slot list means "no information", not "fully
    /// booked"; failed computations are not cached.
    pub async fn execute(&self, query: AvailabilityQuery) -> Availability {
        let tz = query
            .timezone
            .as_deref()
            .map_or(self.default_tz, |name| resolve_timezone(name, self.default_tz));
        let key = cache_key(query.date, tz, query.service_id);

        match self.cache.get(&key).await {
            Ok(Some(hit)) => return hit,
            Ok(None) => {}
            Err(e) => warn!(error = %e, key = %key, "availability cache read failed"),
        }

        let availability = match self.compute(query.date, tz, query.service_id).await {
            Ok(availability) => availability,
            Err(e) => {
                error!(
                    error = ?e,
                    date = %query.date,
                    tz = tz.name(),
                    "availability computation failed"
                );
                return Availability::empty(query.date, tz);
            }
        };

        if let Err(e) = self
            .cache
            .set(&key, &availability, AVAILABILITY_TTL_SECS)
            .await
        {
            warn!(error = %e, key = %key, "availability cache write failed");
        }
        availability
    }

    async fn compute(
        &self,
        date: NaiveDate,
        tz: Tz,
        service_id: Option<ServiceId>,
    ) -> Result<Availability, BookingServiceError> {
        let weekday = date.weekday().num_days_from_sunday() as u8;
        let Some(hours) = self.hours.find_by_weekday(weekday).await? else {
            return Ok(Availability::empty(date, tz));
        };
        if !hours.is_open() {
            return Ok(Availability::empty(date, tz));
        }

        let slots = generate_slots(date, &hours, tz);
        let (day_start, day_end) = day_bounds(date, tz).ok_or(BookingServiceError::InvalidDate)?;

        let remote = remote_busy_or_empty(&self.calendar, day_start, day_end, tz).await;
        let local = self.bookings.list_busy(day_start, day_end).await?;

        let buffers = match service_id {
            Some(id) => self
                .services
                .find_by_id(id)
                .await?
                .map(|s| s.buffers())
                .unwrap_or_default(),
            None => Buffers::default(),
        };

        Ok(Availability {
            date,
            timezone: tz.name().to_owned(),
            slots: mark_slots(&slots, &remote, &local, buffers),
        })
    }
}
