//! Slot generation: tiles a day's opening hours into fixed-width slots.

use chrono::{Duration, NaiveDate, NaiveTime};
use chrono_tz::Tz;

use agenda_domain::time::local_to_utc;

use crate::domain::types::{BusinessHours, DEFAULT_SLOT_MINUTES, MIN_SLOT_MINUTES, Slot};

/// Tile `[open, close)` on `date` in `tz` into slots of the hours' granularity.
///
/// Tiling is done on instants, so every slot is exactly `granularity` long
/// even on DST transition days. A slot that would cross `close` is dropped.
pub fn generate_slots(date: NaiveDate, hours: &BusinessHours, tz: Tz) -> Vec<Slot> {
    if !hours.is_open() {
        return Vec::new();
    }
    let (Some(open), Some(close)) = (
        local_to_utc(date.and_time(hours.open), tz),
        local_to_utc(date.and_time(hours.close), tz),
    ) else {
        return Vec::new();
    };

    let step = Duration::minutes(hours.granularity());
    let mut slots = Vec::new();
    let mut start = open;
    while start < close {
        let end = start + step;
        if end > close {
            break;
        }
        slots.push(Slot {
            start: start.with_timezone(&tz),
            end: end.with_timezone(&tz),
        });
        start = end;
    }
    slots
}

/// Format a slot boundary as local `HH:MM`.
pub fn label(slot_edge: &chrono::DateTime<Tz>) -> String {
    slot_edge.format("%H:%M").to_string()
}

/// Preview of the slots a given configuration yields, as `HH:MM - HH:MM`.
pub fn preview_slots(open: NaiveTime, close: NaiveTime, slot_minutes: i64) -> Vec<String> {
    let slot_minutes = if slot_minutes < MIN_SLOT_MINUTES {
        DEFAULT_SLOT_MINUTES
    } else {
        slot_minutes
    };
    let hours = BusinessHours {
        weekday: 0,
        open,
        close,
        slot_minutes,
        active: true,
    };
    // Any date without a DST change works; UTC has none.
    let Some(reference) = NaiveDate::from_ymd_opt(2000, 1, 2) else {
        return Vec::new();
    };
    generate_slots(reference, &hours, Tz::UTC)
        .iter()
        .map(|slot| format!("{} - {}", label(&slot.start), label(&slot.end)))
        .collect()
}
