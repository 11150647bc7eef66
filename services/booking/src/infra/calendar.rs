use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use crate::config::CalendarSettings;
use crate::domain::repository::CalendarPort;
use crate::domain::types::{BusyInterval, BusySource, EventDraft};
use crate::error::BookingServiceError;
use crate::infra::http::{json, send, send_delete};

const PROVIDER: &str = "calendar";
const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar adapter. Without settings every call is refused with
/// `NotConfigured` and `is_configured` reports false.
#[derive(Clone)]
pub struct GoogleCalendarClient {
    pub http: Client,
    pub settings: Option<CalendarSettings>,
}

impl GoogleCalendarClient {
    fn settings(&self) -> Result<&CalendarSettings, BookingServiceError> {
        self.settings
            .as_ref()
            .ok_or(BookingServiceError::NotConfigured("remote calendar"))
    }

    fn events_url(settings: &CalendarSettings) -> String {
        format!("{API_BASE}/calendars/{}/events", settings.calendar_id)
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn event_body(draft: &EventDraft) -> serde_json::Value {
    let attendees: Vec<_> = draft
        .attendee_email
        .iter()
        .map(|email| json!({ "email": email }))
        .collect();
    json!({
        "summary": draft.summary,
        "description": draft.description,
        "start": { "dateTime": rfc3339(draft.start), "timeZone": draft.timezone.name() },
        "end": { "dateTime": rfc3339(draft.end), "timeZone": draft.timezone.name() },
        "attendees": attendees,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest<'a> {
    time_min: String,
    time_max: String,
    time_zone: &'a str,
    items: [FreeBusyItem<'a>; 1],
}

#[derive(Serialize)]
struct FreeBusyItem<'a> {
    id: &'a str,
}

#[derive(Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<FreeBusyPeriod>,
}

#[derive(Deserialize)]
struct FreeBusyPeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct CreatedEvent {
    id: String,
}

impl CalendarPort for GoogleCalendarClient {
    fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    async fn free_busy(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tz: Tz,
    ) -> Result<Vec<BusyInterval>, BookingServiceError> {
        let settings = self.settings()?;
        let body = FreeBusyRequest {
            time_min: rfc3339(start),
            time_max: rfc3339(end),
            time_zone: tz.name(),
            items: [FreeBusyItem {
                id: &settings.calendar_id,
            }],
        };
        let request = self
            .http
            .post(format!("{API_BASE}/freeBusy"))
            .bearer_auth(&settings.access_token)
            .json(&body);
        let response: FreeBusyResponse = json(PROVIDER, send(PROVIDER, request).await?).await?;

        Ok(response
            .calendars
            .into_values()
            .flat_map(|calendar| calendar.busy)
            .filter(|period| period.start < period.end)
            .map(|period| BusyInterval {
                start: period.start,
                end: period.end,
                source: BusySource::RemoteCalendar,
            })
            .collect())
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<String, BookingServiceError> {
        let settings = self.settings()?;
        let request = self
            .http
            .post(Self::events_url(settings))
            .bearer_auth(&settings.access_token)
            .json(&event_body(draft));
        let created: CreatedEvent = json(PROVIDER, send(PROVIDER, request).await?).await?;
        Ok(created.id)
    }

    async fn update_event(
        &self,
        event_id: &str,
        draft: &EventDraft,
    ) -> Result<(), BookingServiceError> {
        let settings = self.settings()?;
        let request = self
            .http
            .patch(format!("{}/{event_id}", Self::events_url(settings)))
            .bearer_auth(&settings.access_token)
            .json(&event_body(draft));
        send(PROVIDER, request).await?;
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), BookingServiceError> {
        let settings = self.settings()?;
        let request = self
            .http
            .delete(format!("{}/{event_id}", Self::events_url(settings)))
            .bearer_auth(&settings.access_token);
        send_delete(PROVIDER, request).await
    }
}
