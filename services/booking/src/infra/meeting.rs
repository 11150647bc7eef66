use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::MeetingSettings;
use crate::domain::repository::MeetingPort;
use crate::domain::types::{MeetingDraft, MeetingInfo};
use crate::error::BookingServiceError;
use crate::infra::http::{json, send, send_delete};

const PROVIDER: &str = "meeting";
const API_BASE: &str = "https://api.zoom.us/v2";

/// Scheduled meeting, as opposed to instant or recurring.
const SCHEDULED_MEETING: u8 = 2;

#[derive(Clone)]
pub struct ZoomClient {
    pub http: Client,
    pub settings: Option<MeetingSettings>,
}

impl ZoomClient {
    fn settings(&self) -> Result<&MeetingSettings, BookingServiceError> {
        self.settings
            .as_ref()
            .ok_or(BookingServiceError::NotConfigured("video conferencing"))
    }
}

/// Zoom reads `start_time` as wall-clock time in `timezone`.
fn local_start(start: DateTime<Utc>, tz: Tz) -> String {
    start.with_timezone(&tz).format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[derive(Deserialize)]
struct CreatedMeeting {
    id: serde_json::Value,
    join_url: String,
}

impl MeetingPort for ZoomClient {
    fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    async fn create_meeting(
        &self,
        draft: &MeetingDraft,
    ) -> Result<MeetingInfo, BookingServiceError> {
        let settings = self.settings()?;
        let body = json!({
            "topic": draft.topic,
            "type": SCHEDULED_MEETING,
            "start_time": local_start(draft.start, draft.timezone),
            "duration": draft.duration_minutes,
            "timezone": draft.timezone.name(),
            "settings": {
                "join_before_host": false,
                "waiting_room": true,
            },
        });
        let request = self
            .http
            .post(format!("{API_BASE}/users/me/meetings"))
            .bearer_auth(&settings.access_token)
            .json(&body);
        let created: CreatedMeeting = json(PROVIDER, send(PROVIDER, request).await?).await?;

        // Ids arrive as JSON numbers too large for some clients; keep them as text.
        let id = match created.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(MeetingInfo {
            id,
            join_url: created.join_url,
        })
    }

    async fn update_meeting(
        &self,
        meeting_id: &str,
        start: DateTime<Utc>,
        tz: Tz,
    ) -> Result<(), BookingServiceError> {
        let settings = self.settings()?;
        let body = json!({
            "start_time": local_start(start, tz),
            "timezone": tz.name(),
        });
        let request = self
            .http
            .patch(format!("{API_BASE}/meetings/{meeting_id}"))
            .bearer_auth(&settings.access_token)
            .json(&body);
        send(PROVIDER, request).await?;
        Ok(())
    }

    async fn delete_meeting(&self, meeting_id: &str) -> Result<(), BookingServiceError> {
        let settings = self.settings()?;
        let request = self
            .http
            .delete(format!("{API_BASE}/meetings/{meeting_id}"))
            .bearer_auth(&settings.access_token);
        send_delete(PROVIDER, request).await
    }
}
