use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use agenda_core::config::Config;
use agenda_domain::time::resolve_timezone;

/// Booking service configuration loaded from environment variables.
///
/// Provider credentials are optional; a provider without them runs in
/// unconfigured mode and its side effects are reported as skipped.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Redis connection URL.
    pub redis_url: String,
    /// TCP port to listen on. Env var: `BOOKING_PORT`.
    #[serde(default = "default_port")]
    pub booking_port: u16,
    /// IANA zone used when a request names none or an invalid one.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    /// Recipient of security alerts.
    pub admin_email: Option<String>,
    /// Origin of the public site hosting the manage-booking page.
    pub public_base_url: Option<String>,
    #[serde(default)]
    pub auto_confirm_bookings: bool,
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,
    #[serde(default = "default_dispatch_interval")]
    pub dispatch_interval_secs: u64,
    #[serde(default = "default_cleanup_interval")]
    pub token_cleanup_interval_secs: u64,

    // Remote calendar
    pub google_access_token: Option<String>,
    #[serde(default = "default_calendar_id")]
    pub google_calendar_id: String,
    pub google_channel_token: Option<String>,

    // Video conferencing
    pub zoom_access_token: Option<String>,
    pub zoom_webhook_secret: Option<String>,

    // WhatsApp messaging
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_whatsapp_from: Option<String>,

    // Transactional e-mail relay
    pub mail_relay_url: Option<String>,
    pub mail_relay_key: Option<String>,
    pub mail_from: Option<String>,
}

impl Config for BookingConfig {}

fn default_port() -> u16 {
    3120
}

fn default_timezone() -> String {
    "UTC".to_owned()
}

fn default_provider_timeout() -> u64 {
    30
}

fn default_dispatch_interval() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    86_400
}

fn default_calendar_id() -> String {
    "primary".to_owned()
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[derive(Debug, Clone)]
pub struct CalendarSettings {
    pub access_token: String,
    pub calendar_id: String,
}

#[derive(Debug, Clone)]
pub struct MeetingSettings {
    pub access_token: String,
}

#[derive(Debug, Clone)]
pub struct MessagingSettings {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number, with or without the `whatsapp:` prefix.
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub relay_url: String,
    pub api_key: String,
    pub from: String,
}

impl BookingConfig {
    pub fn default_tz(&self) -> Tz {
        resolve_timezone(&self.default_timezone, Tz::UTC)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs.max(1))
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_secs.max(1))
    }

    pub fn token_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.token_cleanup_interval_secs.max(1))
    }

    pub fn public_base_url(&self) -> Option<String> {
        present(&self.public_base_url).map(|url| url.trim_end_matches('/').to_owned())
    }

    pub fn calendar(&self) -> Option<CalendarSettings> {
        Some(CalendarSettings {
            access_token: present(&self.google_access_token)?,
            calendar_id: self.google_calendar_id.clone(),
        })
    }

    pub fn meeting(&self) -> Option<MeetingSettings> {
        Some(MeetingSettings {
            access_token: present(&self.zoom_access_token)?,
        })
    }

    pub fn messaging(&self) -> Option<MessagingSettings> {
        Some(MessagingSettings {
            account_sid: present(&self.twilio_account_sid)?,
            auth_token: present(&self.twilio_auth_token)?,
            from: present(&self.twilio_whatsapp_from)?,
        })
    }

    pub fn mail(&self) -> Option<MailSettings> {
        Some(MailSettings {
            relay_url: present(&self.mail_relay_url)?,
            api_key: present(&self.mail_relay_key)?,
            from: present(&self.mail_from)?,
        })
    }
}
