//! Inbound webhook authentication and command parsing for the calendar,
//! video-conferencing and messaging providers.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use tracing::warn;

use crate::domain::types::REPLAY_WINDOW_SECS;
use crate::error::BookingServiceError;

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

fn sha256_mac(secret: &str) -> Result<HmacSha256, BookingServiceError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| anyhow::anyhow!("hmac-sha256 rejected key").into())
}

fn sha1_mac(secret: &str) -> Result<HmacSha1, BookingServiceError> {
    HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|_| anyhow::anyhow!("hmac-sha1 rejected key").into())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ── Calendar push ────────────────────────────────────────────────────────────

/// Check the channel token echoed back by the calendar provider.
pub fn verify_channel_token(
    configured: Option<&str>,
    presented: Option<&str>,
) -> Result<(), BookingServiceError> {
    let configured = configured
        .filter(|t| !t.is_empty())
        .ok_or(BookingServiceError::NotConfigured("calendar channel token"))?;
    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), configured.as_bytes()) => Ok(()),
        _ => {
            warn!("calendar webhook with bad channel token");
            Err(BookingServiceError::Forbidden)
        }
    }
}

// ── Video conferencing ───────────────────────────────────────────────────────

/// Response to the provider's endpoint ownership challenge.
pub fn zoom_url_validation(secret: &str, plain_token: &str) -> Result<String, BookingServiceError> {
    let mut mac = sha256_mac(secret)?;
    mac.update(plain_token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify `v0=<hex>` over `v0:{timestamp}:{body}`.
///
/// Checks run in order: signature present, timestamp fresh, secret
/// configured, signature valid.
pub fn verify_zoom_signature(
    secret: Option<&str>,
    signature: Option<&str>,
    timestamp: Option<&str>,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<(), BookingServiceError> {
    let signature = signature
        .filter(|s| !s.is_empty())
        .ok_or(BookingServiceError::MissingSignature)?;

    let ts = timestamp.ok_or(BookingServiceError::StaleRequest)?;
    let sent_at: i64 = ts
        .trim()
        .parse()
        .map_err(|_| BookingServiceError::StaleRequest)?;
    if now.timestamp().abs_diff(sent_at) > REPLAY_WINDOW_SECS.unsigned_abs() {
        warn!(timestamp = sent_at, "stale meeting webhook");
        return Err(BookingServiceError::StaleRequest);
    }

    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(BookingServiceError::NotConfigured("meeting webhook secret"))?;

    let presented = signature
        .strip_prefix("v0=")
        .and_then(|h| hex::decode(h).ok())
        .ok_or(BookingServiceError::InvalidSignature)?;

    let mut mac = sha256_mac(secret)?;
    mac.update(format!("v0:{ts}:").as_bytes());
    mac.update(body);
    mac.verify_slice(&presented).map_err(|_| {
        warn!("meeting webhook signature mismatch");
        BookingServiceError::InvalidSignature
    })
}

// ── Messaging ────────────────────────────────────────────────────────────────

/// base64(HMAC-SHA1(token, url + k1 + v1 + k2 + v2 ...)) with keys sorted.
pub fn twilio_signature(
    auth_token: &str,
    url: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, BookingServiceError> {
    let mut mac = sha1_mac(auth_token)?;
    mac.update(url.as_bytes());
    for (key, value) in params {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

pub fn verify_twilio_signature(
    auth_token: Option<&str>,
    signature: Option<&str>,
    url: &str,
    params: &BTreeMap<String, String>,
) -> Result<(), BookingServiceError> {
    let auth_token = auth_token
        .filter(|t| !t.is_empty())
        .ok_or(BookingServiceError::NotConfigured("messaging auth token"))?;
    let presented = signature
        .and_then(|s| BASE64.decode(s.trim()).ok())
        .ok_or(BookingServiceError::InvalidSignature)?;

    let expected = BASE64
        .decode(twilio_signature(auth_token, url, params)?)
        .map_err(|e| anyhow::anyhow!("re-decoding own signature: {e}"))?;
    if constant_time_eq(&presented, &expected) {
        Ok(())
    } else {
        warn!(url, "messaging webhook signature mismatch");
        Err(BookingServiceError::InvalidSignature)
    }
}

/// Keyword commands accepted from inbound chat messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundCommand {
    Cancel,
    Reschedule,
    Help,
}

impl InboundCommand {
    pub fn parse(body: &str) -> Self {
        let word = body
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_uppercase();
        match word.as_str() {
            "CANCEL" | "CANCELAR" => Self::Cancel,
            "RESCHEDULE" | "REAGENDAR" => Self::Reschedule,
            _ => Self::Help,
        }
    }

    pub fn reply(self, public_base_url: Option<&str>) -> String {
        match self {
            Self::Cancel => "We received your cancellation request. \
                 Use the cancel link from your confirmation message to complete it."
                .to_owned(),
            Self::Reschedule => match public_base_url {
                Some(base) => format!(
                    "To reschedule, open the manage link from your confirmation message or visit {}/manage-booking/",
                    base.trim_end_matches('/')
                ),
                None => "To reschedule, open the manage link from your confirmation message."
                    .to_owned(),
            },
            Self::Help => "Available commands:\nCANCEL - cancel your booking\n\
                 RESCHEDULE - change the date\nHELP - show this message"
                .to_owned(),
        }
    }
}
