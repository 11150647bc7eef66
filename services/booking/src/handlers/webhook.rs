use std::collections::BTreeMap;

use axum::{
    Form, Json,
    body::Bytes,
    extract::{OriginalUri, State},
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::domain::repository::MessagingPort;
use crate::error::BookingServiceError;
use crate::handlers::caller::PeerIp;
use crate::state::AppState;
use crate::usecase::rate_limit::RateClass;
use crate::usecase::webhook::{
    InboundCommand, verify_channel_token, verify_twilio_signature, verify_zoom_signature,
    zoom_url_validation,
};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ── POST /webhooks/calendar ──────────────────────────────────────────────────

pub async fn calendar_push(
    State(state): State<AppState>,
    PeerIp(ip): PeerIp,
    headers: HeaderMap,
) -> Result<Json<Value>, BookingServiceError> {
    state.limiter().check(RateClass::Webhook, &ip).await?;
    verify_channel_token(
        state.webhooks.calendar_channel_token.as_deref(),
        header(&headers, "x-goog-channel-token"),
    )?;

    info!(
        resource_state = header(&headers, "x-goog-resource-state").unwrap_or("unknown"),
        channel_id = header(&headers, "x-goog-channel-id").unwrap_or("-"),
        "calendar push notification"
    );
    Ok(Json(json!({ "status": "ok" })))
}

// ── POST /webhooks/meeting ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct MeetingEvent {
    event: String,
    #[serde(default)]
    payload: Value,
}

pub async fn meeting_event(
    State(state): State<AppState>,
    PeerIp(ip): PeerIp,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, BookingServiceError> {
    state.limiter().check(RateClass::Webhook, &ip).await?;
    let event: MeetingEvent =
        serde_json::from_slice(&body).map_err(|_| BookingServiceError::MissingData)?;
    let secret = state.webhooks.meeting_secret.as_deref();

    if event.event == "endpoint.url_validation" {
        let secret = secret
            .filter(|s| !s.is_empty())
            .ok_or(BookingServiceError::NotConfigured("meeting webhook secret"))?;
        let plain = event
            .payload
            .get("plainToken")
            .and_then(Value::as_str)
            .ok_or(BookingServiceError::MissingData)?;
        let encrypted = zoom_url_validation(secret, plain)?;
        return Ok(Json(json!({
            "plainToken": plain,
            "encryptedToken": encrypted,
        })));
    }

    verify_zoom_signature(
        secret,
        header(&headers, "x-zm-signature"),
        header(&headers, "x-zm-request-timestamp"),
        &body,
        state.clock.now(),
    )?;

    let meeting_id = event
        .payload
        .pointer("/object/id")
        .map(Value::to_string)
        .unwrap_or_default();
    info!(event = %event.event, meeting_id = %meeting_id, "meeting webhook");
    Ok(Json(json!({ "status": "ok" })))
}

// ── POST /webhooks/messaging ─────────────────────────────────────────────────

/// Public URL the provider signed: forwarded scheme and host plus the
/// original path and query.
fn signed_url(headers: &HeaderMap, uri: &axum::http::Uri) -> String {
    let scheme = header(headers, "x-forwarded-proto").unwrap_or("https");
    let host = header(headers, "x-forwarded-host")
        .or_else(|| header(headers, "host"))
        .unwrap_or("localhost");
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    format!("{scheme}://{host}{path}")
}

pub async fn messaging_inbound(
    State(state): State<AppState>,
    PeerIp(ip): PeerIp,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Form(params): Form<BTreeMap<String, String>>,
) -> Result<Json<Value>, BookingServiceError> {
    state.limiter().check(RateClass::Webhook, &ip).await?;
    verify_twilio_signature(
        state.webhooks.messaging_auth_token.as_deref(),
        header(&headers, "x-twilio-signature"),
        &signed_url(&headers, &uri),
        &params,
    )?;

    let from = params.get("From").map(|s| s.trim()).unwrap_or_default();
    let body = params.get("Body").map(|s| s.trim()).unwrap_or_default();
    if from.is_empty() || body.is_empty() {
        return Ok(Json(json!({ "status": "ignored" })));
    }

    let command = InboundCommand::parse(body);
    info!(command = ?command, "inbound chat command");
    let reply = command.reply(state.policy.public_base_url.as_deref());
    if state.messaging.is_configured() {
        if let Err(e) = state.messaging.send(from, &reply, None).await {
            warn!(error = %e, "failed to reply to inbound message");
        }
    }
    Ok(Json(json!({ "status": "ok" })))
}
