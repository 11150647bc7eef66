use axum::{
    Router,
    routing::{get, patch, post},
};

use agenda_core::health::healthz;
use agenda_core::middleware::{request_id_layer, trace_layer};

use crate::handlers::{
    availability::{get_availability, preview},
    booking::{
        cancel_booking, create_booking, get_booking, issue_token, reschedule_booking,
        schedule_message, set_status,
    },
    health::readyz,
    webhook::{calendar_push, meeting_event, messaging_inbound},
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Availability
        .route("/availability", get(get_availability))
        .route("/slots/preview", get(preview))
        // Bookings
        .route("/bookings", post(create_booking))
        .route("/bookings/{code}", get(get_booking))
        .route("/bookings/{code}/status", patch(set_status))
        .route("/bookings/{code}/tokens", post(issue_token))
        .route("/bookings/{code}/messages", post(schedule_message))
        .route("/bookings/{code}/cancel", post(cancel_booking))
        .route("/bookings/{code}/reschedule", post(reschedule_booking))
        // Webhooks
        .route("/webhooks/calendar", post(calendar_push))
        .route("/webhooks/meeting", post(meeting_event))
        .route("/webhooks/messaging", post(messaging_inbound))
        .layer(trace_layer())
        .layer(request_id_layer())
        .with_state(state)
}
