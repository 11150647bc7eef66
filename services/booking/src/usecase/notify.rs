//! Transactional notifications: message composition, self-service links and
//! best-effort delivery over e-mail and WhatsApp.

use chrono_tz::Tz;
use serde::Serialize;
use tracing::warn;

use agenda_domain::booking::BookingStatus;

use crate::domain::repository::{MailPort, MessagingPort};
use crate::domain::types::{Booking, SideEffect, SideEffectTarget};

/// Self-service URLs embedded in client messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManageLinks {
    pub manage: String,
    pub cancel: String,
    pub reschedule: String,
}

pub fn manage_links(
    base_url: &str,
    code: &str,
    cancel_token: &str,
    reschedule_token: &str,
) -> ManageLinks {
    let page = format!("{}/manage-booking/", base_url.trim_end_matches('/'));
    ManageLinks {
        manage: format!("{page}?code={code}&ct={cancel_token}&rt={reschedule_token}"),
        cancel: format!("{page}?code={code}&ct={cancel_token}"),
        reschedule: format!("{page}?code={code}&rt={reschedule_token}"),
    }
}

/// Subject and body of one outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

fn local_when(booking: &Booking, fallback: Tz) -> (String, String) {
    let tz = booking.tz(fallback);
    let start = booking.start_at.with_timezone(&tz);
    (
        start.format("%Y-%m-%d").to_string(),
        format!("{} ({})", start.format("%H:%M"), tz.name()),
    )
}

pub fn confirmation_message(
    booking: &Booking,
    service_name: &str,
    links: Option<&ManageLinks>,
    fallback: Tz,
) -> Message {
    let (date, time) = local_when(booking, fallback);
    let headline = match booking.status {
        BookingStatus::Confirmed => "Your booking is confirmed.",
        _ => "We received your booking request and will confirm it shortly.",
    };
    let mut body = format!(
        "Hello {name},\n\n{headline}\n\nService: {service_name}\nDate: {date}\nTime: {time}\nCode: {code}\n",
        name = booking.client_name,
        code = booking.code,
    );
    if let Some(url) = booking.refs.meeting_join_url.as_deref() {
        body.push_str(&format!("Video call: {url}\n"));
    }
    if let Some(links) = links {
        body.push_str(&format!(
            "\nManage your booking: {}\nCancel: {}\nReschedule: {}\n",
            links.manage, links.cancel, links.reschedule
        ));
    }
    Message {
        subject: format!("Booking {} for {date}", booking.code),
        body,
    }
}

pub fn cancellation_message(booking: &Booking, reason: Option<&str>, fallback: Tz) -> Message {
    let (date, time) = local_when(booking, fallback);
    let mut body = format!(
        "Hello {name},\n\nYour booking {code} on {date} at {time} has been cancelled.\n",
        name = booking.client_name,
        code = booking.code,
    );
    if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
        body.push_str(&format!("Reason: {reason}\n"));
    }
    Message {
        subject: format!("Booking {} cancelled", booking.code),
        body,
    }
}

pub fn reschedule_message(booking: &Booking, fallback: Tz) -> Message {
    let (date, time) = local_when(booking, fallback);
    let mut body = format!(
        "Hello {name},\n\nYour booking {code} has been moved to {date} at {time}.\n",
        name = booking.client_name,
        code = booking.code,
    );
    if let Some(url) = booking.refs.meeting_join_url.as_deref() {
        body.push_str(&format!("Video call: {url}\n"));
    }
    Message {
        subject: format!("Booking {} rescheduled", booking.code),
        body,
    }
}

pub fn reminder_message(booking: &Booking, service_name: &str, fallback: Tz) -> Message {
    let (date, time) = local_when(booking, fallback);
    let mut body = format!(
        "Reminder: {service_name} tomorrow, {date} at {time}. Code {code}.",
        code = booking.code,
    );
    if let Some(url) = booking.refs.meeting_join_url.as_deref() {
        body.push_str(&format!(" Join: {url}"));
    }
    Message {
        subject: format!("Reminder for booking {}", booking.code),
        body,
    }
}

// ── Notifier ─────────────────────────────────────────────────────────────────

/// Sends client notifications. Every call reports an outcome instead of
/// failing; delivery problems are logged and never abort the caller.
pub struct Notifier<W, E>
where
    W: MessagingPort,
    E: MailPort,
{
    pub messaging: W,
    pub mail: E,
    pub default_tz: Tz,
}

impl<W, E> Notifier<W, E>
where
    W: MessagingPort,
    E: MailPort,
{
    pub async fn email(&self, to: &str, message: &Message) -> SideEffect {
        if !self.mail.is_configured() || to.trim().is_empty() {
            return SideEffect::skipped(SideEffectTarget::Email);
        }
        match self.mail.send(to, &message.subject, &message.body).await {
            Ok(()) => SideEffect::applied(SideEffectTarget::Email),
            Err(e) => {
                warn!(error = %e, "email delivery failed");
                SideEffect::failed(SideEffectTarget::Email)
            }
        }
    }

    pub async fn whatsapp(&self, to: Option<&str>, message: &Message) -> SideEffect {
        let Some(to) = to.filter(|t| !t.trim().is_empty()) else {
            return SideEffect::skipped(SideEffectTarget::Whatsapp);
        };
        if !self.messaging.is_configured() {
            return SideEffect::skipped(SideEffectTarget::Whatsapp);
        }
        match self.messaging.send(to, &message.body, None).await {
            Ok(_) => SideEffect::applied(SideEffectTarget::Whatsapp),
            Err(e) => {
                warn!(error = %e, "whatsapp delivery failed");
                SideEffect::failed(SideEffectTarget::Whatsapp)
            }
        }
    }

    /// Same message over both channels.
    pub async fn both(&self, booking: &Booking, message: &Message) -> Vec<SideEffect> {
        vec![
            self.whatsapp(booking.client_phone.as_deref(), message).await,
            self.email(&booking.client_email, message).await,
        ]
    }

    pub async fn booking_created(
        &self,
        booking: &Booking,
        service_name: &str,
        links: Option<&ManageLinks>,
    ) -> Vec<SideEffect> {
        let message = confirmation_message(booking, service_name, links, self.default_tz);
        self.both(booking, &message).await
    }

    pub async fn booking_cancelled(
        &self,
        booking: &Booking,
        reason: Option<&str>,
    ) -> Vec<SideEffect> {
        let message = cancellation_message(booking, reason, self.default_tz);
        self.both(booking, &message).await
    }

    pub async fn booking_rescheduled(&self, booking: &Booking) -> Vec<SideEffect> {
        let message = reschedule_message(booking, self.default_tz);
        self.both(booking, &message).await
    }
}
