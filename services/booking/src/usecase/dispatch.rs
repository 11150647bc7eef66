use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use agenda_domain::id::BookingId;

use crate::domain::repository::{MessagingPort, ScheduledMessageRepository};
use crate::domain::types::{
    BACKOFF_MINUTES, CLAIM_LEASE_MINUTES, DISPATCH_BATCH, MAX_ATTEMPTS, MessageStatus,
    ScheduledMessage,
};
use crate::error::BookingServiceError;

/// Next `send_at` after a failed attempt, or `None` once attempts run out.
pub fn next_attempt_at(attempts: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    (attempts < MAX_ATTEMPTS)
        .then(|| now + Duration::minutes(BACKOFF_MINUTES * i64::from(attempts)))
}

// ── ScheduleMessage ──────────────────────────────────────────────────────────

pub struct ScheduleMessageInput {
    pub booking_id: BookingId,
    pub message_type: String,
    pub recipient: String,
    pub body: String,
    pub media_url: Option<String>,
    pub send_at: DateTime<Utc>,
}

pub fn pending_message(input: ScheduleMessageInput) -> ScheduledMessage {
    ScheduledMessage {
        id: Uuid::now_v7(),
        booking_id: input.booking_id,
        message_type: input.message_type,
        recipient: input.recipient,
        body: input.body,
        media_url: input.media_url,
        send_at: input.send_at,
        status: MessageStatus::Pending,
        attempts: 0,
        provider_message_id: None,
        last_error: None,
        claimed_until: None,
    }
}

pub struct ScheduleMessageUseCase<Q: ScheduledMessageRepository> {
    pub queue: Q,
}

impl<Q: ScheduledMessageRepository> ScheduleMessageUseCase<Q> {
    pub async fn execute(
        &self,
        input: ScheduleMessageInput,
    ) -> Result<ScheduledMessage, BookingServiceError> {
        if input.recipient.trim().is_empty() || input.body.trim().is_empty() {
            return Err(BookingServiceError::MissingData);
        }
        let message = pending_message(input);
        self.queue.create(&message).await?;
        info!(
            message_id = %message.id,
            booking_id = %message.booking_id,
            message_type = %message.message_type,
            send_at = %message.send_at,
            "message scheduled"
        );
        Ok(message)
    }
}

// ── DispatchMessages ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
}

pub struct DispatchMessagesUseCase<Q, W>
where
    Q: ScheduledMessageRepository,
    W: MessagingPort,
{
    pub queue: Q,
    pub messaging: W,
}

impl<Q, W> DispatchMessagesUseCase<Q, W>
where
    Q: ScheduledMessageRepository,
    W: MessagingPort,
{
    /// One worker tick. Claimed messages are leased, so overlapping ticks
    /// never deliver the same message twice.
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<DispatchReport, BookingServiceError> {
        let lease_until = now + Duration::minutes(CLAIM_LEASE_MINUTES);
        let batch = self.queue.claim_due(now, DISPATCH_BATCH, lease_until).await?;

        let mut report = DispatchReport {
            claimed: batch.len(),
            ..Default::default()
        };
        for message in batch {
            self.deliver(&message, now, &mut report).await;
        }
        Ok(report)
    }

    async fn deliver(
        &self,
        message: &ScheduledMessage,
        now: DateTime<Utc>,
        report: &mut DispatchReport,
    ) {
        let outcome = if self.messaging.is_configured() {
            self.messaging
                .send(&message.recipient, &message.body, message.media_url.as_deref())
                .await
        } else {
            Err(BookingServiceError::NotConfigured("messaging provider"))
        };

        let stored = match outcome {
            Ok(sid) => {
                report.sent += 1;
                self.queue.mark_sent(message.id, &sid, now).await
            }
            Err(e) => {
                let attempts = message.attempts + 1;
                let reason = e.to_string();
                match next_attempt_at(attempts, now) {
                    Some(retry_at) => {
                        warn!(
                            message_id = %message.id,
                            attempts,
                            error = %reason,
                            "message delivery failed, will retry"
                        );
                        report.retried += 1;
                        self.queue.mark_retry(message.id, attempts, retry_at, &reason).await
                    }
                    None => {
                        error!(
                            message_id = %message.id,
                            attempts,
                            error = %reason,
                            "message delivery failed permanently"
                        );
                        report.failed += 1;
                        self.queue.mark_failed(message.id, attempts, &reason).await
                    }
                }
            }
        };
        // The lease expires on its own; the next tick picks the message up again.
        if let Err(e) = stored {
            error!(message_id = %message.id, error = %e, "failed to record delivery outcome");
        }
    }
}
