use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use agenda_domain::booking::TokenAction;
use agenda_domain::id::BookingId;

use crate::domain::repository::{ActionTokenRepository, BookingRepository, CounterStore, MailPort};
use crate::domain::types::{
    ActionToken, FAILURE_ALERT_THRESHOLD, FAILURE_WINDOW_SECS, TOKEN_BYTES, TOKEN_TTL_HOURS,
    TokenRejection, TokenState,
};
use crate::error::BookingServiceError;

/// 256 random bits, hex-encoded.
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    hex::encode(bytes)
}

/// First characters of a token, safe to log.
pub fn token_preview(token: &str) -> &str {
    token.get(..10).unwrap_or(token)
}

pub fn new_token(
    booking_id: BookingId,
    action: TokenAction,
    ttl_hours: i64,
    ip_address: Option<String>,
    now: DateTime<Utc>,
) -> ActionToken {
    ActionToken {
        id: Uuid::now_v7(),
        booking_id,
        action,
        token: generate_token(),
        expires_at: now + Duration::hours(ttl_hours),
        used: false,
        used_at: None,
        ip_address,
        created_at: now,
    }
}

/// Explain why a presented token was refused for `expected`.
pub fn diagnose(
    found: Option<&ActionToken>,
    expected: TokenAction,
    now: DateTime<Utc>,
) -> TokenRejection {
    match found {
        None => TokenRejection::Unknown,
        Some(token) => match token.state(now) {
            TokenState::Used => TokenRejection::AlreadyUsed,
            TokenState::Expired => TokenRejection::Expired,
            TokenState::Valid if token.action != expected => TokenRejection::WrongAction,
            // Valid and matching yet not consumed: another request won the race.
            TokenState::Valid => TokenRejection::AlreadyUsed,
        },
    }
}

// ── IssueToken ───────────────────────────────────────────────────────────────

pub struct IssueTokenInput {
    pub booking_id: BookingId,
    pub action: TokenAction,
    pub ttl_hours: Option<i64>,
    pub ip_address: Option<String>,
}

pub struct IssueTokenUseCase<B, T>
where
    B: BookingRepository,
    T: ActionTokenRepository,
{
    pub bookings: B,
    pub tokens: T,
}

impl<B, T> IssueTokenUseCase<B, T>
where
    B: BookingRepository,
    T: ActionTokenRepository,
{
    pub async fn execute(
        &self,
        input: IssueTokenInput,
        now: DateTime<Utc>,
    ) -> Result<ActionToken, BookingServiceError> {
        self.bookings
            .find_by_id(input.booking_id)
            .await?
            .ok_or(BookingServiceError::BookingNotFound)?;

        let ttl = input.ttl_hours.filter(|h| *h > 0).unwrap_or(TOKEN_TTL_HOURS);
        let token = new_token(input.booking_id, input.action, ttl, input.ip_address, now);
        self.tokens.create(&token).await?;

        info!(
            booking_id = %token.booking_id,
            action = %token.action,
            expires_at = %token.expires_at,
            "action token issued"
        );
        Ok(token)
    }
}

// ── ValidateToken ────────────────────────────────────────────────────────────

pub struct ValidateTokenUseCase<T, K, M>
where
    T: ActionTokenRepository,
    K: CounterStore,
    M: MailPort,
{
    pub tokens: T,
    pub counters: K,
    pub mail: M,
    pub admin_email: Option<String>,
}

impl<T, K, M> ValidateTokenUseCase<T, K, M>
where
    T: ActionTokenRepository,
    K: CounterStore,
    M: MailPort,
{
    /// Consume `token` for `action` and return the booking it is bound to.
    ///
    /// Every failure surfaces as `InvalidToken`; the specific cause is only
    /// logged.
    pub async fn execute(
        &self,
        token: &str,
        action: TokenAction,
        ip: &str,
        now: DateTime<Utc>,
    ) -> Result<BookingId, BookingServiceError> {
        if let Some(booking_id) = self.tokens.consume(token, action, now).await? {
            info!(booking_id = %booking_id, action = %action, "action token consumed");
            return Ok(booking_id);
        }

        let found = self.tokens.find_by_token(token).await?;
        let cause = diagnose(found.as_ref(), action, now);
        warn!(
            cause = ?cause,
            action = %action,
            token_preview = token_preview(token),
            ip = %ip,
            "action token rejected"
        );
        self.record_failure(ip).await;
        Err(BookingServiceError::InvalidToken)
    }

    /// Count the failure per origin and alert once the threshold is crossed.
    /// Advisory only: errors here never change the outcome.
    async fn record_failure(&self, ip: &str) {
        let key = format!("failed_token_attempts:{ip}");
        let count = match self.counters.hit(&key, FAILURE_WINDOW_SECS).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, ip = %ip, "failed to count token failure");
                return;
            }
        };
        if count != FAILURE_ALERT_THRESHOLD {
            return;
        }

        warn!(ip = %ip, attempts = count, "repeated invalid action tokens from one origin");
        let Some(admin) = self.admin_email.as_deref() else {
            return;
        };
        if !self.mail.is_configured() {
            return;
        }
        let subject = "Security alert: repeated invalid booking tokens";
        let body = format!(
            "{count} invalid cancel/reschedule token attempts were received from {ip} within the last hour.\n\
             No action was taken automatically. Review the service logs if this was not expected."
        );
        if let Err(e) = self.mail.send(admin, subject, &body).await {
            error!(error = %e, "failed to send security alert");
        }
    }
}

// ── CleanupTokens ────────────────────────────────────────────────────────────

pub struct CleanupTokensUseCase<T: ActionTokenRepository> {
    pub tokens: T,
}

impl<T: ActionTokenRepository> CleanupTokensUseCase<T> {
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<u64, BookingServiceError> {
        let removed = self.tokens.delete_expired(now).await?;
        if removed > 0 {
            info!(removed, "expired action tokens deleted");
        }
        Ok(removed)
    }
}
