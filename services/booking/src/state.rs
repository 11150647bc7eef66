use std::sync::Arc;

use chrono_tz::Tz;
use deadpool_redis::Pool as RedisPool;
use sea_orm::DatabaseConnection;

use agenda_domain::time::Clock;

use crate::infra::cache::{RedisAvailabilityCache, RedisCounterStore};
use crate::infra::calendar::GoogleCalendarClient;
use crate::infra::db::{
    DbActionTokenRepository, DbBookingRepository, DbBusinessHoursRepository,
    DbScheduledMessageRepository, DbServiceRepository,
};
use crate::infra::mail::MailRelayClient;
use crate::infra::meeting::ZoomClient;
use crate::infra::messaging::TwilioClient;
use crate::usecase::action_token::ValidateTokenUseCase;
use crate::usecase::booking::AuthorizeMutationUseCase;
use crate::usecase::notify::Notifier;
use crate::usecase::rate_limit::RateLimiter;

/// Business policy resolved from configuration at startup.
#[derive(Debug, Clone)]
pub struct Policy {
    pub default_tz: Tz,
    pub public_base_url: Option<String>,
    pub admin_email: Option<String>,
    pub auto_confirm: bool,
}

/// Shared secrets for inbound webhook verification.
#[derive(Debug, Clone, Default)]
pub struct WebhookSecrets {
    pub calendar_channel_token: Option<String>,
    pub meeting_secret: Option<String>,
    pub messaging_auth_token: Option<String>,
}

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub redis: RedisPool,
    pub calendar: GoogleCalendarClient,
    pub meeting: ZoomClient,
    pub messaging: TwilioClient,
    pub mail: MailRelayClient,
    pub policy: Arc<Policy>,
    pub webhooks: Arc<WebhookSecrets>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn service_repo(&self) -> DbServiceRepository {
        DbServiceRepository {
            db: self.db.clone(),
        }
    }

    pub fn hours_repo(&self) -> DbBusinessHoursRepository {
        DbBusinessHoursRepository {
            db: self.db.clone(),
        }
    }

    pub fn booking_repo(&self) -> DbBookingRepository {
        DbBookingRepository {
            db: self.db.clone(),
        }
    }

    pub fn token_repo(&self) -> DbActionTokenRepository {
        DbActionTokenRepository {
            db: self.db.clone(),
        }
    }

    pub fn message_repo(&self) -> DbScheduledMessageRepository {
        DbScheduledMessageRepository {
            db: self.db.clone(),
        }
    }

    pub fn availability_cache(&self) -> RedisAvailabilityCache {
        RedisAvailabilityCache {
            pool: self.redis.clone(),
        }
    }

    pub fn counters(&self) -> RedisCounterStore {
        RedisCounterStore {
            pool: self.redis.clone(),
        }
    }

    pub fn limiter(&self) -> RateLimiter<RedisCounterStore> {
        RateLimiter {
            counters: self.counters(),
        }
    }

    pub fn notifier(&self) -> Notifier<TwilioClient, MailRelayClient> {
        Notifier {
            messaging: self.messaging.clone(),
            mail: self.mail.clone(),
            default_tz: self.policy.default_tz,
        }
    }

    pub fn authorizer(
        &self,
    ) -> AuthorizeMutationUseCase<
        DbBookingRepository,
        DbActionTokenRepository,
        RedisCounterStore,
        MailRelayClient,
    > {
        AuthorizeMutationUseCase {
            bookings: self.booking_repo(),
            limiter: self.limiter(),
            validator: ValidateTokenUseCase {
                tokens: self.token_repo(),
                counters: self.counters(),
                mail: self.mail.clone(),
                admin_email: self.policy.admin_email.clone(),
            },
        }
    }
}
