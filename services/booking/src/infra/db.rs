use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use agenda_booking_schema::{action_tokens, bookings, business_hours, scheduled_messages, services};
use agenda_domain::booking::{BookingStatus, TokenAction};
use agenda_domain::id::{BookingCode, BookingId, ServiceId};

use crate::domain::repository::{
    ActionTokenRepository, BookingRepository, BusinessHoursRepository, ScheduledMessageRepository,
    ServiceRepository,
};
use crate::domain::types::{
    ActionToken, Booking, BusinessHours, BusyInterval, BusySource, ExternalRefs, MessageStatus,
    ScheduledMessage, Service,
};
use crate::error::BookingServiceError;

// ── Service repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbServiceRepository {
    pub db: DatabaseConnection,
}

impl ServiceRepository for DbServiceRepository {
    async fn find_by_id(&self, id: ServiceId) -> Result<Option<Service>, BookingServiceError> {
        let model = services::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .context("find service")?;
        Ok(model.map(service_from_model))
    }
}

fn service_from_model(m: services::Model) -> Service {
    Service {
        id: ServiceId(m.id),
        name: m.name,
        duration_minutes: i64::from(m.duration_minutes),
        price_cents: m.price_cents,
        color: m.color,
        buffer_before_minutes: i64::from(m.buffer_before_minutes),
        buffer_after_minutes: i64::from(m.buffer_after_minutes),
        active: m.active,
    }
}

// ── Business hours repository ────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbBusinessHoursRepository {
    pub db: DatabaseConnection,
}

impl BusinessHoursRepository for DbBusinessHoursRepository {
    async fn find_by_weekday(
        &self,
        weekday: u8,
    ) -> Result<Option<BusinessHours>, BookingServiceError> {
        let model = business_hours::Entity::find_by_id(i16::from(weekday))
            .one(&self.db)
            .await
            .context("find business hours")?;
        Ok(model.map(|m| BusinessHours {
            weekday,
            open: m.open_time,
            close: m.close_time,
            slot_minutes: i64::from(m.slot_minutes),
            active: m.active,
        }))
    }
}

// ── Booking repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbBookingRepository {
    pub db: DatabaseConnection,
}

impl BookingRepository for DbBookingRepository {
    async fn find_by_code(
        &self,
        code: &BookingCode,
    ) -> Result<Option<Booking>, BookingServiceError> {
        let model = bookings::Entity::find()
            .filter(bookings::Column::Code.eq(code.as_str()))
            .one(&self.db)
            .await
            .context("find booking by code")?;
        model.map(booking_from_model).transpose()
    }

    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, BookingServiceError> {
        let model = bookings::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .context("find booking by id")?;
        model.map(booking_from_model).transpose()
    }

    async fn code_exists(&self, code: &str) -> Result<bool, BookingServiceError> {
        let count = bookings::Entity::find()
            .filter(bookings::Column::Code.eq(code))
            .count(&self.db)
            .await
            .context("check booking code")?;
        Ok(count > 0)
    }

    async fn create(&self, booking: &Booking) -> Result<(), BookingServiceError> {
        bookings::ActiveModel {
            id: Set(booking.id.0),
            code: Set(booking.code.as_str().to_owned()),
            service_id: Set(booking.service_id.0),
            client_name: Set(booking.client_name.clone()),
            client_email: Set(booking.client_email.clone()),
            client_phone: Set(booking.client_phone.clone()),
            start_at: Set(booking.start_at),
            end_at: Set(booking.end_at),
            timezone: Set(booking.timezone.clone()),
            status: Set(booking.status.as_str().to_owned()),
            calendar_event_id: Set(booking.refs.calendar_event_id.clone()),
            meeting_id: Set(booking.refs.meeting_id.clone()),
            meeting_join_url: Set(booking.refs.meeting_join_url.clone()),
            notes: Set(booking.notes.clone()),
            created_at: Set(booking.created_at),
            updated_at: Set(booking.updated_at),
        }
        .insert(&self.db)
        .await
        .context("insert booking")?;
        Ok(())
    }

    async fn list_busy(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, BookingServiceError> {
        let blocking =
            [BookingStatus::Pending, BookingStatus::Confirmed].map(BookingStatus::as_str);
        let models = bookings::Entity::find()
            .filter(bookings::Column::Status.is_in(blocking))
            .filter(bookings::Column::StartAt.gte(start))
            .filter(bookings::Column::EndAt.lte(end))
            .order_by_asc(bookings::Column::StartAt)
            .all(&self.db)
            .await
            .context("list busy bookings")?;
        Ok(models
            .into_iter()
            .map(|m| BusyInterval {
                start: m.start_at,
                end: m.end_at,
                source: BusySource::LocalBooking,
            })
            .collect())
    }

    async fn update_status(
        &self,
        id: BookingId,
        status: BookingStatus,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), BookingServiceError> {
        let mut active = bookings::ActiveModel {
            id: Set(id.0),
            status: Set(status.as_str().to_owned()),
            updated_at: Set(now),
            ..Default::default()
        };
        if let Some(notes) = notes {
            active.notes = Set(notes.to_owned());
        }
        active.update(&self.db).await.context("update booking status")?;
        Ok(())
    }

    async fn reschedule(
        &self,
        id: BookingId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BookingServiceError> {
        bookings::ActiveModel {
            id: Set(id.0),
            start_at: Set(start),
            end_at: Set(end),
            timezone: Set(timezone.to_owned()),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("reschedule booking")?;
        Ok(())
    }

    async fn set_external_refs(
        &self,
        id: BookingId,
        refs: &ExternalRefs,
        now: DateTime<Utc>,
    ) -> Result<(), BookingServiceError> {
        bookings::ActiveModel {
            id: Set(id.0),
            calendar_event_id: Set(refs.calendar_event_id.clone()),
            meeting_id: Set(refs.meeting_id.clone()),
            meeting_join_url: Set(refs.meeting_join_url.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("store booking external refs")?;
        Ok(())
    }
}

fn booking_from_model(m: bookings::Model) -> Result<Booking, BookingServiceError> {
    let status: BookingStatus = m
        .status
        .parse()
        .with_context(|| format!("booking {} has status {:?}", m.id, m.status))?;
    Ok(Booking {
        id: BookingId(m.id),
        code: BookingCode(m.code),
        service_id: ServiceId(m.service_id),
        client_name: m.client_name,
        client_email: m.client_email,
        client_phone: m.client_phone,
        start_at: m.start_at,
        end_at: m.end_at,
        timezone: m.timezone,
        status,
        refs: ExternalRefs {
            calendar_event_id: m.calendar_event_id,
            meeting_id: m.meeting_id,
            meeting_join_url: m.meeting_join_url,
        },
        notes: m.notes,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

// ── Action token repository ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbActionTokenRepository {
    pub db: DatabaseConnection,
}

impl ActionTokenRepository for DbActionTokenRepository {
    async fn create(&self, token: &ActionToken) -> Result<(), BookingServiceError> {
        action_tokens::ActiveModel {
            id: Set(token.id),
            booking_id: Set(token.booking_id.0),
            action: Set(token.action.as_str().to_owned()),
            token: Set(token.token.clone()),
            expires_at: Set(token.expires_at),
            used: Set(token.used),
            used_at: Set(token.used_at),
            ip_address: Set(token.ip_address.clone()),
            created_at: Set(token.created_at),
        }
        .insert(&self.db)
        .await
        .context("insert action token")?;
        Ok(())
    }

    async fn consume(
        &self,
        token: &str,
        action: TokenAction,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingId>, BookingServiceError> {
        let token = token.to_owned();
        let booking_id = self
            .db
            .transaction::<_, Option<Uuid>, DbErr>(|txn| {
                Box::pin(async move {
                    let result = action_tokens::Entity::update_many()
                        .col_expr(action_tokens::Column::Used, Expr::value(true))
                        .col_expr(action_tokens::Column::UsedAt, Expr::value(now))
                        .filter(action_tokens::Column::Token.eq(token.as_str()))
                        .filter(action_tokens::Column::Action.eq(action.as_str()))
                        .filter(action_tokens::Column::Used.eq(false))
                        .filter(action_tokens::Column::ExpiresAt.gt(now))
                        .exec(txn)
                        .await?;
                    if result.rows_affected != 1 {
                        return Ok(None);
                    }
                    let model = action_tokens::Entity::find()
                        .filter(action_tokens::Column::Token.eq(token.as_str()))
                        .one(txn)
                        .await?;
                    Ok(model.map(|m| m.booking_id))
                })
            })
            .await
            .context("consume action token")?;
        Ok(booking_id.map(BookingId))
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ActionToken>, BookingServiceError> {
        let model = action_tokens::Entity::find()
            .filter(action_tokens::Column::Token.eq(token))
            .one(&self.db)
            .await
            .context("find action token")?;
        model.map(token_from_model).transpose()
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, BookingServiceError> {
        let result = action_tokens::Entity::delete_many()
            .filter(action_tokens::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await
            .context("delete expired action tokens")?;
        Ok(result.rows_affected)
    }
}

fn token_from_model(m: action_tokens::Model) -> Result<ActionToken, BookingServiceError> {
    let action: TokenAction = m
        .action
        .parse()
        .with_context(|| format!("action token {} has action {:?}", m.id, m.action))?;
    Ok(ActionToken {
        id: m.id,
        booking_id: BookingId(m.booking_id),
        action,
        token: m.token,
        expires_at: m.expires_at,
        used: m.used,
        used_at: m.used_at,
        ip_address: m.ip_address,
        created_at: m.created_at,
    })
}

// ── Scheduled message repository ─────────────────────────────────────────────

#[derive(Clone)]
pub struct DbScheduledMessageRepository {
    pub db: DatabaseConnection,
}

impl ScheduledMessageRepository for DbScheduledMessageRepository {
    async fn create(&self, message: &ScheduledMessage) -> Result<(), BookingServiceError> {
        let now = Utc::now();
        scheduled_messages::ActiveModel {
            id: Set(message.id),
            booking_id: Set(message.booking_id.0),
            message_type: Set(message.message_type.clone()),
            recipient: Set(message.recipient.clone()),
            body: Set(message.body.clone()),
            media_url: Set(message.media_url.clone()),
            send_at: Set(message.send_at),
            claimed_until: Set(message.claimed_until),
            status: Set(message.status.as_str().to_owned()),
            attempts: Set(message.attempts as i32),
            provider_message_id: Set(message.provider_message_id.clone()),
            last_error: Set(message.last_error.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .context("insert scheduled message")?;
        Ok(())
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<ScheduledMessage>, BookingServiceError> {
        let models = self
            .db
            .transaction::<_, Vec<scheduled_messages::Model>, DbErr>(|txn| {
                Box::pin(async move {
                    let due = scheduled_messages::Entity::find()
                        .filter(
                            scheduled_messages::Column::Status
                                .eq(MessageStatus::Pending.as_str()),
                        )
                        .filter(scheduled_messages::Column::SendAt.lte(now))
                        .filter(
                            Condition::any()
                                .add(scheduled_messages::Column::ClaimedUntil.is_null())
                                .add(scheduled_messages::Column::ClaimedUntil.lte(now)),
                        )
                        .order_by_asc(scheduled_messages::Column::SendAt)
                        .limit(limit)
                        .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
                        .all(txn)
                        .await?;
                    if due.is_empty() {
                        return Ok(due);
                    }
                    let ids: Vec<Uuid> = due.iter().map(|m| m.id).collect();
                    scheduled_messages::Entity::update_many()
                        .col_expr(
                            scheduled_messages::Column::ClaimedUntil,
                            Expr::value(Some(lease_until)),
                        )
                        .col_expr(scheduled_messages::Column::UpdatedAt, Expr::value(now))
                        .filter(scheduled_messages::Column::Id.is_in(ids))
                        .exec(txn)
                        .await?;
                    Ok(due)
                })
            })
            .await
            .context("claim due messages")?;
        models.into_iter().map(message_from_model).collect()
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        provider_message_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BookingServiceError> {
        scheduled_messages::ActiveModel {
            id: Set(id),
            status: Set(MessageStatus::Sent.as_str().to_owned()),
            provider_message_id: Set(Some(provider_message_id.to_owned())),
            last_error: Set(None),
            claimed_until: Set(None),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("mark message sent")?;
        Ok(())
    }

    async fn mark_retry(
        &self,
        id: Uuid,
        attempts: u32,
        next_send_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), BookingServiceError> {
        scheduled_messages::ActiveModel {
            id: Set(id),
            attempts: Set(attempts as i32),
            send_at: Set(next_send_at),
            claimed_until: Set(None),
            last_error: Set(Some(error.to_owned())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("mark message for retry")?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        attempts: u32,
        error: &str,
    ) -> Result<(), BookingServiceError> {
        scheduled_messages::ActiveModel {
            id: Set(id),
            status: Set(MessageStatus::Failed.as_str().to_owned()),
            attempts: Set(attempts as i32),
            claimed_until: Set(None),
            last_error: Set(Some(error.to_owned())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("mark message failed")?;
        Ok(())
    }
}

fn message_from_model(
    m: scheduled_messages::Model,
) -> Result<ScheduledMessage, BookingServiceError> {
    let status = MessageStatus::parse(&m.status)
        .with_context(|| format!("scheduled message {} has status {:?}", m.id, m.status))?;
    Ok(ScheduledMessage {
        id: m.id,
        booking_id: BookingId(m.booking_id),
        message_type: m.message_type,
        recipient: m.recipient,
        body: m.body,
        media_url: m.media_url,
        send_at: m.send_at,
        status,
        attempts: u32::try_from(m.attempts).unwrap_or_default(),
        provider_message_id: m.provider_message_id,
        last_error: m.last_error,
        claimed_until: m.claimed_until,
    })
}
