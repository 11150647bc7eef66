use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use sea_orm::Database;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use agenda_booking::config::BookingConfig;
use agenda_booking::infra::calendar::GoogleCalendarClient;
use agenda_booking::infra::http::build_client;
use agenda_booking::infra::mail::MailRelayClient;
use agenda_booking::infra::meeting::ZoomClient;
use agenda_booking::infra::messaging::TwilioClient;
use agenda_booking::router::build_router;
use agenda_booking::state::{AppState, Policy, WebhookSecrets};
use agenda_booking::worker::{spawn_dispatch_task, spawn_token_cleanup_task};
use agenda_core::config::Config as _;
use agenda_core::tracing::init_tracing;
use agenda_domain::time::SystemClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info,sqlx=warn");

    let config = BookingConfig::from_env().context("load configuration")?;
    let default_tz = config.default_tz();
    if default_tz.name() != config.default_timezone {
        warn!(
            configured = %config.default_timezone,
            "unknown DEFAULT_TIMEZONE, falling back to UTC"
        );
    }

    let db = Database::connect(&config.database_url)
        .await
        .context("connect to database")?;

    let redis = deadpool_redis::Config::from_url(&config.redis_url)
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .context("create Redis pool")?;

    let http = build_client(config.provider_timeout())?;
    let calendar = GoogleCalendarClient {
        http: http.clone(),
        settings: config.calendar(),
    };
    let meeting = ZoomClient {
        http: http.clone(),
        settings: config.meeting(),
    };
    let messaging = TwilioClient {
        http: http.clone(),
        settings: config.messaging(),
    };
    let mail = MailRelayClient {
        http,
        settings: config.mail(),
    };
    info!(
        calendar = calendar.settings.is_some(),
        meeting = meeting.settings.is_some(),
        messaging = messaging.settings.is_some(),
        mail = mail.settings.is_some(),
        "providers configured"
    );

    let state = AppState {
        db,
        redis,
        calendar,
        meeting,
        messaging,
        mail,
        policy: Arc::new(Policy {
            default_tz,
            public_base_url: config.public_base_url(),
            admin_email: config.admin_email.clone(),
            auto_confirm: config.auto_confirm_bookings,
        }),
        webhooks: Arc::new(WebhookSecrets {
            calendar_channel_token: config.google_channel_token.clone(),
            meeting_secret: config.zoom_webhook_secret.clone(),
            messaging_auth_token: config.twilio_auth_token.clone(),
        }),
        clock: Arc::new(SystemClock),
    };

    let cancel = CancellationToken::new();
    let dispatch = spawn_dispatch_task(state.clone(), config.dispatch_interval(), cancel.clone());
    let cleanup =
        spawn_token_cleanup_task(state.clone(), config.token_cleanup_interval(), cancel.clone());

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.booking_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    info!("booking service listening on {addr}");
    let shutdown = cancel.clone();
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        shutdown.cancel();
    })
    .await
    .context("server error")?;

    cancel.cancel();
    let _ = tokio::join!(dispatch, cleanup);
    Ok(())
}
