use axum::{Json, extract::State, http::StatusCode};
use tracing::warn;

use agenda_core::health::{Check, Readiness, readiness};

use crate::infra::cache::ping;
use crate::state::AppState;

// ── GET /readyz ──────────────────────────────────────────────────────────────

/// Ready when both Postgres and Redis answer. Providers are not probed; their
/// outages degrade features instead of taking the service out of rotation.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "readiness: database ping failed");
            false
        }
    };
    let redis = match ping(&state.redis).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = ?e, "readiness: redis ping failed");
            false
        }
    };
    readiness(vec![
        Check {
            name: "database",
            ok: database,
        },
        Check {
            name: "redis",
            ok: redis,
        },
    ])
}
