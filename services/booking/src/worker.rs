//! Background ticks: scheduled-message dispatch and expired-token sweep.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::state::AppState;
use crate::usecase::action_token::CleanupTokensUseCase;
use crate::usecase::dispatch::DispatchMessagesUseCase;

/// Spawn the message dispatch loop. A failing tick is logged and the loop
/// keeps going.
#[must_use]
pub fn spawn_dispatch_task(
    state: AppState,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let usecase = DispatchMessagesUseCase {
            queue: state.message_repo(),
            messaging: state.messaging.clone(),
        };
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("dispatch task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match usecase.execute(state.clock.now()).await {
                        Ok(report) if report.claimed > 0 => info!(?report, "dispatch tick"),
                        Ok(report) => debug!(?report, "dispatch tick"),
                        Err(err) => error!(error = %err, "dispatch tick failed"),
                    }
                }
            }
        }
    })
}

/// Spawn the expired action-token sweep.
#[must_use]
pub fn spawn_token_cleanup_task(
    state: AppState,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let usecase = CleanupTokensUseCase {
            tokens: state.token_repo(),
        };
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("token cleanup task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = usecase.execute(state.clock.now()).await {
                        error!(error = %err, "token cleanup failed");
                    }
                }
            }
        }
    })
}
