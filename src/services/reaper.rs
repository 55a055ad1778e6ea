use std::time::{Duration, SystemTime};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    error::ServiceError,
    services::{alerts, room_service},
    state::SharedState,
};

/// Periodically replay the leave path for participants whose disconnect
/// outlived the grace period. Every instance runs the sweep; the store's
/// conditional updates make concurrent sweeps converge.
pub async fn run(state: SharedState) {
    let interval = state.config().reaper_interval;
    let grace = state.config().disconnect_grace;

    loop {
        sleep(interval).await;
        if let Err(err) = sweep(&state, grace).await {
            warn!(error = %err, "reaper sweep failed");
            alerts::notify(&state, format!("reaper sweep failed: {err}"));
        }
    }
}

/// One sweep: collect expired markers, replay each leave, drop the consumed
/// markers. A marker whose replay fails stays behind for the next sweep.
pub async fn sweep(state: &SharedState, grace: Duration) -> Result<(), ServiceError> {
    let Ok(store) = state.require_store().await else {
        // Degraded mode; markers wait until storage is back.
        return Ok(());
    };

    let cutoff = SystemTime::now() - grace;
    let expired = store.expired_disconnects(cutoff).await?;
    if expired.is_empty() {
        return Ok(());
    }

    let mut consumed = Vec::with_capacity(expired.len());
    for marker in expired {
        match room_service::apply_leave(state, marker.who, marker.room_id).await {
            Ok(()) => {
                info!(
                    participant = %marker.who.id,
                    room_id = %marker.room_id,
                    "grace period expired; participant removed"
                );
                consumed.push(marker.id);
            }
            // Room already gone or the participant already left.
            Err(ServiceError::NotFound(_)) => consumed.push(marker.id),
            Err(err) => {
                warn!(
                    participant = %marker.who.id,
                    room_id = %marker.room_id,
                    error = %err,
                    "failed to replay leave; keeping marker for retry"
                );
            }
        }
    }

    if !consumed.is_empty() {
        store.delete_disconnects(consumed).await?;
    }
    Ok(())
}
