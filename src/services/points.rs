use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    services::scoring::RankedResult,
    state::SharedState,
    state::room::{ParticipantRef, Room},
};

#[derive(Debug, Serialize)]
struct LedgerSubmission {
    who: ParticipantRef,
    quiz_id: Uuid,
    correct: u32,
}

#[derive(Debug, Serialize)]
struct LedgerCredit {
    room_id: Uuid,
    quiz_id: Option<Uuid>,
    round: u32,
    entries: Vec<LedgerEntry>,
}

#[derive(Debug, Serialize)]
struct LedgerEntry {
    who: ParticipantRef,
    rank: u32,
    correct: u32,
}

/// Award points for a single submission's correct answers. Best effort.
pub fn credit_submission(state: &SharedState, who: ParticipantRef, quiz_id: Uuid, correct: u32) {
    let Some(url) = state.config().points_ledger_url.clone() else {
        return;
    };

    let payload = LedgerSubmission {
        who,
        quiz_id,
        correct,
    };
    let client = state.http().clone();

    tokio::spawn(async move {
        let result = client.post(&url).json(&payload).send().await;
        match result {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "points ledger rejected submission credit");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to credit submission to points ledger"),
        }
    });
}

/// Credit a finished round to the external points ledger. Best effort; the
/// ledger reconciles missed rounds on its own schedule.
pub fn credit_round(state: &SharedState, room: &Room, ranked: &[RankedResult]) {
    let Some(url) = state.config().points_ledger_url.clone() else {
        return;
    };

    let payload = LedgerCredit {
        room_id: room.id,
        quiz_id: room.quiz_id,
        round: room.round,
        entries: ranked
            .iter()
            .map(|entry| LedgerEntry {
                who: entry.who,
                rank: entry.rank,
                correct: entry.correct,
            })
            .collect(),
    };
    let client = state.http().clone();

    tokio::spawn(async move {
        let result = client.post(&url).json(&payload).send().await;
        match result {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "points ledger rejected round credit");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to credit round to points ledger"),
        }
    });
}
