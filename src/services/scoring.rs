use std::{sync::Arc, time::SystemTime};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{QuestionDelta, QuizReport, QuizStatDelta, RoundResult},
        room_store::RoomStore,
    },
    dto::{
        common::Identity,
        format_system_time,
        room::{EventKind, ReportView, RoundDoneEntry, RoundDoneEvent, SubmitResultRequest},
    },
    error::ServiceError,
    services::{points, presence},
    state::SharedState,
    state::room::{Membership, ParticipantRef, Room},
};

/// One participant's final standing within a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedResult {
    pub result_id: Uuid,
    pub who: ParticipantRef,
    pub rank: u32,
    pub correct: u32,
    pub attempts: u32,
}

/// Record a participant's round submission and flip it out of `play`. When
/// the submission completes the round, the whole reconciliation runs and the
/// submitter's own `gameDone` payload comes back with the response.
pub async fn submit_result(
    state: &SharedState,
    identity: &Identity,
    request: SubmitResultRequest,
) -> Result<Option<RoundDoneEvent>, ServiceError> {
    let store = state.require_store().await?;

    let room = match request.room_id {
        Some(room_id) => {
            let Some(room) = store.find_room(room_id).await? else {
                return Err(ServiceError::NotFound(format!(
                    "room `{room_id}` not found"
                )));
            };
            if room.membership_of(identity.who).is_none() {
                return Err(ServiceError::Forbidden("not part of this room".into()));
            }
            if room.quiz_id != Some(request.quiz_id) {
                return Err(ServiceError::InvalidState(
                    "submitted quiz does not match the room's quiz".into(),
                ));
            }
            Some(room)
        }
        None => None,
    };

    let now = SystemTime::now();
    let result = RoundResult {
        id: Uuid::new_v4(),
        who: identity.who,
        quiz_id: request.quiz_id,
        room_id: room.as_ref().map(|room| room.id),
        round: room.as_ref().map(|room| room.round),
        answer_order: request.answer_order.clone(),
        answer_time: request.answer_time.clone(),
        answer_correct: request.answer_correct.clone(),
        age_learn: request.age_learn,
        age_cognitive: request.age_cognitive,
        age_activity: request.age_activity,
        rank: None,
        recorded_at: now,
    };
    let correct = result.correct_count() as u32;
    store.insert_round_result(result).await?;
    store
        .bump_quiz_stats(request.quiz_id, stat_delta(&request))
        .await?;
    points::credit_submission(state, identity.who, request.quiz_id, correct);

    if !request.reports.is_empty() {
        let reports = request
            .reports
            .iter()
            .map(|entry| QuizReport {
                id: Uuid::new_v4(),
                who: identity.who,
                quiz_id: request.quiz_id,
                room_id: room.as_ref().map(|room| room.id),
                round: room.as_ref().map(|room| room.round),
                pos: entry.pos,
                content: entry.content.clone(),
                created_at: now,
            })
            .collect();
        store.insert_quiz_reports(reports).await?;
    }

    // Solo play has no round to reconcile.
    let Some(room) = room else {
        return Ok(None);
    };

    // The conditional update doubles as the "was actually playing" check.
    let updated = match room.membership_of(identity.who) {
        Some(Membership::Host) => store.clear_host_playing(room.id).await?,
        _ => {
            store
                .set_member_status(
                    room.id,
                    identity.who,
                    crate::state::room::MemberStatus::Play,
                    crate::state::room::MemberStatus::Join,
                )
                .await?
        }
    };
    let Some(updated) = updated else {
        return Err(ServiceError::InvalidState(
            "no running round to submit for".into(),
        ));
    };

    if updated.round_done() {
        return finalize_round(state, &updated, Some(identity.who)).await;
    }
    Ok(None)
}

/// Rank the round, fold pairwise records, and push each participant its own
/// `gameDone` payload. Safe to run more than once for the same round: ranks
/// are rewritten with the same values and pairwise folds are stamped. When a
/// `subject` is given, its payload is also returned to the caller.
pub async fn finalize_round(
    state: &SharedState,
    room: &Room,
    subject: Option<ParticipantRef>,
) -> Result<Option<RoundDoneEvent>, ServiceError> {
    let store = state.require_store().await?;
    if room.round == 0 {
        return Ok(None);
    }

    let results = store.round_results(room.id, room.round).await?;
    if results.is_empty() {
        // Every player left before submitting anything.
        info!(room_id = %room.id, round = room.round, "round ended without submissions");
        return Ok(None);
    }

    let ranked = rank_results(&results);
    for entry in &ranked {
        store.set_round_rank(entry.result_id, entry.rank).await?;
    }
    reconcile_pairwise(&store, room, &ranked).await?;

    let reports = store.quiz_reports(room.id, room.round).await?;

    // Everything but the head-to-head column reads the same for every
    // receiver; each row carries its own player's submission and reports.
    let base_rows: Vec<RoundDoneEntry> = ranked
        .iter()
        .map(|entry| {
            let submission = results.iter().find(|r| r.id == entry.result_id);
            RoundDoneEntry {
                who: entry.who,
                name: room
                    .profile_of(entry.who)
                    .map(|profile| profile.name.clone())
                    .unwrap_or_default(),
                rank: entry.rank,
                correct: entry.correct,
                attempts: entry.attempts,
                answer_order: submission
                    .map(|r| r.answer_order.clone())
                    .unwrap_or_default(),
                answer_correct: submission
                    .map(|r| r.answer_correct.clone())
                    .unwrap_or_default(),
                age_learn: submission.map(|r| r.age_learn).unwrap_or_default(),
                age_cognitive: submission.map(|r| r.age_cognitive).unwrap_or_default(),
                age_activity: submission.map(|r| r.age_activity).unwrap_or_default(),
                reports: reports
                    .iter()
                    .filter(|report| report.who == entry.who)
                    .map(ReportView::from)
                    .collect(),
                vs: None,
            }
        })
        .collect();

    let finished_at = format_system_time(SystemTime::now());
    let mut own_payload = None;
    for receiver in room.everyone() {
        let mut standings = base_rows.clone();
        for row in &mut standings {
            if row.who != receiver {
                row.vs = store
                    .find_pairwise(receiver, row.who)
                    .await?
                    .map(|record| record.tally_for(receiver).into());
            }
        }

        let event = RoundDoneEvent {
            event: EventKind::GameDone,
            room_id: room.id,
            quiz_id: room.quiz_id,
            round: room.round,
            finished_at: finished_at.clone(),
            rank: ranked
                .iter()
                .find(|entry| entry.who == receiver)
                .map(|entry| entry.rank),
            standings,
        };
        if subject == Some(receiver) {
            own_payload = Some(event.clone());
        }
        presence::send_to(state, receiver, &event).await;
    }

    points::credit_round(state, room, &ranked);
    Ok(own_payload)
}

/// Order results into standings: more correct answers rank higher, and a tie
/// on correct answers goes to whoever needed fewer attempts. Full ties share
/// a rank.
pub fn rank_results(results: &[RoundResult]) -> Vec<RankedResult> {
    let mut ranked: Vec<RankedResult> = results
        .iter()
        .map(|result| RankedResult {
            result_id: result.id,
            who: result.who,
            rank: 0,
            correct: result.correct_count() as u32,
            attempts: result.attempt_count() as u32,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.correct
            .cmp(&a.correct)
            .then(a.attempts.cmp(&b.attempts))
            .then(a.who.id.cmp(&b.who.id))
    });

    let mut last_key: Option<(u32, u32)> = None;
    let mut last_rank = 0;
    for (position, entry) in ranked.iter_mut().enumerate() {
        let key = (entry.correct, entry.attempts);
        if last_key != Some(key) {
            last_rank = position as u32 + 1;
            last_key = Some(key);
        }
        entry.rank = last_rank;
    }
    ranked
}

/// Fold every ranked pair of the round into its head-to-head record exactly
/// once, whichever instance gets here first.
async fn reconcile_pairwise(
    store: &Arc<dyn RoomStore>,
    room: &Room,
    ranked: &[RankedResult],
) -> Result<(), ServiceError> {
    for i in 0..ranked.len() {
        for j in (i + 1)..ranked.len() {
            let a = &ranked[i];
            let b = &ranked[j];
            let winner = if a.rank == b.rank {
                None
            } else if a.rank < b.rank {
                Some(a.who)
            } else {
                Some(b.who)
            };

            let applied = match store.find_pairwise(a.who, b.who).await? {
                Some(record) => {
                    if record.stamped_with(room.id, room.round) {
                        continue;
                    }
                    let from_side_won = winner.is_some_and(|w| record.from == w);
                    store
                        .apply_pairwise(
                            Some(record.id),
                            record.from,
                            record.to,
                            from_side_won,
                            room.id,
                            room.round,
                        )
                        .await?
                }
                None => {
                    let from_side_won = winner.is_some_and(|w| a.who == w);
                    store
                        .apply_pairwise(None, a.who, b.who, from_side_won, room.id, room.round)
                        .await?
                }
            };

            if applied.is_none() {
                // A concurrent finalization already stamped this round.
                warn!(
                    room_id = %room.id,
                    round = room.round,
                    "pairwise fold skipped; round already applied"
                );
            }
        }
    }
    Ok(())
}

fn stat_delta(request: &SubmitResultRequest) -> QuizStatDelta {
    let mut questions: Vec<QuestionDelta> = Vec::new();
    for (index, pos) in request.answer_order.iter().enumerate() {
        let correct = u32::from(request.answer_correct[index]);
        match questions.iter_mut().find(|q| q.pos == *pos) {
            Some(question) => {
                question.tries += 1;
                question.correct += correct;
            }
            None => questions.push(QuestionDelta {
                pos: *pos,
                tries: 1,
                correct,
            }),
        }
    }

    QuizStatDelta {
        questions,
        age_learn: request.age_learn,
        age_cognitive: request.age_cognitive,
        age_activity: request.age_activity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::room_store::fake::FakeRoomStore,
        state::AppState,
        state::room::{
            HostRole, MemberStatus, ParticipantKind, Profile, RoomHost, RoomMember,
        },
    };

    fn test_state() -> SharedState {
        AppState::new(AppConfig {
            env_name: "test".into(),
            port: 0,
            peer_health_url: None,
            self_addr: None,
            peer_refresh: std::time::Duration::from_secs(30),
            reaper_interval: std::time::Duration::from_secs(15),
            disconnect_grace: std::time::Duration::from_secs(60),
            alert_webhook_url: None,
            points_ledger_url: None,
            voice_channel_prefix: "room".into(),
        })
    }

    async fn state_with_store() -> (SharedState, FakeRoomStore) {
        let state = test_state();
        let store = FakeRoomStore::new();
        state.install_room_store(std::sync::Arc::new(store.clone())).await;
        (state, store)
    }

    // A finished first round: watching host, two members back in `join`.
    fn finished_room() -> Room {
        Room {
            id: Uuid::from_u128(8),
            quiz_id: Some(Uuid::from_u128(7)),
            round: 1,
            voice_channel: "room-test".into(),
            host: RoomHost {
                who: participant(1),
                profile: Profile {
                    name: "host".into(),
                    ..Profile::default()
                },
                role: HostRole::Watch,
                playing: false,
            },
            members: vec![
                RoomMember {
                    who: participant(2),
                    profile: Profile {
                        name: "member-2".into(),
                        ..Profile::default()
                    },
                    status: MemberStatus::Join,
                },
                RoomMember {
                    who: participant(3),
                    profile: Profile {
                        name: "member-3".into(),
                        ..Profile::default()
                    },
                    status: MemberStatus::Join,
                },
            ],
        }
    }

    fn participant(n: u128) -> ParticipantRef {
        ParticipantRef {
            id: Uuid::from_u128(n),
            kind: ParticipantKind::Student,
        }
    }

    fn result(n: u128, correct: &[bool]) -> RoundResult {
        RoundResult {
            id: Uuid::from_u128(n + 1000),
            who: participant(n),
            quiz_id: Uuid::from_u128(7),
            room_id: Some(Uuid::from_u128(8)),
            round: Some(1),
            answer_order: (0..correct.len() as u32).collect(),
            answer_time: vec![100; correct.len()],
            answer_correct: correct.to_vec(),
            age_learn: 7.0,
            age_cognitive: 7.0,
            age_activity: 7.0,
            rank: None,
            recorded_at: SystemTime::now(),
        }
    }

    #[test]
    fn more_correct_ranks_higher() {
        let ranked = rank_results(&[
            result(1, &[true, false]),
            result(2, &[true, true]),
            result(3, &[false, false]),
        ]);
        assert_eq!(ranked[0].who, participant(2));
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].who, participant(1));
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[2].who, participant(3));
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn tie_on_correct_goes_to_fewer_attempts() {
        // Both got 2 right; participant 1 needed an extra attempt and loses.
        let ranked = rank_results(&[
            result(1, &[true, true, false]),
            result(2, &[true, true]),
        ]);
        assert_eq!(ranked[0].who, participant(2));
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].who, participant(1));
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn full_ties_share_a_rank() {
        let ranked = rank_results(&[
            result(1, &[true, true]),
            result(2, &[true, true]),
            result(3, &[false]),
        ]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn stat_delta_groups_repeated_positions() {
        let request = SubmitResultRequest {
            room_id: Some(Uuid::from_u128(1)),
            quiz_id: Uuid::from_u128(2),
            answer_order: vec![0, 1, 0],
            answer_time: vec![100, 200, 300],
            answer_correct: vec![false, true, true],
            age_learn: 7.0,
            age_cognitive: 7.5,
            age_activity: 6.5,
            reports: vec![],
        };
        let delta = stat_delta(&request);
        assert_eq!(
            delta.questions,
            vec![
                QuestionDelta {
                    pos: 0,
                    tries: 2,
                    correct: 1
                },
                QuestionDelta {
                    pos: 1,
                    tries: 1,
                    correct: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn finalizing_the_same_round_twice_folds_pairwise_once() {
        let (state, store) = state_with_store().await;
        let room = finished_room();
        store.insert_room(room.clone()).await.unwrap();
        store
            .insert_round_result(result(2, &[true, true]))
            .await
            .unwrap();
        store
            .insert_round_result(result(3, &[true, false]))
            .await
            .unwrap();

        finalize_round(&state, &room, None).await.unwrap();
        let first = store.pairwise_records();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].all, 1);

        // A replay (second finalizer, reaper, racing instance) changes nothing.
        finalize_round(&state, &room, None).await.unwrap();
        let second = store.pairwise_records();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].all, 1);
        assert_eq!(second[0].win, first[0].win);
    }

    #[tokio::test]
    async fn done_payload_carries_each_players_answers_and_reports() {
        let (state, store) = state_with_store().await;
        let room = finished_room();
        store.insert_room(room.clone()).await.unwrap();
        store
            .insert_round_result(result(2, &[true, true]))
            .await
            .unwrap();
        store
            .insert_round_result(result(3, &[true, false]))
            .await
            .unwrap();
        store
            .insert_quiz_reports(vec![QuizReport {
                id: Uuid::from_u128(600),
                who: participant(3),
                quiz_id: Uuid::from_u128(7),
                room_id: Some(room.id),
                round: Some(1),
                pos: 4,
                content: "question 4 has a typo".into(),
                created_at: SystemTime::now(),
            }])
            .await
            .unwrap();

        let done = finalize_round(&state, &room, Some(participant(2)))
            .await
            .unwrap()
            .expect("submitter payload");
        assert_eq!(done.rank, Some(1));

        let winner = done
            .standings
            .iter()
            .find(|e| e.who == participant(2))
            .unwrap();
        assert_eq!(winner.answer_correct, vec![true, true]);
        assert_eq!(winner.answer_order, vec![0, 1]);
        assert!(winner.reports.is_empty());

        let runner_up = done
            .standings
            .iter()
            .find(|e| e.who == participant(3))
            .unwrap();
        assert_eq!(runner_up.answer_correct, vec![true, false]);
        assert_eq!(runner_up.reports.len(), 1);
        assert_eq!(runner_up.reports[0].pos, 4);
    }
}
