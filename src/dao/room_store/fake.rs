//! In-memory [`RoomStore`] for service-level tests.
//!
//! Mirrors the conditional-update semantics of the MongoDB store against
//! plain tables: every room mutation checks its predicate first and answers
//! `None` when it does not hold, exactly like a filter that matched nothing.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use futures::future::BoxFuture;
use uuid::Uuid;

use super::RoomStore;
use crate::dao::{
    models::{DisconnectMarker, PairwiseRecord, QuizReport, QuizStatDelta, RoundResult},
    storage::StorageResult,
};
use crate::state::room::{MemberStatus, ParticipantRef, Profile, Room, RoomHost, RoomMember};

/// Test double backed by `HashMap`/`Vec` tables behind one mutex.
#[derive(Clone, Default)]
pub struct FakeRoomStore {
    inner: Arc<Mutex<Tables>>,
}

#[derive(Default)]
struct Tables {
    rooms: HashMap<Uuid, Room>,
    disconnects: Vec<DisconnectMarker>,
    results: Vec<RoundResult>,
    pairwise: Vec<PairwiseRecord>,
    reports: Vec<QuizReport>,
    stat_deltas: Vec<(Uuid, QuizStatDelta)>,
}

impl FakeRoomStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Live disconnect markers, for assertions.
    pub fn markers(&self) -> Vec<DisconnectMarker> {
        self.inner.lock().unwrap().disconnects.clone()
    }

    /// Every head-to-head record, for assertions.
    pub fn pairwise_records(&self) -> Vec<PairwiseRecord> {
        self.inner.lock().unwrap().pairwise.clone()
    }

    /// Stat deltas folded so far, for assertions.
    pub fn stat_deltas(&self) -> Vec<(Uuid, QuizStatDelta)> {
        self.inner.lock().unwrap().stat_deltas.clone()
    }

    /// The conditional-update seam: `apply` checks its own predicate and
    /// answers whether it mutated the room.
    fn update_room<F>(&self, room_id: Uuid, apply: F) -> Option<Room>
    where
        F: FnOnce(&mut Room) -> bool,
    {
        let mut tables = self.inner.lock().unwrap();
        let room = tables.rooms.get_mut(&room_id)?;
        if apply(room) { Some(room.clone()) } else { None }
    }
}

impl RoomStore for FakeRoomStore {
    fn insert_room(&self, room: Room) -> BoxFuture<'static, StorageResult<()>> {
        let this = self.clone();
        Box::pin(async move {
            this.inner.lock().unwrap().rooms.insert(room.id, room);
            Ok(())
        })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let this = self.clone();
        Box::pin(async move { Ok(this.inner.lock().unwrap().rooms.get(&id).cloned()) })
    }

    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let this = self.clone();
        Box::pin(async move { Ok(this.inner.lock().unwrap().rooms.remove(&id).is_some()) })
    }

    fn append_member(
        &self,
        room_id: Uuid,
        member: RoomMember,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let this = self.clone();
        Box::pin(async move {
            Ok(this.update_room(room_id, |room| {
                if room.membership_of(member.who).is_some() || room.is_full() {
                    return false;
                }
                room.members.push(member);
                true
            }))
        })
    }

    fn set_member_status(
        &self,
        room_id: Uuid,
        who: ParticipantRef,
        from: MemberStatus,
        to: MemberStatus,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let this = self.clone();
        Box::pin(async move {
            Ok(this.update_room(room_id, |room| {
                match room
                    .members
                    .iter_mut()
                    .find(|m| m.who == who && m.status == from)
                {
                    Some(entry) => {
                        entry.status = to;
                        true
                    }
                    None => false,
                }
            }))
        })
    }

    fn mark_joined(
        &self,
        room_id: Uuid,
        who: ParticipantRef,
        profile: Profile,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let this = self.clone();
        Box::pin(async move {
            Ok(this.update_room(room_id, |room| {
                match room
                    .members
                    .iter_mut()
                    .find(|m| m.who == who && m.status == MemberStatus::Inviting)
                {
                    Some(entry) => {
                        entry.status = MemberStatus::Join;
                        entry.profile = profile;
                        true
                    }
                    None => false,
                }
            }))
        })
    }

    fn remove_member(
        &self,
        room_id: Uuid,
        who: ParticipantRef,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let this = self.clone();
        Box::pin(async move {
            Ok(this.update_room(room_id, |room| {
                let before = room.members.len();
                room.members.retain(|m| m.who != who);
                room.members.len() != before
            }))
        })
    }

    fn promote_host(
        &self,
        room_id: Uuid,
        old_host: ParticipantRef,
        new_host: RoomHost,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let this = self.clone();
        Box::pin(async move {
            Ok(this.update_room(room_id, |room| {
                if room.host.who != old_host {
                    return false;
                }
                room.members.retain(|m| m.who != new_host.who);
                room.host = new_host;
                true
            }))
        })
    }

    fn start_round(
        &self,
        room_id: Uuid,
        host_plays: bool,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let this = self.clone();
        Box::pin(async move {
            Ok(this.update_room(room_id, |room| {
                if !room.all_ready() {
                    return false;
                }
                for entry in &mut room.members {
                    entry.status = MemberStatus::Play;
                }
                room.host.playing = host_plays;
                room.round += 1;
                true
            }))
        })
    }

    fn clear_host_playing(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let this = self.clone();
        Box::pin(async move {
            Ok(this.update_room(room_id, |room| {
                if !room.host.playing {
                    return false;
                }
                room.host.playing = false;
                true
            }))
        })
    }

    fn set_quiz(
        &self,
        room_id: Uuid,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let this = self.clone();
        Box::pin(async move {
            Ok(this.update_room(room_id, |room| {
                room.quiz_id = Some(quiz_id);
                true
            }))
        })
    }

    fn upsert_disconnect(&self, marker: DisconnectMarker) -> BoxFuture<'static, StorageResult<()>> {
        let this = self.clone();
        Box::pin(async move {
            let mut tables = this.inner.lock().unwrap();
            tables.disconnects.retain(|m| m.who != marker.who);
            tables.disconnects.push(marker);
            Ok(())
        })
    }

    fn delete_disconnect(
        &self,
        who: ParticipantRef,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let this = self.clone();
        Box::pin(async move {
            this.inner
                .lock()
                .unwrap()
                .disconnects
                .retain(|m| !(m.who == who && m.room_id == room_id));
            Ok(())
        })
    }

    fn expired_disconnects(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<DisconnectMarker>>> {
        let this = self.clone();
        Box::pin(async move {
            Ok(this
                .inner
                .lock()
                .unwrap()
                .disconnects
                .iter()
                .filter(|m| m.disconnected_at <= cutoff)
                .cloned()
                .collect())
        })
    }

    fn delete_disconnects(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<()>> {
        let this = self.clone();
        Box::pin(async move {
            this.inner
                .lock()
                .unwrap()
                .disconnects
                .retain(|m| !ids.contains(&m.id));
            Ok(())
        })
    }

    fn insert_round_result(&self, result: RoundResult) -> BoxFuture<'static, StorageResult<()>> {
        let this = self.clone();
        Box::pin(async move {
            this.inner.lock().unwrap().results.push(result);
            Ok(())
        })
    }

    fn round_results(
        &self,
        room_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<RoundResult>>> {
        let this = self.clone();
        Box::pin(async move {
            Ok(this
                .inner
                .lock()
                .unwrap()
                .results
                .iter()
                .filter(|r| r.room_id == Some(room_id) && r.round == Some(round))
                .cloned()
                .collect())
        })
    }

    fn set_round_rank(&self, id: Uuid, rank: u32) -> BoxFuture<'static, StorageResult<()>> {
        let this = self.clone();
        Box::pin(async move {
            if let Some(result) = this
                .inner
                .lock()
                .unwrap()
                .results
                .iter_mut()
                .find(|r| r.id == id)
            {
                result.rank = Some(rank);
            }
            Ok(())
        })
    }

    fn find_pairwise(
        &self,
        a: ParticipantRef,
        b: ParticipantRef,
    ) -> BoxFuture<'static, StorageResult<Option<PairwiseRecord>>> {
        let this = self.clone();
        Box::pin(async move {
            Ok(this
                .inner
                .lock()
                .unwrap()
                .pairwise
                .iter()
                .find(|r| r.pairs(a, b))
                .cloned())
        })
    }

    fn apply_pairwise(
        &self,
        existing_id: Option<Uuid>,
        from: ParticipantRef,
        to: ParticipantRef,
        from_side_won: bool,
        room_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<Option<PairwiseRecord>>> {
        let this = self.clone();
        Box::pin(async move {
            let mut tables = this.inner.lock().unwrap();
            let existing = tables.pairwise.iter_mut().find(|r| match existing_id {
                Some(id) => r.id == id,
                None => r.pairs(from, to),
            });

            Ok(match existing {
                Some(record) => {
                    if record.stamped_with(room_id, round) {
                        None
                    } else {
                        record.win += u32::from(from_side_won);
                        record.all += 1;
                        record.last_room_id = room_id;
                        record.last_round = round;
                        Some(record.clone())
                    }
                }
                None => {
                    let record = PairwiseRecord {
                        id: existing_id.unwrap_or_else(Uuid::new_v4),
                        from,
                        to,
                        win: u32::from(from_side_won),
                        all: 1,
                        last_room_id: room_id,
                        last_round: round,
                    };
                    tables.pairwise.push(record.clone());
                    Some(record)
                }
            })
        })
    }

    fn bump_quiz_stats(
        &self,
        quiz_id: Uuid,
        delta: QuizStatDelta,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let this = self.clone();
        Box::pin(async move {
            this.inner.lock().unwrap().stat_deltas.push((quiz_id, delta));
            Ok(())
        })
    }

    fn insert_quiz_reports(
        &self,
        reports: Vec<QuizReport>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let this = self.clone();
        Box::pin(async move {
            this.inner.lock().unwrap().reports.extend(reports);
            Ok(())
        })
    }

    fn quiz_reports(
        &self,
        room_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizReport>>> {
        let this = self.clone();
        Box::pin(async move {
            Ok(this
                .inner
                .lock()
                .unwrap()
                .reports
                .iter()
                .filter(|r| r.room_id == Some(room_id) && r.round == Some(round))
                .cloned()
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
