#[cfg(test)]
pub mod fake;
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{DisconnectMarker, PairwiseRecord, QuizReport, QuizStatDelta, RoundResult},
    storage::StorageResult,
};
use crate::state::room::{MemberStatus, ParticipantRef, Profile, Room, RoomHost, RoomMember};

/// Abstraction over the persistence layer for rooms, disconnect markers,
/// round results, and pairwise records.
///
/// Every room mutation is a single conditional update matched against the
/// current document (room id plus a membership predicate), so racing callers
/// either succeed cleanly or get `None` back and re-read. Methods returning
/// `Option<Room>` yield the post-update document.
pub trait RoomStore: Send + Sync {
    fn insert_room(&self, room: Room) -> BoxFuture<'static, StorageResult<()>>;
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Room>>>;
    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    /// Append a member if the participant is not already present.
    fn append_member(
        &self,
        room_id: Uuid,
        member: RoomMember,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>>;

    /// Flip a member's status when its current status matches `from`.
    fn set_member_status(
        &self,
        room_id: Uuid,
        who: ParticipantRef,
        from: MemberStatus,
        to: MemberStatus,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>>;

    /// Invited-path join: `inviting` becomes `join` and the member's display
    /// fields are filled from the joiner's resolved profile.
    fn mark_joined(
        &self,
        room_id: Uuid,
        who: ParticipantRef,
        profile: Profile,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>>;

    /// Remove a member entry.
    fn remove_member(
        &self,
        room_id: Uuid,
        who: ParticipantRef,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>>;

    /// Replace the host with a promoted successor and drop the successor from
    /// the member list. Matched against the departing host's identity.
    fn promote_host(
        &self,
        room_id: Uuid,
        old_host: ParticipantRef,
        new_host: RoomHost,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>>;

    /// Start a round: every member flips to `play`, the host's playing flag
    /// follows its role, and the round counter increments. Matched against
    /// "all members ready" so two racing starts cannot both succeed.
    fn start_round(
        &self,
        room_id: Uuid,
        host_plays: bool,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>>;

    /// Clear the host's playing flag after it submits its round result.
    fn clear_host_playing(&self, room_id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<Room>>>;

    /// Swap the active quiz.
    fn set_quiz(
        &self,
        room_id: Uuid,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>>;

    /// Write a disconnect marker, replacing any live marker for the same
    /// participant.
    fn upsert_disconnect(
        &self,
        marker: DisconnectMarker,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Drop the marker a timely rejoin (or kick) resolves.
    fn delete_disconnect(
        &self,
        who: ParticipantRef,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Markers older than the grace cutoff, ready for the reaper.
    fn expired_disconnects(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<DisconnectMarker>>>;

    /// Remove consumed markers by row id.
    fn delete_disconnects(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<()>>;

    fn insert_round_result(&self, result: RoundResult) -> BoxFuture<'static, StorageResult<()>>;

    /// All results submitted for (room, round).
    fn round_results(
        &self,
        room_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<RoundResult>>>;

    /// Write the final rank onto a result row.
    fn set_round_rank(&self, id: Uuid, rank: u32) -> BoxFuture<'static, StorageResult<()>>;

    /// Head-to-head record covering the unordered pair (a, b), if any.
    fn find_pairwise(
        &self,
        a: ParticipantRef,
        b: ParticipantRef,
    ) -> BoxFuture<'static, StorageResult<Option<PairwiseRecord>>>;

    /// Fold one round into a pairwise record.
    ///
    /// The update is matched against "not already stamped with (room_id,
    /// round)" and returns `None` when a concurrent replay got there first.
    /// With `existing_id` set the stored record is updated in place and
    /// `from_side_won` refers to the stored orientation; without it a fresh
    /// record is upserted under a deterministic pair id with `from`/`to` as
    /// given.
    fn apply_pairwise(
        &self,
        existing_id: Option<Uuid>,
        from: ParticipantRef,
        to: ParticipantRef,
        from_side_won: bool,
        room_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<Option<PairwiseRecord>>>;

    /// Fold a submission into a quiz's aggregate counters via `$inc` only.
    fn bump_quiz_stats(
        &self,
        quiz_id: Uuid,
        delta: QuizStatDelta,
    ) -> BoxFuture<'static, StorageResult<()>>;

    fn insert_quiz_reports(
        &self,
        reports: Vec<QuizReport>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Reports submitted during (room, round), echoed in done payloads.
    fn quiz_reports(
        &self,
        room_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizReport>>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
