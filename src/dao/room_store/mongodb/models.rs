use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{DisconnectMarker, PairwiseRecord, QuizReport, RoundResult};
use crate::state::room::{ParticipantKind, ParticipantRef, Room, RoomHost, RoomMember};

/// Stored shape of a room document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    quiz_id: Option<Uuid>,
    round: u32,
    voice_channel: String,
    host: RoomHost,
    members: Vec<RoomMember>,
}

impl From<Room> for MongoRoomDocument {
    fn from(value: Room) -> Self {
        Self {
            id: value.id,
            quiz_id: value.quiz_id,
            round: value.round,
            voice_channel: value.voice_channel,
            host: value.host,
            members: value.members,
        }
    }
}

impl From<MongoRoomDocument> for Room {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            id: value.id,
            quiz_id: value.quiz_id,
            round: value.round,
            voice_channel: value.voice_channel,
            host: value.host,
            members: value.members,
        }
    }
}

/// Stored shape of a disconnect marker. `disconnected_at` is a BSON date so
/// the TTL index can expire stale rows server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDisconnectDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    who: ParticipantRef,
    room_id: Uuid,
    disconnected_at: DateTime,
}

impl From<DisconnectMarker> for MongoDisconnectDocument {
    fn from(value: DisconnectMarker) -> Self {
        Self {
            id: value.id,
            who: value.who,
            room_id: value.room_id,
            disconnected_at: DateTime::from_system_time(value.disconnected_at),
        }
    }
}

impl From<MongoDisconnectDocument> for DisconnectMarker {
    fn from(value: MongoDisconnectDocument) -> Self {
        Self {
            id: value.id,
            who: value.who,
            room_id: value.room_id,
            disconnected_at: value.disconnected_at.to_system_time(),
        }
    }
}

/// Stored shape of a round result row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoundResultDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    who: ParticipantRef,
    quiz_id: Uuid,
    room_id: Option<Uuid>,
    round: Option<u32>,
    answer_order: Vec<u32>,
    answer_time: Vec<u32>,
    answer_correct: Vec<bool>,
    age_learn: f64,
    age_cognitive: f64,
    age_activity: f64,
    rank: Option<u32>,
    recorded_at: DateTime,
}

impl From<RoundResult> for MongoRoundResultDocument {
    fn from(value: RoundResult) -> Self {
        Self {
            id: value.id,
            who: value.who,
            quiz_id: value.quiz_id,
            room_id: value.room_id,
            round: value.round,
            answer_order: value.answer_order,
            answer_time: value.answer_time,
            answer_correct: value.answer_correct,
            age_learn: value.age_learn,
            age_cognitive: value.age_cognitive,
            age_activity: value.age_activity,
            rank: value.rank,
            recorded_at: DateTime::from_system_time(value.recorded_at),
        }
    }
}

impl From<MongoRoundResultDocument> for RoundResult {
    fn from(value: MongoRoundResultDocument) -> Self {
        Self {
            id: value.id,
            who: value.who,
            quiz_id: value.quiz_id,
            room_id: value.room_id,
            round: value.round,
            answer_order: value.answer_order,
            answer_time: value.answer_time,
            answer_correct: value.answer_correct,
            age_learn: value.age_learn,
            age_cognitive: value.age_cognitive,
            age_activity: value.age_activity,
            rank: value.rank,
            recorded_at: value.recorded_at.to_system_time(),
        }
    }
}

/// Stored shape of a pairwise head-to-head record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPairwiseDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    from: ParticipantRef,
    to: ParticipantRef,
    win: u32,
    all: u32,
    last_room_id: Uuid,
    last_round: u32,
}

impl From<MongoPairwiseDocument> for PairwiseRecord {
    fn from(value: MongoPairwiseDocument) -> Self {
        Self {
            id: value.id,
            from: value.from,
            to: value.to,
            win: value.win,
            all: value.all,
            last_room_id: value.last_room_id,
            last_round: value.last_round,
        }
    }
}

/// Stored shape of a quiz error report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoReportDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    who: ParticipantRef,
    quiz_id: Uuid,
    room_id: Option<Uuid>,
    round: Option<u32>,
    pos: u32,
    content: String,
    created_at: DateTime,
}

impl From<QuizReport> for MongoReportDocument {
    fn from(value: QuizReport) -> Self {
        Self {
            id: value.id,
            who: value.who,
            quiz_id: value.quiz_id,
            room_id: value.room_id,
            round: value.round,
            pos: value.pos,
            content: value.content,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoReportDocument> for QuizReport {
    fn from(value: MongoReportDocument) -> Self {
        Self {
            id: value.id,
            who: value.who,
            quiz_id: value.quiz_id,
            room_id: value.room_id,
            round: value.round,
            pos: value.pos,
            content: value.content,
            created_at: value.created_at.to_system_time(),
        }
    }
}

/// Wire spelling of a uuid, matching how serde stores `Uuid` fields.
pub fn uuid_str(id: Uuid) -> String {
    id.to_string()
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_str(id)}
}

/// Wire spelling of a participant kind, matching the serde representation.
pub fn kind_str(kind: ParticipantKind) -> &'static str {
    match kind {
        ParticipantKind::Student => "std",
        ParticipantKind::Class => "class",
    }
}

/// Query fragment matching a [`ParticipantRef`] embedded under `prefix`.
pub fn participant_filter(prefix: &str, who: ParticipantRef) -> Document {
    doc! {
        format!("{prefix}.id"): uuid_str(who.id),
        format!("{prefix}.kind"): kind_str(who.kind),
    }
}

/// Deterministic record id for an unordered participant pair. Both sides of
/// a first-time pairing race derive the same id, so the unique `_id` index
/// collapses the duplicate insert.
pub fn pair_record_id(a: ParticipantRef, b: ParticipantRef) -> Uuid {
    let mut keys = [pair_key(a), pair_key(b)];
    keys.sort_unstable();
    let mut material = Vec::with_capacity(34);
    material.extend_from_slice(&keys[0]);
    material.extend_from_slice(&keys[1]);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, &material)
}

fn pair_key(p: ParticipantRef) -> [u8; 17] {
    let mut key = [0u8; 17];
    key[..16].copy_from_slice(p.id.as_bytes());
    key[16] = match p.kind {
        ParticipantKind::Student => 0,
        ParticipantKind::Class => 1,
    };
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(n: u128, kind: ParticipantKind) -> ParticipantRef {
        ParticipantRef {
            id: Uuid::from_u128(n),
            kind,
        }
    }

    #[test]
    fn pair_record_id_is_order_independent() {
        let a = participant(1, ParticipantKind::Student);
        let b = participant(2, ParticipantKind::Class);
        assert_eq!(pair_record_id(a, b), pair_record_id(b, a));
    }

    #[test]
    fn pair_record_id_distinguishes_kind() {
        let a = participant(1, ParticipantKind::Student);
        let same_id_as_class = participant(1, ParticipantKind::Class);
        let b = participant(2, ParticipantKind::Student);
        assert_ne!(pair_record_id(a, b), pair_record_id(same_id_as_class, b));
    }
}
