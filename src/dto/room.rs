use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{QuizReport, RoundResult, VsTally},
    state::room::{HostRole, MemberStatus, ParticipantRef, Profile, Room},
};

/// Kind of room lifecycle event pushed over websockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    MemberInvited,
    MemberJoin,
    MemberLeave,
    HostChanged,
    QuizUpdated,
    MemberReady,
    MemberUnready,
    GameStart,
    GameClosed,
    GameDone,
}

/// Host entry as shown to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HostView {
    pub who: ParticipantRef,
    pub profile: Profile,
    pub role: HostRole,
    pub playing: bool,
}

/// Member entry as shown to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberView {
    pub who: ParticipantRef,
    pub profile: Profile,
    pub status: MemberStatus,
}

/// Full room snapshot included in every lifecycle event and REST response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomSnapshot {
    pub room_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<Uuid>,
    pub round: u32,
    pub voice_channel: String,
    pub host: HostView,
    pub members: Vec<MemberView>,
}

impl From<&Room> for RoomSnapshot {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.id,
            quiz_id: room.quiz_id,
            round: room.round,
            voice_channel: room.voice_channel.clone(),
            host: HostView {
                who: room.host.who,
                profile: room.host.profile.clone(),
                role: room.host.role,
                playing: room.host.playing,
            },
            members: room
                .members
                .iter()
                .map(|m| MemberView {
                    who: m.who,
                    profile: m.profile.clone(),
                    status: m.status,
                })
                .collect(),
        }
    }
}

/// Lifecycle event pushed to every participant of a room.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomEvent {
    pub event: EventKind,
    /// Participant the event is about, when it concerns a single one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub who: Option<ParticipantRef>,
    pub room: RoomSnapshot,
}

impl RoomEvent {
    pub fn new(event: EventKind, room: &Room) -> Self {
        Self {
            event,
            who: None,
            room: room.into(),
        }
    }

    pub fn about(event: EventKind, room: &Room, who: ParticipantRef) -> Self {
        Self {
            event,
            who: Some(who),
            room: room.into(),
        }
    }
}

/// One row of the post-round standings, carrying the player's full
/// submission next to its rank.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoundDoneEntry {
    pub who: ParticipantRef,
    pub name: String,
    pub rank: u32,
    pub correct: u32,
    pub attempts: u32,
    /// Question positions in the order this player answered them.
    pub answer_order: Vec<u32>,
    /// Per-answer correctness flags, aligned with `answer_order`.
    pub answer_correct: Vec<bool>,
    pub age_learn: f64,
    pub age_cognitive: f64,
    pub age_activity: f64,
    /// Error reports this player filed during the round.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub reports: Vec<ReportView>,
    /// Head-to-head record against the receiving participant, from the
    /// receiver's point of view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vs: Option<VsView>,
}

/// Head-to-head tally as shown to one side of a pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct VsView {
    pub win: u32,
    pub all: u32,
}

impl From<VsTally> for VsView {
    fn from(tally: VsTally) -> Self {
        Self {
            win: tally.win,
            all: tally.all,
        }
    }
}

/// Per-participant completion payload sent once everyone finished a round.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoundDoneEvent {
    pub event: EventKind,
    pub room_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<Uuid>,
    pub round: u32,
    pub finished_at: String,
    /// Receiver's own rank, when it played the round.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    pub standings: Vec<RoundDoneEntry>,
}

/// Quiz error report as echoed back on its submitter's standings row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportView {
    pub pos: u32,
    pub content: String,
}

impl From<&QuizReport> for ReportView {
    fn from(report: &QuizReport) -> Self {
        Self {
            pos: report.pos,
            content: report.content.clone(),
        }
    }
}

/// Response to a round submission. `done` is populated only when this
/// submission was the last one and the round got reconciled.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitResultResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<RoundDoneEvent>,
}

/// First message of a rejoined socket: current room state plus whatever has
/// been submitted for the running round so far.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResyncPayload {
    pub room: RoomSnapshot,
    pub results: Vec<ResultRow>,
}

/// One already-submitted result, as shown in the resync payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResultRow {
    pub who: ParticipantRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    pub correct: u32,
    pub attempts: u32,
}

impl From<&RoundResult> for ResultRow {
    fn from(result: &RoundResult) -> Self {
        Self {
            who: result.who,
            rank: result.rank,
            correct: result.correct_count() as u32,
            attempts: result.attempt_count() as u32,
        }
    }
}

/// Query parameters of the room-creating websocket upgrade.
#[derive(Debug, Deserialize, IntoParams)]
pub struct CreateParams {
    /// Whether the creator plays or only watches.
    pub role: HostRole,
    /// Quiz to preselect for the room.
    pub quiz_id: Option<Uuid>,
    /// Comma-separated `id/kind` pairs to invite on creation.
    pub invitees: Option<String>,
}

/// Query parameters shared by the join/attend/rejoin websocket upgrades.
#[derive(Debug, Deserialize, IntoParams)]
pub struct RoomKeyParams {
    pub room_id: Uuid,
}

/// Invitation target with its display fields already resolved.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct InviteTarget {
    pub id: Uuid,
    pub kind: crate::state::room::ParticipantKind,
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    pub org_name: Option<String>,
    pub img_url: Option<String>,
    pub country: Option<String>,
}

impl InviteTarget {
    pub fn into_parts(self) -> (ParticipantRef, Profile) {
        (
            ParticipantRef {
                id: self.id,
                kind: self.kind,
            },
            Profile {
                name: self.name,
                org_name: self.org_name,
                img_url: self.img_url,
                country: self.country,
            },
        )
    }
}

/// Body of the invite endpoint.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InviteRequest {
    pub room_id: Uuid,
    #[validate(length(min = 1, max = 4), nested)]
    pub targets: Vec<InviteTarget>,
}

/// Body shared by the ready/unready/leave/start endpoints.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RoomActionRequest {
    pub room_id: Uuid,
}

/// Body of the kick endpoint.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct KickRequest {
    pub room_id: Uuid,
    pub target: ParticipantRef,
}

/// Body of the quiz selection endpoint.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuizRequest {
    pub room_id: Uuid,
    pub quiz_id: Uuid,
}

/// Quiz error report attached to a round submission.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ReportEntry {
    /// Question position the report is about.
    pub pos: u32,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

/// Body of the round result submission endpoint.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "crate::dto::validation::validate_answer_shape"))]
pub struct SubmitResultRequest {
    /// Absent for solo play outside any room.
    pub room_id: Option<Uuid>,
    pub quiz_id: Uuid,
    /// Question positions in the order they were answered.
    #[validate(length(min = 1))]
    pub answer_order: Vec<u32>,
    /// Per-answer solve time in milliseconds.
    pub answer_time: Vec<u32>,
    /// Per-answer correctness flags.
    pub answer_correct: Vec<bool>,
    pub age_learn: f64,
    pub age_cognitive: f64,
    pub age_activity: f64,
    #[validate(nested)]
    #[serde(default)]
    pub reports: Vec<ReportEntry>,
}
