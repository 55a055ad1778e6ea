//! Room domain model: participants, membership states, and the invariant
//! helpers every session transition validates against.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of playing slots in a room. The host occupies a slot only
/// when its role is [`HostRole::Play`].
pub const ROOM_CAPACITY: usize = 4;

/// Kind of competitive entity behind a participant id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
pub enum ParticipantKind {
    /// An individual student account.
    #[serde(rename = "std")]
    Student,
    /// An organization's class acting as one competitive entity.
    #[serde(rename = "class")]
    Class,
}

/// Identity of one competitive entity: the (id, kind) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ParticipantRef {
    /// Stable identifier of the student or class.
    pub id: Uuid,
    /// Whether the id refers to a student or a class.
    pub kind: ParticipantKind,
}

/// Display fields shared by hosts and members, resolved by the upstream
/// identity layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Profile {
    /// Display name of the participant.
    pub name: String,
    /// Organization name when the participant is a class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
    /// Profile image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    /// ISO country code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Lifecycle state of a room member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// Invited but not yet connected.
    Inviting,
    /// Connected and waiting in the lobby.
    Join,
    /// Declared ready for the next round.
    Ready,
    /// Currently playing a round.
    Play,
}

/// Role the host takes while a round is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HostRole {
    /// The host competes like any member.
    Play,
    /// The host only watches; it does not occupy a slot.
    Watch,
}

/// The room creator. Carries a role and a playing flag instead of a
/// [`MemberStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomHost {
    /// Identity of the host.
    pub who: ParticipantRef,
    /// Resolved display fields.
    pub profile: Profile,
    /// Whether the host plays or watches.
    pub role: HostRole,
    /// True while the host is playing the current round.
    pub playing: bool,
}

/// A non-host room member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMember {
    /// Identity of the member.
    pub who: ParticipantRef,
    /// Resolved display fields.
    pub profile: Profile,
    /// Current lifecycle state.
    pub status: MemberStatus,
}

/// How a participant relates to a given room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// The participant is the room's host.
    Host,
    /// The participant appears in the member list.
    Member,
}

/// One active or forming multiplayer session.
///
/// Members are kept in invitation order; host succession depends on that
/// ordering, so it must never be re-sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Stable room identifier.
    pub id: Uuid,
    /// Quiz currently selected for the room.
    pub quiz_id: Option<Uuid>,
    /// Round counter, incremented on every start.
    pub round: u32,
    /// Voice side-channel name issued on creation.
    pub voice_channel: String,
    /// The room creator (or its promoted successor).
    pub host: RoomHost,
    /// Members in invitation order.
    pub members: Vec<RoomMember>,
}

impl Room {
    /// Number of occupied playing slots: members plus the host when it plays.
    pub fn occupied_slots(&self) -> usize {
        let host_slot = usize::from(self.host.role == HostRole::Play);
        host_slot + self.members.len()
    }

    /// Whether another member would exceed [`ROOM_CAPACITY`].
    pub fn is_full(&self) -> bool {
        self.occupied_slots() >= ROOM_CAPACITY
    }

    /// Whether a round is currently in progress.
    pub fn mid_round(&self) -> bool {
        self.host.playing || self.members.iter().any(|m| m.status == MemberStatus::Play)
    }

    /// Round completion predicate: nobody (member or playing host) is still
    /// in [`MemberStatus::Play`].
    pub fn round_done(&self) -> bool {
        !self.host.playing && self.members.iter().all(|m| m.status != MemberStatus::Play)
    }

    /// Whether the room can start: at least one member and all of them ready.
    pub fn all_ready(&self) -> bool {
        !self.members.is_empty() && self.members.iter().all(|m| m.status == MemberStatus::Ready)
    }

    /// Classify a participant against the latest stored document.
    pub fn membership_of(&self, who: ParticipantRef) -> Option<Membership> {
        if self.host.who == who {
            return Some(Membership::Host);
        }
        if self.members.iter().any(|m| m.who == who) {
            return Some(Membership::Member);
        }
        None
    }

    /// Look up a member entry by identity.
    pub fn member(&self, who: ParticipantRef) -> Option<&RoomMember> {
        self.members.iter().find(|m| m.who == who)
    }

    /// Host plus every member, in host-first order.
    pub fn everyone(&self) -> Vec<ParticipantRef> {
        let mut all = Vec::with_capacity(self.members.len() + 1);
        all.push(self.host.who);
        all.extend(self.members.iter().map(|m| m.who));
        all
    }

    /// Everyone except `who`; used to broadcast a transition to the rest of
    /// the room.
    pub fn others(&self, who: ParticipantRef) -> Vec<ParticipantRef> {
        self.everyone().into_iter().filter(|p| *p != who).collect()
    }

    /// Participants who actually play the current round: playing members plus
    /// the host when its role is play.
    pub fn players(&self) -> Vec<ParticipantRef> {
        let mut players: Vec<ParticipantRef> = self
            .members
            .iter()
            .filter(|m| m.status != MemberStatus::Inviting)
            .map(|m| m.who)
            .collect();
        if self.host.role == HostRole::Play {
            players.insert(0, self.host.who);
        }
        players
    }

    /// Index of the host successor: the earliest member past `inviting`, in
    /// invitation order. `None` means the room dies with the host.
    pub fn next_host_index(&self) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.status != MemberStatus::Inviting)
    }

    /// Build the host entry a successor member turns into. The successor
    /// inherits the departing host's role and keeps its own display fields;
    /// `playing` carries over from its member status.
    pub fn promoted_host(&self, successor: &RoomMember) -> RoomHost {
        RoomHost {
            who: successor.who,
            profile: successor.profile.clone(),
            role: self.host.role,
            playing: successor.status == MemberStatus::Play,
        }
    }

    /// Display fields for any participant of the room, host included.
    pub fn profile_of(&self, who: ParticipantRef) -> Option<&Profile> {
        if self.host.who == who {
            return Some(&self.host.profile);
        }
        self.member(who).map(|m| &m.profile)
    }
}
