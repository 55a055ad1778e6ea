use std::sync::Arc;

use uuid::Uuid;

use crate::{
    dao::{models::RoundResult, room_store::RoomStore},
    dto::{
        common::Identity,
        room::{EventKind, InviteRequest, KickRequest, RoomEvent, UpdateQuizRequest},
    },
    error::ServiceError,
    services::{presence, scoring, voice},
    state::SharedState,
    state::room::{
        HostRole, MemberStatus, Membership, ParticipantRef, Profile, ROOM_CAPACITY, Room, RoomHost,
        RoomMember,
    },
};

/// Create a room with the caller as host and the invitees pending in
/// `inviting` state. Each invitee gets a `memberInvited` push wherever it is
/// connected.
pub async fn create_room(
    state: &SharedState,
    identity: &Identity,
    role: HostRole,
    quiz_id: Option<Uuid>,
    invitees: Vec<ParticipantRef>,
) -> Result<Room, ServiceError> {
    let store = state.require_store().await?;

    if invitees.contains(&identity.who) {
        return Err(ServiceError::InvalidInput(
            "the creator cannot invite itself".into(),
        ));
    }
    let host_slot = usize::from(role == HostRole::Play);
    if host_slot + invitees.len() > ROOM_CAPACITY {
        return Err(ServiceError::InvalidInput(format!(
            "a room holds at most {ROOM_CAPACITY} players"
        )));
    }

    let room_id = Uuid::new_v4();
    let room = Room {
        id: room_id,
        quiz_id,
        round: 0,
        voice_channel: voice::channel_name(state.config(), room_id),
        host: RoomHost {
            who: identity.who,
            profile: identity.profile.clone(),
            role,
            playing: false,
        },
        // Display fields are unknown until the invitee connects and joins.
        members: invitees
            .iter()
            .map(|who| RoomMember {
                who: *who,
                profile: Profile::default(),
                status: MemberStatus::Inviting,
            })
            .collect(),
    };
    store.insert_room(room.clone()).await?;

    for invitee in invitees {
        let event = RoomEvent::about(EventKind::MemberInvited, &room, invitee);
        presence::send_to(state, invitee, &event).await;
    }

    Ok(room)
}

/// Invite more participants into an existing room. Host only.
pub async fn invite(
    state: &SharedState,
    who: ParticipantRef,
    request: InviteRequest,
) -> Result<Room, ServiceError> {
    let store = state.require_store().await?;
    let mut room = require_room(&store, request.room_id).await?;
    require_host(&room, who)?;

    for target in request.targets {
        let (target_who, profile) = target.into_parts();
        let member = RoomMember {
            who: target_who,
            profile,
            status: MemberStatus::Inviting,
        };
        // The store's filter re-checks capacity and duplicates, so racing
        // invites cannot overshoot.
        let Some(updated) = store.append_member(room.id, member).await? else {
            return Err(ServiceError::InvalidState(format!(
                "cannot invite `{}`: already present or room full",
                target_who.id
            )));
        };

        let event = RoomEvent::about(EventKind::MemberInvited, &updated, target_who);
        presence::broadcast(state, &updated.everyone(), &event).await;
        room = updated;
    }

    Ok(room)
}

/// Invited-path join: the invitee connects, its entry flips to `join`, and
/// its resolved profile lands on the member document.
pub async fn join(
    state: &SharedState,
    identity: &Identity,
    room_id: Uuid,
) -> Result<Room, ServiceError> {
    let store = state.require_store().await?;

    let Some(updated) = store
        .mark_joined(room_id, identity.who, identity.profile.clone())
        .await?
    else {
        // Distinguish a missing room from a bad membership state.
        let room = require_room(&store, room_id).await?;
        return Err(match room.membership_of(identity.who) {
            Some(_) => ServiceError::InvalidState("already joined this room".into()),
            None => ServiceError::Forbidden("not invited to this room".into()),
        });
    };
    store.delete_disconnect(identity.who, room_id).await?;

    let event = RoomEvent::about(EventKind::MemberJoin, &updated, identity.who);
    presence::broadcast(state, &updated.everyone(), &event).await;

    Ok(updated)
}

/// Open-path join: anyone may walk into a room that has a free slot and no
/// round running. The joiner lands directly in `join` with its resolved
/// profile; no invitation is required.
pub async fn attend(
    state: &SharedState,
    identity: &Identity,
    room_id: Uuid,
) -> Result<Room, ServiceError> {
    let store = state.require_store().await?;
    let room = require_room(&store, room_id).await?;
    if room.mid_round() {
        return Err(ServiceError::InvalidState(
            "cannot join while a round is running".into(),
        ));
    }
    if room.is_full() {
        return Err(ServiceError::InvalidState("room is full".into()));
    }
    if room.membership_of(identity.who).is_some() {
        return Err(ServiceError::InvalidState("already in this room".into()));
    }

    let member = RoomMember {
        who: identity.who,
        profile: identity.profile.clone(),
        status: MemberStatus::Join,
    };
    let Some(updated) = store.append_member(room.id, member).await? else {
        // Lost a race against another join or invite taking the last slot.
        return Err(ServiceError::InvalidState(
            "room filled up while joining".into(),
        ));
    };

    let event = RoomEvent::about(EventKind::MemberJoin, &updated, identity.who);
    presence::broadcast(state, &updated.everyone(), &event).await;
    Ok(updated)
}

/// Reconnect within the grace period: the pending disconnect marker is
/// resolved and no membership state changes. Results already submitted for
/// the running round come back so the client can redraw its view.
pub async fn rejoin(
    state: &SharedState,
    who: ParticipantRef,
    room_id: Uuid,
) -> Result<(Room, Vec<RoundResult>), ServiceError> {
    let store = state.require_store().await?;
    let room = require_room(&store, room_id).await?;
    if room.membership_of(who).is_none() {
        return Err(ServiceError::Forbidden("not part of this room".into()));
    }
    store.delete_disconnect(who, room_id).await?;

    let results = if room.round > 0 {
        store.round_results(room_id, room.round).await?
    } else {
        Vec::new()
    };
    Ok((room, results))
}

/// Flip the caller from `join` to `ready`.
pub async fn ready(
    state: &SharedState,
    who: ParticipantRef,
    room_id: Uuid,
) -> Result<Room, ServiceError> {
    flip_status(
        state,
        who,
        room_id,
        MemberStatus::Join,
        MemberStatus::Ready,
        EventKind::MemberReady,
    )
    .await
}

/// Flip the caller back from `ready` to `join`.
pub async fn unready(
    state: &SharedState,
    who: ParticipantRef,
    room_id: Uuid,
) -> Result<Room, ServiceError> {
    flip_status(
        state,
        who,
        room_id,
        MemberStatus::Ready,
        MemberStatus::Join,
        EventKind::MemberUnready,
    )
    .await
}

async fn flip_status(
    state: &SharedState,
    who: ParticipantRef,
    room_id: Uuid,
    from: MemberStatus,
    to: MemberStatus,
    event: EventKind,
) -> Result<Room, ServiceError> {
    let store = state.require_store().await?;

    let Some(updated) = store.set_member_status(room_id, who, from, to).await? else {
        return Err(ServiceError::InvalidState(format!(
            "caller is not a `{from:?}` member of this room"
        )));
    };

    let event = RoomEvent::about(event, &updated, who);
    presence::broadcast(state, &updated.everyone(), &event).await;
    Ok(updated)
}

/// Remove a member from the room. Host only. The target's socket is closed
/// wherever it is connected.
pub async fn kick(
    state: &SharedState,
    who: ParticipantRef,
    request: KickRequest,
) -> Result<Room, ServiceError> {
    let store = state.require_store().await?;
    let room = require_room(&store, request.room_id).await?;
    require_host(&room, who)?;
    let was_mid_round = room.mid_round();
    if request.target == who {
        return Err(ServiceError::InvalidInput(
            "the host cannot kick itself; leave instead".into(),
        ));
    }

    let Some(updated) = store.remove_member(room.id, request.target).await? else {
        return Err(ServiceError::NotFound(format!(
            "`{}` is not a member of this room",
            request.target.id
        )));
    };
    store.delete_disconnect(request.target, room.id).await?;

    let event = RoomEvent::about(EventKind::MemberLeave, &updated, request.target);
    let mut targets = updated.everyone();
    targets.push(request.target);
    presence::broadcast(state, &targets, &event).await;
    presence::evict(state, request.target, room.id).await;

    // Kicking the last player still in `play` completes the round.
    if was_mid_round && updated.round_done() {
        scoring::finalize_round(state, &updated, None).await?;
    }

    Ok(updated)
}

/// Start the next round. Host only; requires a selected quiz and every member
/// ready. The store's conditional update keeps racing starts from double
/// incrementing the round counter.
pub async fn start(
    state: &SharedState,
    who: ParticipantRef,
    room_id: Uuid,
) -> Result<Room, ServiceError> {
    let store = state.require_store().await?;
    let room = require_room(&store, room_id).await?;
    require_host(&room, who)?;
    if room.quiz_id.is_none() {
        return Err(ServiceError::InvalidState(
            "select a quiz before starting".into(),
        ));
    }

    let host_plays = room.host.role == HostRole::Play;
    let Some(updated) = store.start_round(room_id, host_plays).await? else {
        return Err(ServiceError::InvalidState(
            "every member must be ready to start".into(),
        ));
    };

    let event = RoomEvent::new(EventKind::GameStart, &updated);
    presence::broadcast(state, &updated.everyone(), &event).await;
    Ok(updated)
}

/// Swap the room's quiz. Host only.
pub async fn update_quiz(
    state: &SharedState,
    who: ParticipantRef,
    request: UpdateQuizRequest,
) -> Result<Room, ServiceError> {
    let store = state.require_store().await?;
    let room = require_room(&store, request.room_id).await?;
    require_host(&room, who)?;

    let Some(updated) = store.set_quiz(room.id, request.quiz_id).await? else {
        return Err(ServiceError::NotFound(format!(
            "room `{}` not found",
            request.room_id
        )));
    };

    let event = RoomEvent::new(EventKind::QuizUpdated, &updated);
    presence::broadcast(state, &updated.everyone(), &event).await;
    Ok(updated)
}

/// Voluntary leave endpoint; the reaper replays the same path for expired
/// disconnect markers.
pub async fn leave(
    state: &SharedState,
    who: ParticipantRef,
    room_id: Uuid,
) -> Result<(), ServiceError> {
    apply_leave(state, who, room_id).await
}

/// Remove a participant from its room with all the consequences: member
/// removal or host succession, marker cleanup, event fan-out, and round
/// reconciliation when the departure completes a running round.
pub async fn apply_leave(
    state: &SharedState,
    who: ParticipantRef,
    room_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let room = require_room(&store, room_id).await?;
    let was_mid_round = room.mid_round();

    match room.membership_of(who) {
        None => Err(ServiceError::NotFound("not part of this room".into())),
        Some(Membership::Member) => {
            let Some(updated) = store.remove_member(room_id, who).await? else {
                return Err(ServiceError::NotFound("not part of this room".into()));
            };
            store.delete_disconnect(who, room_id).await?;
            presence::evict(state, who, room_id).await;

            let event = RoomEvent::about(EventKind::MemberLeave, &updated, who);
            let mut targets = updated.everyone();
            targets.push(who);
            presence::broadcast(state, &targets, &event).await;

            if was_mid_round && updated.round_done() {
                scoring::finalize_round(state, &updated, None).await?;
            }
            Ok(())
        }
        Some(Membership::Host) => host_leave(state, &store, room, who, was_mid_round).await,
    }
}

/// Host departure: promote the earliest settled member, or close the room
/// when nobody ever joined.
async fn host_leave(
    state: &SharedState,
    store: &Arc<dyn RoomStore>,
    room: Room,
    who: ParticipantRef,
    was_mid_round: bool,
) -> Result<(), ServiceError> {
    store.delete_disconnect(who, room.id).await?;
    presence::evict(state, who, room.id).await;

    match room.next_host_index() {
        Some(index) => {
            let new_host = room.promoted_host(&room.members[index]);
            let Some(updated) = store.promote_host(room.id, who, new_host.clone()).await? else {
                return Err(ServiceError::InvalidState(
                    "room changed during host succession".into(),
                ));
            };

            let event = RoomEvent::about(EventKind::HostChanged, &updated, new_host.who);
            let mut targets = updated.everyone();
            targets.push(who);
            presence::broadcast(state, &targets, &event).await;

            if was_mid_round && updated.round_done() {
                scoring::finalize_round(state, &updated, None).await?;
            }
            Ok(())
        }
        None => {
            // Only never-joined invitees remain; the room dies with the host.
            let event = RoomEvent::about(EventKind::GameClosed, &room, who);
            presence::broadcast(state, &room.everyone(), &event).await;
            store.delete_room(room.id).await?;
            Ok(())
        }
    }
}

async fn require_room(store: &Arc<dyn RoomStore>, room_id: Uuid) -> Result<Room, ServiceError> {
    store
        .find_room(room_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))
}

fn require_host(room: &Room, who: ParticipantRef) -> Result<(), ServiceError> {
    if room.host.who != who {
        return Err(ServiceError::Forbidden("host-only operation".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{models::DisconnectMarker, room_store::fake::FakeRoomStore},
        dto::room::InviteTarget,
        state::{AppState, room::ParticipantKind},
    };
    use std::time::SystemTime;

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
        state.install_room_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn participant(n: u128) -> ParticipantRef {
        ParticipantRef {
            id: Uuid::from_u128(n),
            kind: ParticipantKind::Student,
        }
    }

    fn identity(n: u128, name: &str) -> Identity {
        Identity {
            who: participant(n),
            profile: Profile {
                name: name.into(),
                ..Profile::default()
            },
        }
    }

    fn member(n: u128, status: MemberStatus) -> RoomMember {
        RoomMember {
            who: participant(n),
            profile: Profile {
                name: format!("member-{n}"),
                ..Profile::default()
            },
            status,
        }
    }

    // Host is participant 1 with a playing role.
    fn lobby_room(id: u128, members: Vec<RoomMember>) -> Room {
        Room {
            id: Uuid::from_u128(id),
            quiz_id: Some(Uuid::from_u128(0xBEEF)),
            round: 0,
            voice_channel: "room-test".into(),
            host: RoomHost {
                who: participant(1),
                profile: Profile {
                    name: "host".into(),
                    ..Profile::default()
                },
                role: HostRole::Play,
                playing: false,
            },
            members,
        }
    }

    fn running_room(id: u128, members: Vec<RoomMember>) -> Room {
        let mut room = lobby_room(id, members);
        room.round = 1;
        room.host.playing = true;
        room
    }

    #[tokio::test]
    async fn attend_seats_a_walk_in_as_joined() {
        let (state, store) = state_with_store().await;
        let room = lobby_room(1, vec![member(2, MemberStatus::Join)]);
        store.insert_room(room.clone()).await.unwrap();

        let joiner = identity(5, "walk-in");
        let updated = attend(&state, &joiner, room.id).await.unwrap();

        let entry = updated.member(joiner.who).expect("walk-in appended");
        assert_eq!(entry.status, MemberStatus::Join);
        assert_eq!(entry.profile.name, "walk-in");
    }

    #[tokio::test]
    async fn attend_rejects_full_and_running_rooms() {
        let (state, store) = state_with_store().await;

        // Playing host plus three members fills every slot.
        let full = lobby_room(
            1,
            vec![
                member(2, MemberStatus::Join),
                member(3, MemberStatus::Join),
                member(4, MemberStatus::Join),
            ],
        );
        store.insert_room(full.clone()).await.unwrap();
        assert!(matches!(
            attend(&state, &identity(9, "late"), full.id).await,
            Err(ServiceError::InvalidState(_))
        ));

        let running = running_room(2, vec![member(2, MemberStatus::Play)]);
        store.insert_room(running.clone()).await.unwrap();
        assert!(matches!(
            attend(&state, &identity(9, "late"), running.id).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn invite_works_while_a_round_runs() {
        let (state, store) = state_with_store().await;
        let room = running_room(1, vec![member(2, MemberStatus::Play)]);
        store.insert_room(room.clone()).await.unwrap();

        let request = InviteRequest {
            room_id: room.id,
            targets: vec![InviteTarget {
                id: Uuid::from_u128(7),
                kind: ParticipantKind::Student,
                name: "late invite".into(),
                org_name: None,
                img_url: None,
                country: None,
            }],
        };
        let updated = invite(&state, participant(1), request).await.unwrap();
        let entry = updated.member(participant(7)).expect("invited");
        assert_eq!(entry.status, MemberStatus::Inviting);
    }

    #[tokio::test]
    async fn start_flips_everyone_to_play_once_ready() {
        let (state, store) = state_with_store().await;
        let room = lobby_room(
            1,
            vec![member(2, MemberStatus::Ready), member(3, MemberStatus::Ready)],
        );
        store.insert_room(room.clone()).await.unwrap();

        let updated = start(&state, participant(1), room.id).await.unwrap();
        assert_eq!(updated.round, 1);
        assert!(updated.host.playing);
        assert!(
            updated
                .members
                .iter()
                .all(|m| m.status == MemberStatus::Play)
        );
    }

    #[tokio::test]
    async fn start_rejects_unready_members_and_missing_quiz() {
        let (state, store) = state_with_store().await;

        let unready = lobby_room(1, vec![member(2, MemberStatus::Join)]);
        store.insert_room(unready.clone()).await.unwrap();
        assert!(matches!(
            start(&state, participant(1), unready.id).await,
            Err(ServiceError::InvalidState(_))
        ));

        let mut no_quiz = lobby_room(2, vec![member(2, MemberStatus::Ready)]);
        no_quiz.quiz_id = None;
        store.insert_room(no_quiz.clone()).await.unwrap();
        assert!(matches!(
            start(&state, participant(1), no_quiz.id).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn rejoin_resolves_the_marker_without_membership_change() {
        let (state, store) = state_with_store().await;
        let room = lobby_room(1, vec![member(2, MemberStatus::Join)]);
        store.insert_room(room.clone()).await.unwrap();
        store
            .upsert_disconnect(DisconnectMarker {
                id: Uuid::from_u128(500),
                who: participant(2),
                room_id: room.id,
                disconnected_at: SystemTime::now(),
            })
            .await
            .unwrap();

        let (after, results) = rejoin(&state, participant(2), room.id).await.unwrap();
        assert_eq!(after.members, room.members);
        assert!(results.is_empty());
        assert!(store.markers().is_empty(), "marker must be consumed");
    }

    #[tokio::test]
    async fn host_leave_promotes_the_earliest_settled_member() {
        let (state, store) = state_with_store().await;
        let room = lobby_room(
            1,
            vec![
                member(2, MemberStatus::Inviting),
                member(3, MemberStatus::Ready),
            ],
        );
        store.insert_room(room.clone()).await.unwrap();

        leave(&state, participant(1), room.id).await.unwrap();

        let after = store.find_room(room.id).await.unwrap().expect("room kept");
        assert_eq!(after.host.who, participant(3));
        assert_eq!(after.host.role, HostRole::Play);
        assert!(after.member(participant(3)).is_none());
        assert!(after.member(participant(2)).is_some());
    }

    #[tokio::test]
    async fn host_leave_closes_the_room_when_nobody_joined() {
        let (state, store) = state_with_store().await;
        let room = lobby_room(1, vec![member(2, MemberStatus::Inviting)]);
        store.insert_room(room.clone()).await.unwrap();

        leave(&state, participant(1), room.id).await.unwrap();
        assert!(store.find_room(room.id).await.unwrap().is_none());
    }
}
