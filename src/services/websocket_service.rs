use std::time::SystemTime;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt, stream::SplitStream};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::DisconnectMarker,
    dto::{
        common::Identity,
        room::{ResultRow, ResyncPayload, RoomSnapshot},
    },
    error::ServiceError,
    services::{presence, room_service},
    state::SharedState,
    state::room::{HostRole, ParticipantRef, Room},
};

/// Socket lifecycle for room creation: create the room, then stay attached as
/// its host.
pub async fn handle_create(
    state: SharedState,
    socket: WebSocket,
    identity: Identity,
    role: HostRole,
    quiz_id: Option<Uuid>,
    invitees: Vec<ParticipantRef>,
) {
    let (writer_task, tx, receiver) = split_socket(socket);

    match room_service::create_room(&state, &identity, role, quiz_id, invitees).await {
        Ok(room) => {
            presence::register(&state, identity.who, room.id, tx.clone()).await;
            info!(participant = %identity.who.id, room_id = %room.id, "room created");
            stay_attached(&state, identity.who, &room, &tx, receiver).await;
        }
        Err(err) => reject(&tx, &err),
    }

    finalize(writer_task, tx).await;
}

/// Socket lifecycle for the invited-path join.
pub async fn handle_join(state: SharedState, socket: WebSocket, identity: Identity, room_id: Uuid) {
    let (writer_task, tx, receiver) = split_socket(socket);

    // Register before the join broadcast so the joiner receives its own event.
    presence::register(&state, identity.who, room_id, tx.clone()).await;
    match room_service::join(&state, &identity, room_id).await {
        Ok(room) => {
            info!(participant = %identity.who.id, room_id = %room.id, "member joined");
            stay_attached(&state, identity.who, &room, &tx, receiver).await;
        }
        Err(err) => {
            presence::remove_if_current(&state, identity.who, &tx);
            reject(&tx, &err);
        }
    }

    finalize(writer_task, tx).await;
}

/// Socket lifecycle for the open-path join: no invitation needed, the caller
/// takes a free slot in a room that is not mid round.
pub async fn handle_attend(
    state: SharedState,
    socket: WebSocket,
    identity: Identity,
    room_id: Uuid,
) {
    let (writer_task, tx, receiver) = split_socket(socket);

    // Register before the join broadcast so the joiner receives its own event.
    presence::register(&state, identity.who, room_id, tx.clone()).await;
    match room_service::attend(&state, &identity, room_id).await {
        Ok(room) => {
            info!(participant = %identity.who.id, room_id = %room.id, "member attended");
            stay_attached(&state, identity.who, &room, &tx, receiver).await;
        }
        Err(err) => {
            presence::remove_if_current(&state, identity.who, &tx);
            reject(&tx, &err);
        }
    }

    finalize(writer_task, tx).await;
}

/// Socket lifecycle for a reconnect within the grace period. Registration
/// replaces the stale entry here and on every peer, and the pending
/// disconnect marker is resolved.
pub async fn handle_rejoin(
    state: SharedState,
    socket: WebSocket,
    identity: Identity,
    room_id: Uuid,
) {
    let (writer_task, tx, receiver) = split_socket(socket);

    presence::register(&state, identity.who, room_id, tx.clone()).await;
    match room_service::rejoin(&state, identity.who, room_id).await {
        Ok((room, results)) => {
            info!(participant = %identity.who.id, room_id = %room.id, "member rejoined");
            let resync = ResyncPayload {
                room: RoomSnapshot::from(&room),
                results: results.iter().map(ResultRow::from).collect(),
            };
            presence::send_to_socket(&tx, &resync, "resync payload");
            attach_loop(&state, identity.who, room.id, &tx, receiver).await;
        }
        Err(err) => {
            presence::remove_if_current(&state, identity.who, &tx);
            reject(&tx, &err);
        }
    }

    finalize(writer_task, tx).await;
}

/// Spawn the writer task so outbound pushes keep flowing while we await
/// inbound frames.
fn split_socket(
    socket: WebSocket,
) -> (
    JoinHandle<()>,
    mpsc::UnboundedSender<Message>,
    SplitStream<WebSocket>,
) {
    let (mut sender, receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    (writer_task, outbound_tx, receiver)
}

/// Send the initial snapshot, pump the socket until it closes, then resolve
/// the disconnect.
async fn stay_attached(
    state: &SharedState,
    who: ParticipantRef,
    room: &Room,
    tx: &mpsc::UnboundedSender<Message>,
    receiver: SplitStream<WebSocket>,
) {
    presence::send_to_socket(tx, &RoomSnapshot::from(room), "room snapshot");
    attach_loop(state, who, room.id, tx, receiver).await;
}

/// Pump the socket until it closes, then resolve the disconnect.
async fn attach_loop(
    state: &SharedState,
    who: ParticipantRef,
    room_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
    receiver: SplitStream<WebSocket>,
) {
    read_loop(who, tx, receiver).await;
    mark_disconnected(state, who, room_id, tx).await;
}

async fn read_loop(
    who: ParticipantRef,
    tx: &mpsc::UnboundedSender<Message>,
    mut receiver: SplitStream<WebSocket>,
) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Ping(payload)) => {
                let _ = tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(participant = %who.id, "socket closed");
                let _ = tx.send(Message::Close(frame));
                break;
            }
            // All room mutations come through the REST surface; inbound
            // socket traffic carries nothing.
            Ok(Message::Text(_)) | Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(participant = %who.id, error = %err, "websocket error");
                break;
            }
        }
    }
}

/// If the registry still points at this socket, the close was abrupt: start
/// the grace period. A kick, leave, or reconnect already removed the entry
/// and leaves no marker behind.
async fn mark_disconnected(
    state: &SharedState,
    who: ParticipantRef,
    room_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
) {
    if !presence::remove_if_current(state, who, tx) {
        return;
    }

    let Ok(store) = state.require_store().await else {
        warn!(participant = %who.id, "disconnect while degraded; no marker written");
        return;
    };

    let marker = DisconnectMarker {
        id: Uuid::new_v4(),
        who,
        room_id,
        disconnected_at: SystemTime::now(),
    };
    match store.upsert_disconnect(marker).await {
        Ok(()) => {
            info!(participant = %who.id, room_id = %room_id, "abrupt disconnect; grace period started");
        }
        Err(err) => {
            warn!(participant = %who.id, error = %err, "failed to write disconnect marker");
        }
    }
}

fn reject(tx: &mpsc::UnboundedSender<Message>, err: &ServiceError) {
    presence::send_to_socket(
        tx,
        &serde_json::json!({ "error": err.to_string() }),
        "rejection notice",
    );
    let _ = tx.send(Message::Close(None));
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
