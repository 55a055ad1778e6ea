use axum::extract::ws::Message;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::internal::{DropPresenceRequest, RelayRequest},
    state::{PresenceEntry, SharedState},
    state::room::ParticipantRef,
};

/// Serialize a payload and push it onto a socket's writer channel.
pub fn send_to_socket<T>(tx: &mpsc::UnboundedSender<Message>, value: &T, context: &str)
where
    T: ?Sized + Serialize,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, context, "failed to serialize outbound message");
            return;
        }
    };

    if tx.send(Message::Text(payload.into())).is_err() {
        debug!(context, "writer channel closed; message dropped");
    }
}

/// Register a participant's socket, replacing any stale local entry and
/// telling peers to drop theirs. The previous socket, wherever it lives, gets
/// closed so a participant never has two live connections.
pub async fn register(
    state: &SharedState,
    who: ParticipantRef,
    room_id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
) {
    if let Some((_, stale)) = state.presence().remove(&who) {
        let _ = stale.tx.send(Message::Close(None));
    }
    state.presence().insert(who, PresenceEntry { room_id, tx });

    drop_on_peers(state, who, room_id).await;
}

/// Remove the local entry only when it still points at `tx`; a reconnect may
/// have replaced it already. Returns whether this call removed the entry.
pub fn remove_if_current(
    state: &SharedState,
    who: ParticipantRef,
    tx: &mpsc::UnboundedSender<Message>,
) -> bool {
    state
        .presence()
        .remove_if(&who, |_, entry| entry.tx.same_channel(tx))
        .is_some()
}

/// Drop a participant's presence everywhere, closing its socket. Used on kick
/// and leave.
pub async fn evict(state: &SharedState, who: ParticipantRef, room_id: Uuid) {
    handle_drop(
        state,
        DropPresenceRequest { who, room_id },
    );
    drop_on_peers(state, who, room_id).await;
}

/// Apply a drop request against the local registry.
pub fn handle_drop(state: &SharedState, request: DropPresenceRequest) {
    let removed = state
        .presence()
        .remove_if(&request.who, |_, entry| entry.room_id == request.room_id);
    if let Some((_, entry)) = removed {
        let _ = entry.tx.send(Message::Close(None));
    }
}

/// Deliver a relayed payload to the locally connected subset of `targets`,
/// returning how many were reached.
pub fn deliver_relayed(state: &SharedState, request: &RelayRequest) -> usize {
    let undelivered = deliver_local(state, &request.targets, &request.payload);
    request.targets.len() - undelivered.len()
}

/// Push an event to every target: locally connected sockets get it directly,
/// and the remainder is relayed to every healthy peer instance.
pub async fn broadcast<T: Serialize>(state: &SharedState, targets: &[ParticipantRef], payload: &T) {
    let value = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "failed to serialize broadcast payload");
            return;
        }
    };

    let missed = deliver_local(state, targets, &value);
    if missed.is_empty() {
        return;
    }

    let peers = state.peers().await;
    if peers.is_empty() {
        debug!(missed = missed.len(), "no peers to relay to");
        return;
    }

    let request = RelayRequest {
        targets: missed,
        payload: value,
    };
    let relays = peers.iter().map(|peer| {
        let request = &request;
        let client = state.http();
        async move {
            let url = format!("http://{peer}/internal/relay");
            if let Err(err) = client.post(&url).json(request).send().await {
                warn!(peer = %peer, error = %err, "relay to peer failed");
            }
        }
    });
    join_all(relays).await;
}

/// Convenience wrapper for a single-target push.
pub async fn send_to<T: Serialize>(state: &SharedState, who: ParticipantRef, payload: &T) {
    broadcast(state, &[who], payload).await;
}

/// Deliver to local sockets, returning the targets with no entry here. A
/// target whose writer channel has closed counts as undelivered too.
fn deliver_local(
    state: &SharedState,
    targets: &[ParticipantRef],
    payload: &serde_json::Value,
) -> Vec<ParticipantRef> {
    let text = payload.to_string();
    let mut missed = Vec::new();

    for target in targets {
        let Some(entry) = state.presence().get(target) else {
            missed.push(*target);
            continue;
        };
        if entry.tx.send(Message::Text(text.clone().into())).is_err() {
            missed.push(*target);
        }
    }

    missed
}

async fn drop_on_peers(state: &SharedState, who: ParticipantRef, room_id: Uuid) {
    let peers = state.peers().await;
    if peers.is_empty() {
        return;
    }

    let request = DropPresenceRequest { who, room_id };
    let drops = peers.iter().map(|peer| {
        let request = &request;
        let client = state.http();
        async move {
            let url = format!("http://{peer}/internal/presence/drop");
            if let Err(err) = client.post(&url).json(request).send().await {
                warn!(peer = %peer, error = %err, "presence drop on peer failed");
            }
        }
    });
    join_all(drops).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState, state::room::ParticipantKind};
    use serde_json::json;

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

    fn participant(n: u128) -> ParticipantRef {
        ParticipantRef {
            id: Uuid::from_u128(n),
            kind: ParticipantKind::Student,
        }
    }

    #[tokio::test]
    async fn deliver_local_partitions_targets() {
        let state = test_state();
        let room_id = Uuid::from_u128(0xF00D);
        let (tx, mut rx) = mpsc::unbounded_channel();
        register(&state, participant(1), room_id, tx).await;

        let missed = deliver_local(
            &state,
            &[participant(1), participant(2)],
            &json!({"event": "memberJoin"}),
        );
        assert_eq!(missed, vec![participant(2)]);

        let delivered = rx.recv().await.expect("message delivered");
        assert!(matches!(delivered, Message::Text(_)));
    }

    #[tokio::test]
    async fn closed_channel_counts_as_undelivered() {
        let state = test_state();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        register(&state, participant(1), Uuid::from_u128(1), tx).await;

        let missed = deliver_local(&state, &[participant(1)], &json!({}));
        assert_eq!(missed, vec![participant(1)]);
    }

    #[tokio::test]
    async fn register_replaces_and_closes_stale_entry() {
        let state = test_state();
        let room_id = Uuid::from_u128(1);
        let (old_tx, mut old_rx) = mpsc::unbounded_channel();
        register(&state, participant(1), room_id, old_tx).await;

        let (new_tx, _new_rx) = mpsc::unbounded_channel();
        register(&state, participant(1), room_id, new_tx.clone()).await;

        assert!(matches!(old_rx.recv().await, Some(Message::Close(_))));
        assert!(!remove_if_current(&state, participant(1), &{
            let (other, _) = mpsc::unbounded_channel();
            other
        }));
        assert!(remove_if_current(&state, participant(1), &new_tx));
    }

    #[tokio::test]
    async fn drop_request_matches_on_room() {
        let state = test_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        register(&state, participant(1), Uuid::from_u128(1), tx).await;

        handle_drop(
            &state,
            DropPresenceRequest {
                who: participant(1),
                room_id: Uuid::from_u128(2),
            },
        );
        assert!(state.presence().contains_key(&participant(1)));

        handle_drop(
            &state,
            DropPresenceRequest {
                who: participant(1),
                room_id: Uuid::from_u128(1),
            },
        );
        assert!(!state.presence().contains_key(&participant(1)));
        assert!(matches!(rx.recv().await, Some(Message::Close(_))));
    }

    // Full fan-out cycle between two instances: the sender misses locally and
    // relays through the peer's internal endpoint to reach the socket there.
    #[tokio::test]
    async fn missed_targets_are_relayed_to_a_peer_instance() {
        let local = test_state();
        let remote = test_state();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = listener.local_addr().unwrap();
        let app = crate::routes::router(remote.clone())
            .into_make_service_with_connect_info::<std::net::SocketAddr>();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        remote.presence().insert(
            participant(1),
            PresenceEntry {
                room_id: Uuid::from_u128(1),
                tx,
            },
        );
        local.set_peers(vec![peer_addr.to_string()]).await;

        broadcast(&local, &[participant(1)], &json!({"event": "memberJoin"})).await;

        let delivered = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("relay within the deadline")
            .expect("message delivered on the peer");
        assert!(matches!(delivered, Message::Text(_)));
    }
}
