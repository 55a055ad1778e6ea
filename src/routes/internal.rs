use std::net::{IpAddr, SocketAddr};

use axum::{
    Json, Router,
    extract::{ConnectInfo, State},
    http::StatusCode,
    routing::post,
};
use tracing::warn;

use crate::{
    dto::internal::{DropPresenceRequest, RelayRequest, RelayResponse},
    error::AppError,
    services::presence,
    state::SharedState,
};

/// Instance-to-instance routes. Callers must be this deployment's own
/// instances; anything else is rejected against the discovered peer list.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/internal/relay", post(relay))
        .route("/internal/presence/drop", post(drop_presence))
}

#[utoipa::path(
    post,
    path = "/internal/relay",
    tag = "internal",
    request_body = RelayRequest,
    responses((status = 200, description = "Locally connected targets served", body = RelayResponse))
)]
/// Deliver a relayed payload to the targets connected to this instance.
pub async fn relay(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<RelayRequest>,
) -> Result<Json<RelayResponse>, AppError> {
    ensure_peer(&state, addr).await?;
    let delivered = presence::deliver_relayed(&state, &payload);
    Ok(Json(RelayResponse { delivered }))
}

#[utoipa::path(
    post,
    path = "/internal/presence/drop",
    tag = "internal",
    request_body = DropPresenceRequest,
    responses((status = 204, description = "Stale presence entry dropped"))
)]
/// Drop a stale presence entry because the participant reconnected elsewhere.
pub async fn drop_presence(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<DropPresenceRequest>,
) -> Result<StatusCode, AppError> {
    ensure_peer(&state, addr).await?;
    presence::handle_drop(&state, payload);
    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_peer(state: &SharedState, addr: SocketAddr) -> Result<(), AppError> {
    let peers = state.peers().await;
    if peer_allowed(&peers, state.config().self_addr.as_deref(), addr.ip()) {
        Ok(())
    } else {
        warn!(addr = %addr, "rejected internal call from unknown address");
        Err(AppError::Forbidden(
            "internal endpoints are peer-only".into(),
        ))
    }
}

/// Loopback plus any address in the discovered peer list (or our own).
fn peer_allowed(peers: &[String], self_addr: Option<&str>, ip: IpAddr) -> bool {
    if ip.is_loopback() {
        return true;
    }

    let entry_matches = |entry: &str| {
        let host = entry
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(entry);
        host.parse::<IpAddr>().is_ok_and(|peer_ip| peer_ip == ip)
    };

    peers.iter().any(|peer| entry_matches(peer)) || self_addr.is_some_and(entry_matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_is_always_allowed() {
        assert!(peer_allowed(&[], None, "127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn listed_peer_is_allowed_with_or_without_port() {
        let peers = vec!["10.0.0.2:8080".to_owned(), "10.0.0.3".to_owned()];
        assert!(peer_allowed(&peers, None, "10.0.0.2".parse().unwrap()));
        assert!(peer_allowed(&peers, None, "10.0.0.3".parse().unwrap()));
        assert!(!peer_allowed(&peers, None, "10.0.0.9".parse().unwrap()));
    }

    #[test]
    fn own_address_is_allowed() {
        assert!(peer_allowed(
            &[],
            Some("10.0.0.1:8080"),
            "10.0.0.1".parse().unwrap()
        ));
    }
}
