use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{
    dto::{
        common::Identity,
        room::{CreateParams, RoomKeyParams},
        validation::parse_invitees,
    },
    error::AppError,
    services::websocket_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/ws/create",
    tag = "rooms",
    params(CreateParams),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Create a room and attach the creator's socket to it.
pub async fn ws_create(
    State(state): State<SharedState>,
    identity: Identity,
    Query(params): Query<CreateParams>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    // Invitee parsing happens before the upgrade so a bad list stays an HTTP 400.
    let invitees = match params.invitees.as_deref() {
        Some(raw) => parse_invitees(raw).map_err(|err| AppError::BadRequest(err.to_string()))?,
        None => Vec::new(),
    };

    Ok(ws.on_upgrade(move |socket| {
        websocket_service::handle_create(state, socket, identity, params.role, params.quiz_id, invitees)
    }))
}

#[utoipa::path(
    get,
    path = "/ws/join",
    tag = "rooms",
    params(RoomKeyParams),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Join a room the caller was invited to.
pub async fn ws_join(
    State(state): State<SharedState>,
    identity: Identity,
    Query(params): Query<RoomKeyParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        websocket_service::handle_join(state, socket, identity, params.room_id)
    })
}

#[utoipa::path(
    get,
    path = "/ws/attend",
    tag = "rooms",
    params(RoomKeyParams),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Join a room openly, without an invitation, while it sits in the lobby.
pub async fn ws_attend(
    State(state): State<SharedState>,
    identity: Identity,
    Query(params): Query<RoomKeyParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        websocket_service::handle_attend(state, socket, identity, params.room_id)
    })
}

#[utoipa::path(
    get,
    path = "/ws/rejoin",
    tag = "rooms",
    params(RoomKeyParams),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Reconnect to a room within the disconnect grace period.
pub async fn ws_rejoin(
    State(state): State<SharedState>,
    identity: Identity,
    Query(params): Query<RoomKeyParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        websocket_service::handle_rejoin(state, socket, identity, params.room_id)
    })
}

/// Configure the WebSocket endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/ws/create", get(ws_create))
        .route("/ws/join", get(ws_join))
        .route("/ws/attend", get(ws_attend))
        .route("/ws/rejoin", get(ws_rejoin))
}
