use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use validator::Validate;

use crate::{
    dto::{
        common::Identity,
        room::{
            InviteRequest, KickRequest, RoomActionRequest, RoomSnapshot, SubmitResultRequest,
            SubmitResultResponse, UpdateQuizRequest,
        },
    },
    error::AppError,
    services::{alerts, room_service, scoring},
    state::SharedState,
};

/// Routes handling room membership and round operations.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/invite", post(invite))
        .route("/rooms/ready", post(ready))
        .route("/rooms/unready", post(unready))
        .route("/rooms/kick", post(kick))
        .route("/rooms/leave", post(leave))
        .route("/rooms/start", post(start))
        .route("/rooms/quiz", post(update_quiz))
        .route("/rooms/result", post(submit_result))
}

#[utoipa::path(
    post,
    path = "/rooms/invite",
    tag = "rooms",
    request_body = InviteRequest,
    responses((status = 200, description = "Invitations recorded", body = RoomSnapshot))
)]
/// Invite more participants into the caller's room (host only).
pub async fn invite(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<InviteRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    payload.validate()?;
    let room = room_service::invite(&state, identity.who, payload)
        .await
        .map_err(|err| alerts::escalate(&state, err))?;
    Ok(Json(RoomSnapshot::from(&room)))
}

#[utoipa::path(
    post,
    path = "/rooms/ready",
    tag = "rooms",
    request_body = RoomActionRequest,
    responses((status = 200, description = "Member marked ready", body = RoomSnapshot))
)]
/// Declare the caller ready for the next round.
pub async fn ready(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<RoomActionRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let room = room_service::ready(&state, identity.who, payload.room_id)
        .await
        .map_err(|err| alerts::escalate(&state, err))?;
    Ok(Json(RoomSnapshot::from(&room)))
}

#[utoipa::path(
    post,
    path = "/rooms/unready",
    tag = "rooms",
    request_body = RoomActionRequest,
    responses((status = 200, description = "Member back to joined", body = RoomSnapshot))
)]
/// Withdraw the caller's ready state.
pub async fn unready(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<RoomActionRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let room = room_service::unready(&state, identity.who, payload.room_id)
        .await
        .map_err(|err| alerts::escalate(&state, err))?;
    Ok(Json(RoomSnapshot::from(&room)))
}

#[utoipa::path(
    post,
    path = "/rooms/kick",
    tag = "rooms",
    request_body = KickRequest,
    responses((status = 200, description = "Member removed", body = RoomSnapshot))
)]
/// Remove a member from the caller's room (host only).
pub async fn kick(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<KickRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let room = room_service::kick(&state, identity.who, payload)
        .await
        .map_err(|err| alerts::escalate(&state, err))?;
    Ok(Json(RoomSnapshot::from(&room)))
}

#[utoipa::path(
    post,
    path = "/rooms/leave",
    tag = "rooms",
    request_body = RoomActionRequest,
    responses((status = 204, description = "Caller left the room"))
)]
/// Leave the room, promoting a successor when the caller hosted it.
pub async fn leave(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<RoomActionRequest>,
) -> Result<StatusCode, AppError> {
    room_service::leave(&state, identity.who, payload.room_id)
        .await
        .map_err(|err| alerts::escalate(&state, err))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/rooms/start",
    tag = "rooms",
    request_body = RoomActionRequest,
    responses((status = 200, description = "Round started", body = RoomSnapshot))
)]
/// Start the next round (host only, all members ready).
pub async fn start(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<RoomActionRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let room = room_service::start(&state, identity.who, payload.room_id)
        .await
        .map_err(|err| alerts::escalate(&state, err))?;
    Ok(Json(RoomSnapshot::from(&room)))
}

#[utoipa::path(
    post,
    path = "/rooms/quiz",
    tag = "rooms",
    request_body = UpdateQuizRequest,
    responses((status = 200, description = "Quiz updated", body = RoomSnapshot))
)]
/// Swap the room's quiz (host only).
pub async fn update_quiz(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let room = room_service::update_quiz(&state, identity.who, payload)
        .await
        .map_err(|err| alerts::escalate(&state, err))?;
    Ok(Json(RoomSnapshot::from(&room)))
}

#[utoipa::path(
    post,
    path = "/rooms/result",
    tag = "rounds",
    request_body = SubmitResultRequest,
    responses((
        status = 200,
        description = "Result recorded; `done` set when this submission finished the round",
        body = SubmitResultResponse
    ))
)]
/// Submit the caller's round result.
pub async fn submit_result(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<SubmitResultRequest>,
) -> Result<Json<SubmitResultResponse>, AppError> {
    payload.validate()?;
    let done = scoring::submit_result(&state, &identity, payload)
        .await
        .map_err(|err| alerts::escalate(&state, err))?;
    Ok(Json(SubmitResultResponse { done }))
}
