use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::room::ParticipantRef;

/// Instance-to-instance fan-out request. The sender includes every target it
/// could not deliver locally; the receiver delivers the subset connected to it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RelayRequest {
    pub targets: Vec<ParticipantRef>,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

/// Number of targets the receiving instance delivered to.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RelayResponse {
    pub delivered: usize,
}

/// Ask an instance to drop a stale presence entry, closing its socket. Sent
/// when the participant reconnects through another instance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DropPresenceRequest {
    pub who: ParticipantRef,
    pub room_id: Uuid,
}
