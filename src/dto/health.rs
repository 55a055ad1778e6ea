use serde::Serialize;
use utoipa::ToSchema;

/// Body of the `/healthcheck` endpoint polled by the load balancer and by
/// peer instances discovering each other.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` while the room store is unreachable.
    pub status: String,
}

impl HealthResponse {
    /// Storage reachable; the instance accepts room traffic.
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
        }
    }

    /// Running without storage; room operations are rejected until the
    /// supervisor reconnects.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".into(),
        }
    }
}
