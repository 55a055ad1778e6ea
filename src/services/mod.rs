/// Operational alert delivery to the configured webhook.
pub mod alerts;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Healthy-instance discovery through the load balancer.
pub mod peer_discovery;
/// Points ledger crediting after finished rounds.
pub mod points;
/// Local delivery and cross-instance fan-out of room events.
pub mod presence;
/// Grace-period sweep replaying leaves for gone participants.
pub mod reaper;
/// Room lifecycle operations and host succession.
pub mod room_service;
/// Round ranking, pairwise reconciliation, and quiz statistics.
pub mod scoring;
/// Storage connection supervision and degraded mode handling.
pub mod storage_supervisor;
/// Voice side-channel naming.
pub mod voice;
/// WebSocket connection lifecycle handling.
pub mod websocket_service;
