use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quizroom Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_create,
        crate::routes::websocket::ws_join,
        crate::routes::websocket::ws_attend,
        crate::routes::websocket::ws_rejoin,
        crate::routes::room::invite,
        crate::routes::room::ready,
        crate::routes::room::unready,
        crate::routes::room::kick,
        crate::routes::room::leave,
        crate::routes::room::start,
        crate::routes::room::update_quiz,
        crate::routes::room::submit_result,
        crate::routes::internal::relay,
        crate::routes::internal::drop_presence,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::RoomSnapshot,
            crate::dto::room::HostView,
            crate::dto::room::MemberView,
            crate::dto::room::RoomEvent,
            crate::dto::room::EventKind,
            crate::dto::room::RoundDoneEvent,
            crate::dto::room::RoundDoneEntry,
            crate::dto::room::VsView,
            crate::dto::room::ReportView,
            crate::dto::room::SubmitResultResponse,
            crate::dto::room::ResyncPayload,
            crate::dto::room::ResultRow,
            crate::dto::room::InviteRequest,
            crate::dto::room::InviteTarget,
            crate::dto::room::RoomActionRequest,
            crate::dto::room::KickRequest,
            crate::dto::room::UpdateQuizRequest,
            crate::dto::room::SubmitResultRequest,
            crate::dto::room::ReportEntry,
            crate::dto::internal::RelayRequest,
            crate::dto::internal::RelayResponse,
            crate::dto::internal::DropPresenceRequest,
            crate::state::room::ParticipantRef,
            crate::state::room::ParticipantKind,
            crate::state::room::Profile,
            crate::state::room::MemberStatus,
            crate::state::room::HostRole,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room membership and lifecycle operations"),
        (name = "rounds", description = "Round result submission"),
        (name = "internal", description = "Instance-to-instance fan-out"),
    )
)]
pub struct ApiDoc;
