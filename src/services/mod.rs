/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Replicas and replication engines that follow a room's event log.
pub mod replication;
/// Room lifecycle and event appends.
pub mod room_service;
/// Server-hosted player sessions.
pub mod session_service;
/// Server-Sent Events forwarding.
pub mod sse_service;
/// Mapping from room events to reducer actions.
pub mod translator;
