use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" while the room log accepts appends, "degraded" once it is closed.
    pub status: String,
}

impl HealthResponse {
    /// The room log is serving requests.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    /// The room log refused the health probe.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
        }
    }
}
