use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the room log still accepts appends.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "room log health check failed");
            HealthResponse::degraded()
        }
    }
}
