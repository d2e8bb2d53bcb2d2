use axum::Json;
use serde::Serialize;

use crate::config::{APP_NAME, APP_VERSION};

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

/// Liveness probe.
pub async fn liveness() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        name: APP_NAME,
        version: APP_VERSION,
    })
}
