//! Service metadata handler.

use axum::Json;
use serde::Serialize;

/// Root endpoint response: service name, version, and endpoint list.
#[derive(Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub endpoints: Endpoints,
}

#[derive(Serialize)]
pub struct Endpoints {
    pub health: String,
    pub detect: String,
}

/// Informational root endpoint.
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "PawGuard Detection Backend".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: Endpoints {
            health: "/health".to_string(),
            detect: "/detect (POST)".to_string(),
        },
    })
}
